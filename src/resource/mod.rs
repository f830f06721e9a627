//! Resolution of resource references into binary content
//!
//! A reference is classified into a [`Reference`] first, then turned into a
//! [`PartSource`] by a [`Resolver`]. Inline, packaged and local references are
//! read right away; remote ones stay lazy until [`Resolver::load`] is called,
//! so that a message can be digested without fetching anything.

use std::{
    collections::HashMap,
    fmt,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use encoding_rs::{Encoding, WINDOWS_1252};
use url::Url;

pub use self::{
    cache::ContentCache,
    content::BinaryContent,
    data_url::{decode as decode_data_url, INLINE_DATA_NAME},
    fetch::{Fetch, FetchResponse, DEFAULT_USER_AGENT, MAX_REDIRECTS},
};
#[cfg(feature = "http")]
pub use self::fetch::HttpFetcher;
use self::content::display_name;
#[cfg(test)]
pub(crate) use self::fetch::test::MockFetcher;
use crate::{error, Error};

mod cache;
mod content;
mod data_url;
mod fetch;

/// Placeholder replaced by the current time in milliseconds before fetching
pub const TIMESTAMP_PLACEHOLDER: &str = "$TS$";

/// A classified resource reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// `data:<type>[;base64],<payload>`
    Inline(String),
    /// `res:<name>`, looked up in the [`PackagedResources`]
    Packaged(String),
    /// `file:` or `jar:`, read on every resolution
    Local(Url),
    /// `http:` or `https:`
    Remote(Url),
    /// Anything else, joined onto the current base
    Relative(Url),
}

impl Reference {
    /// Classifies `href`, resolving it against `base` if it has no known scheme
    pub fn parse(href: &str, base: Option<&Url>) -> Result<Self, Error> {
        let parse = |href: &str| Url::parse(href).map_err(|e| error::url(format!("'{href}': {e}")));

        if href.starts_with("data:") {
            Ok(Self::Inline(href.to_owned()))
        } else if let Some(name) = href.strip_prefix("res:") {
            Ok(Self::Packaged(name.to_owned()))
        } else if href.starts_with("file:") || href.starts_with("jar:") {
            Ok(Self::Local(parse(href)?))
        } else if href.starts_with("http:") || href.starts_with("https:") {
            Ok(Self::Remote(parse(href)?))
        } else {
            let base = base.ok_or_else(|| {
                error::unresolvable(format!(
                    "cannot resolve '{href}' - no <base href=\"...\"> present"
                ))
            })?;
            let url = base
                .join(href)
                .map_err(|e| error::url(format!("'{href}' relative to '{base}': {e}")))?;
            tracing::debug!(href, %base, %url, "relative reference");
            Ok(Self::Relative(url))
        }
    }
}

/// Content of a part, possibly not fetched yet
#[derive(Clone, PartialEq, Eq)]
pub enum PartSource {
    Content(BinaryContent),
    /// Fetched by [`Resolver::load`], every time it is called
    Remote(Url),
}

impl From<BinaryContent> for PartSource {
    fn from(content: BinaryContent) -> Self {
        Self::Content(content)
    }
}

impl fmt::Debug for PartSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Content(content) => fmt::Debug::fmt(content, f),
            Self::Remote(url) => write!(f, "[content from {url}]"),
        }
    }
}

impl fmt::Display for PartSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Namespace of resources shipped with the application
///
/// Names are looked up among the registered entries first, then below each
/// root directory in order. Names climbing out of a root are never found.
#[derive(Debug, Clone, Default)]
pub struct PackagedResources {
    entries: HashMap<String, BinaryContent>,
    roots: Vec<PathBuf>,
}

impl PackagedResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<N: Into<String>>(&mut self, name: N, content: BinaryContent) {
        self.entries.insert(name.into(), content);
    }

    pub fn add_root<P: Into<PathBuf>>(&mut self, root: P) {
        self.roots.push(root.into());
    }

    pub async fn load(&self, name: &str) -> Result<BinaryContent, Error> {
        let name = name.trim_start_matches('/');
        if let Some(content) = self.entries.get(name) {
            return Ok(content.clone());
        }

        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if !escapes {
            for root in &self.roots {
                let path = root.join(relative);
                match tokio::fs::read(&path).await {
                    Ok(bytes) => return Ok(local_content(name, bytes)),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(error::io(format!("{}: {e}", path.display()))),
                }
            }
        }

        Err(error::missing_resource(format!("res:{name}")))
    }
}

fn local_content(path: &str, bytes: Vec<u8>) -> BinaryContent {
    let content_type = mime_guess::from_path(path).first_or_octet_stream();
    BinaryContent::new(content_type.essence_str(), display_name(path), bytes)
}

/// Turns references into content, sharing a fetcher and a [`ContentCache`]
///
/// Cloning is cheap and clones share the cache.
#[derive(Clone)]
pub struct Resolver {
    fetcher: Arc<dyn Fetch>,
    cache: Arc<ContentCache>,
    packaged: Arc<PackagedResources>,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("cache", &self.cache)
            .field("packaged", &self.packaged)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    pub fn new(fetcher: Arc<dyn Fetch>, cache: Arc<ContentCache>) -> Self {
        Self {
            fetcher,
            cache,
            packaged: Arc::new(PackagedResources::new()),
        }
    }

    /// Creates a resolver fetching over HTTP(S) as configured
    #[cfg(feature = "http")]
    pub fn from_config(config: &crate::config::FetchConfig) -> Result<Self, Error> {
        let fetcher = HttpFetcher::new(
            &config.user_agent,
            config.connect_timeout(),
            config.read_timeout(),
        )?;
        use std::num::NonZeroUsize;

        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        let cache = ContentCache::new(config.cache_ttl(), capacity);
        Ok(Self::new(Arc::new(fetcher), Arc::new(cache)))
    }

    /// Replaces the namespace `res:` references are looked up in
    pub fn with_packaged(mut self, packaged: PackagedResources) -> Self {
        self.packaged = Arc::new(packaged);
        self
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Resolves `href`, relative to `base` when it has no known scheme
    ///
    /// Remote content is not fetched here: it is returned as
    /// [`PartSource::Remote`].
    pub async fn resolve(&self, href: &str, base: Option<&Url>) -> Result<PartSource, Error> {
        let reference = Reference::parse(href, base)?;
        self.resolve_reference(reference).await
    }

    pub async fn resolve_reference(&self, reference: Reference) -> Result<PartSource, Error> {
        match reference {
            Reference::Inline(data_url) => Ok(decode_data_url(&data_url)?.into()),
            Reference::Packaged(name) => Ok(self.packaged.load(&name).await?.into()),
            Reference::Local(url) => Ok(self.read_local(&url).await?.into()),
            Reference::Remote(url) | Reference::Relative(url) => Ok(PartSource::Remote(url)),
        }
    }

    /// Returns the content of `source`, fetching it if it is remote
    pub async fn load(&self, source: &PartSource) -> Result<BinaryContent, Error> {
        match source {
            PartSource::Content(content) => Ok(content.clone()),
            PartSource::Remote(url) => self.fetch(url).await,
        }
    }

    /// Resolves and loads `href` in one go
    pub async fn resolve_content(&self, href: &str, base: Option<&Url>) -> Result<BinaryContent, Error> {
        let source = self.resolve(href, base).await?;
        self.load(&source).await
    }

    /// Resolves, loads and decodes `href` as text
    ///
    /// The charset of the content type is used when there is one, ISO-8859-1
    /// otherwise.
    pub async fn resolve_text(&self, href: &str, base: Option<&Url>) -> Result<String, Error> {
        let content = self.resolve_content(href, base).await?;
        let encoding = content_charset(content.content_type()).unwrap_or(WINDOWS_1252);
        let (text, _) = encoding.decode_without_bom_handling(content.bytes());
        Ok(text.into_owned())
    }

    /// Fetches `url` through the cache, after replacing any timestamp placeholder
    pub async fn fetch(&self, url: &Url) -> Result<BinaryContent, Error> {
        let url = if url.as_str().contains(TIMESTAMP_PLACEHOLDER) {
            let millis = chrono::Utc::now().timestamp_millis().to_string();
            let stamped = url.as_str().replace(TIMESTAMP_PLACEHOLDER, &millis);
            Url::parse(&stamped).map_err(|e| error::url(format!("'{stamped}': {e}")))?
        } else {
            url.clone()
        };

        match url.scheme() {
            "http" | "https" => {}
            _ => return self.read_local(&url).await,
        }

        if let Some(content) = self.cache.get(url.as_str()) {
            tracing::debug!(%url, "cached");
            return Ok(content);
        }

        let key = url.to_string();
        let content = fetch::fetch_following(self.fetcher.as_ref(), url).await?;
        self.cache.insert(&key, content.clone());
        Ok(content)
    }

    async fn read_local(&self, url: &Url) -> Result<BinaryContent, Error> {
        match url.scheme() {
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|()| error::url(format!("'{url}': not a local file")))?;
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| error::io(format!("{}: {e}", path.display())))?;
                tracing::debug!(path = %path.display(), bytes = bytes.len(), "read");
                Ok(local_content(url.path(), bytes))
            }
            "jar" => {
                let (_, entry) = url.path().rsplit_once("!/").ok_or_else(|| {
                    error::url(format!("'{url}': no '!/' entry separator"))
                })?;
                self.packaged.load(entry).await
            }
            _ => Err(error::unresolvable(format!("'{url}': unsupported scheme"))),
        }
    }
}

fn content_charset(content_type: &str) -> Option<&'static Encoding> {
    let mime: mime::Mime = content_type.parse().ok()?;
    let charset = mime.get_param(mime::CHARSET)?;
    Encoding::for_label(charset.as_str().as_bytes())
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    fn resolver() -> (Resolver, Arc<MockFetcher>) {
        let fetcher = Arc::new(MockFetcher::new());
        let resolver = Resolver::new(fetcher.clone(), Arc::new(ContentCache::default()));
        (resolver, fetcher)
    }

    #[test]
    fn classification() {
        let base = Url::parse("https://example.com/news/").unwrap();

        assert!(matches!(
            Reference::parse("data:text/plain,x", None).unwrap(),
            Reference::Inline(_)
        ));
        assert_eq!(
            Reference::parse("res:img/logo.png", None).unwrap(),
            Reference::Packaged("img/logo.png".to_owned())
        );
        assert!(matches!(
            Reference::parse("file:///tmp/logo.png", None).unwrap(),
            Reference::Local(_)
        ));
        assert!(matches!(
            Reference::parse("https://example.com/logo.png", Some(&base)).unwrap(),
            Reference::Remote(_)
        ));
        assert_eq!(
            Reference::parse("img/logo.png", Some(&base)).unwrap(),
            Reference::Relative(Url::parse("https://example.com/news/img/logo.png").unwrap())
        );
    }

    #[test]
    fn relative_without_base() {
        let err = Reference::parse("img/logo.png", None).unwrap_err();
        assert!(err.is_unresolvable());
        assert!(err.to_string().contains("'img/logo.png'"));
    }

    #[tokio::test]
    async fn remote_is_lazy_and_cached() {
        let (resolver, fetcher) = resolver();
        fetcher.serve(
            "https://example.com/logo.png",
            FetchResponse::ok("image/png", vec![7; 16]),
        );

        let source = resolver.resolve("https://example.com/logo.png", None).await.unwrap();
        assert_eq!(source.to_string(), "[content from https://example.com/logo.png]");
        assert!(fetcher.requests().is_empty());

        let first = resolver.load(&source).await.unwrap();
        let second = resolver.load(&source).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fetcher.requests().len(), 1);
        assert_eq!(resolver.cache().len(), 1);
    }

    #[tokio::test]
    async fn timestamp_placeholder_bypasses_cache() {
        let (resolver, fetcher) = resolver();
        let url = Url::parse("https://example.com/pixel.gif?ts=$TS$").unwrap();

        // The mock knows no stamped URL, so the fetch fails after a request was made.
        assert!(resolver.fetch(&url).await.unwrap_err().is_network());
        let requested = fetcher.requests();
        assert_eq!(requested.len(), 1);
        assert!(!requested[0].contains(TIMESTAMP_PLACEHOLDER));
        assert!(requested[0].starts_with("https://example.com/pixel.gif?ts="));
    }

    #[tokio::test]
    async fn files_are_read_every_time() {
        let (resolver, _) = resolver();
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(b"first").unwrap();
        let url = Url::from_file_path(file.path()).unwrap();

        let content = resolver.resolve_content(url.as_str(), None).await.unwrap();
        assert_eq!(content.bytes(), b"first");
        assert_eq!(content.content_type(), "text/plain");

        std::fs::write(file.path(), b"second").unwrap();
        let content = resolver.resolve_content(url.as_str(), None).await.unwrap();
        assert_eq!(content.bytes(), b"second");
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test]
    async fn packaged_resources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("footer.html"), b"<p>bye</p>").unwrap();

        let mut packaged = PackagedResources::new();
        packaged.insert("logo.gif", BinaryContent::new("image/gif", "logo.gif", b"GIF".to_vec()));
        packaged.add_root(dir.path());
        let (resolver, _) = resolver();
        let resolver = resolver.with_packaged(packaged);

        let logo = resolver.resolve_content("res:logo.gif", None).await.unwrap();
        assert_eq!(logo.bytes(), b"GIF");

        let footer = resolver.resolve_content("res:/footer.html", None).await.unwrap();
        assert_eq!(footer.content_type(), "text/html");
        assert_eq!(footer.name(), "footer.html");

        let jar = resolver
            .resolve_content("jar:file:/opt/app.jar!/footer.html", None)
            .await
            .unwrap();
        assert_eq!(jar, footer);

        for missing in ["res:nope.png", "res:../secret"] {
            let err = resolver.resolve_content(missing, None).await.unwrap_err();
            assert!(err.is_missing_resource(), "{missing}: {err}");
        }
    }

    #[tokio::test]
    async fn text_decoding() {
        let (resolver, fetcher) = resolver();
        fetcher.serve(
            "http://example.com/latin1",
            FetchResponse::ok("text/html", vec![b'r', 0xF8, b'd']),
        );
        fetcher.serve(
            "http://example.com/utf8",
            FetchResponse::ok("text/html; charset=utf-8", "r\u{f8}d"),
        );

        for path in ["latin1", "utf8"] {
            let base = Url::parse("http://example.com/").unwrap();
            let text = resolver.resolve_text(path, Some(&base)).await.unwrap();
            assert_eq!(text, "r\u{f8}d");
        }
    }
}
