use std::{collections::HashSet, time::Instant};

use async_trait::async_trait;
use url::Url;

use super::{content::display_name, BinaryContent};
use crate::{error, Error};

/// Longest chain of redirects followed for one resource
pub const MAX_REDIRECTS: usize = 10;

/// Client identifier sent with every request
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:45.0) Gecko/20100101 Thunderbird/45.8.0";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Response to a single request, redirects not followed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub location: Option<String>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// A `200 OK` response
    pub fn ok<T: Into<String>, B: Into<Vec<u8>>>(content_type: T, body: B) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type.into()),
            location: None,
            body: body.into(),
        }
    }

    /// A redirect response with the given status and `Location`
    pub fn redirect<L: Into<String>>(status: u16, location: L) -> Self {
        Self {
            status,
            content_type: None,
            location: Some(location.into()),
            body: Vec::new(),
        }
    }

    fn is_redirect(&self) -> bool {
        self.status == 301 || self.status == 302
    }
}

/// Issues one GET request for a `http:` or `https:` URL
///
/// Implementations must not follow redirects themselves, and should report a
/// failed TLS handshake as an error for which [`Error::is_tls`] is true.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn get(&self, url: &Url) -> Result<FetchResponse, Error>;
}

/// Fetches `url`, following `301`/`302` redirects
///
/// A TLS failure on an `https:` URL without an explicit port is retried once
/// over plain `http:`. Any other terminal status is returned as content.
pub(crate) async fn fetch_following(fetcher: &dyn Fetch, url: Url) -> Result<BinaryContent, Error> {
    let started = Instant::now();
    let mut url = url;
    let mut seen = HashSet::new();

    tracing::debug!(%url, "fetching");
    let response = loop {
        let key = url.as_str().to_owned();
        if seen.contains(&key) {
            return Err(error::redirect(format!("{url}: redirect loop")));
        }
        if seen.len() > MAX_REDIRECTS {
            return Err(error::redirect(format!("{url}: too many redirects")));
        }
        seen.insert(key);

        let response = match fetcher.get(&url).await {
            Ok(response) => response,
            Err(e) if e.is_tls() && url.scheme() == "https" && url.port().is_none() => {
                let failed = url.clone();
                if url.set_scheme("http").is_err() {
                    return Err(e);
                }
                tracing::warn!(url = %failed, retry = %url, "{e}");
                continue;
            }
            Err(e) => return Err(e),
        };

        if response.is_redirect() {
            let location = response.location.as_deref().ok_or_else(|| {
                error::redirect(format!("{url}: {} without Location", response.status))
            })?;
            let next = url
                .join(location)
                .map_err(|e| error::url(format!("'{location}': {e}")))?;
            tracing::info!(status = response.status, from = %url, to = %next, "redirect");
            url = next;
            continue;
        }

        if response.status == 200 {
            tracing::debug!(%url, status = response.status, "fetched");
        } else {
            tracing::info!(%url, status = response.status, "fetched");
        }
        break response;
    };

    let name = display_name(url.path());
    let content_type = response
        .content_type
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_owned());
    tracing::debug!(
        name,
        bytes = response.body.len(),
        content_type = %content_type,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "read"
    );
    Ok(BinaryContent::new(content_type, name, response.body))
}

#[cfg(feature = "http")]
pub use self::http::HttpFetcher;

#[cfg(feature = "http")]
mod http {
    use std::{error::Error as StdError, time::Duration};

    use async_trait::async_trait;
    use reqwest::header::{HeaderMap, HeaderName, CONTENT_TYPE, LOCATION};
    use url::Url;

    use super::{Fetch, FetchResponse};
    use crate::{error, Error};

    /// [`Fetch`] over HTTP(S) with `reqwest`
    #[derive(Debug, Clone)]
    pub struct HttpFetcher {
        client: reqwest::Client,
    }

    impl HttpFetcher {
        pub fn new(
            user_agent: &str,
            connect_timeout: Duration,
            read_timeout: Duration,
        ) -> Result<Self, Error> {
            let client = reqwest::Client::builder()
                .user_agent(user_agent)
                .connect_timeout(connect_timeout)
                .timeout(read_timeout)
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .map_err(error::network)?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl Fetch for HttpFetcher {
        async fn get(&self, url: &Url) -> Result<FetchResponse, Error> {
            let response = self
                .client
                .get(url.as_str())
                .send()
                .await
                .map_err(classify)?;

            let status = response.status().as_u16();
            let content_type = header(response.headers(), CONTENT_TYPE);
            let location = header(response.headers(), LOCATION);
            let body = response.bytes().await.map_err(classify)?.to_vec();

            Ok(FetchResponse {
                status,
                content_type,
                location,
                body,
            })
        }
    }

    fn header(headers: &HeaderMap, name: HeaderName) -> Option<String> {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    }

    fn classify(e: reqwest::Error) -> Error {
        if e.is_connect() && is_tls_failure(&e) {
            error::tls(e)
        } else {
            error::network(e)
        }
    }

    fn is_tls_failure(e: &(dyn StdError + 'static)) -> bool {
        let mut source = Some(e);
        while let Some(err) = source {
            let text = err.to_string().to_ascii_lowercase();
            if ["tls", "ssl", "certificate", "handshake"]
                .iter()
                .any(|needle| text.contains(needle))
            {
                return true;
            }
            source = err.source();
        }
        false
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::{
        collections::HashMap,
        sync::{Mutex, PoisonError},
    };

    use super::*;

    /// Serves canned responses and records every requested URL
    #[derive(Debug, Default)]
    pub(crate) struct MockFetcher {
        responses: Mutex<HashMap<String, MockResponse>>,
        requests: Mutex<Vec<String>>,
    }

    #[derive(Debug, Clone)]
    enum MockResponse {
        Response(FetchResponse),
        TlsFailure,
    }

    impl MockFetcher {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn serve(&self, url: &str, response: FetchResponse) {
            self.responses
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(url.to_owned(), MockResponse::Response(response));
        }

        pub(crate) fn fail_tls(&self, url: &str) {
            self.responses
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(url.to_owned(), MockResponse::TlsFailure);
        }

        pub(crate) fn requests(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    #[async_trait]
    impl Fetch for MockFetcher {
        async fn get(&self, url: &Url) -> Result<FetchResponse, Error> {
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(url.to_string());
            let response = self
                .responses
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(url.as_str())
                .cloned();
            match response {
                Some(MockResponse::Response(response)) => Ok(response),
                Some(MockResponse::TlsFailure) => {
                    Err(error::tls(format!("{url}: handshake failure")))
                }
                None => Err(error::network(format!("{url}: connection refused"))),
            }
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn redirect_chain(fetcher: &MockFetcher, hops: usize) {
        for i in 0..hops {
            fetcher.serve(
                &format!("http://example.com/r{i}"),
                FetchResponse::redirect(if i % 2 == 0 { 301 } else { 302 }, format!("/r{}", i + 1)),
            );
        }
        fetcher.serve(
            &format!("http://example.com/r{hops}"),
            FetchResponse::ok("text/plain", "done"),
        );
    }

    #[tokio::test]
    async fn plain_fetch() {
        let fetcher = MockFetcher::new();
        fetcher.serve(
            "https://example.com/img/logo.png?v=2",
            FetchResponse::ok("image/png", vec![1, 2, 3]),
        );

        let content = fetch_following(&fetcher, url("https://example.com/img/logo.png?v=2"))
            .await
            .unwrap();
        assert_eq!(content.content_type(), "image/png");
        assert_eq!(content.name(), "logo.png");
        assert_eq!(content.bytes(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn ten_redirects_are_followed() {
        let fetcher = MockFetcher::new();
        redirect_chain(&fetcher, MAX_REDIRECTS);

        let content = fetch_following(&fetcher, url("http://example.com/r0"))
            .await
            .unwrap();
        assert_eq!(content.bytes(), b"done");
        assert_eq!(content.name(), "r10");
        assert_eq!(fetcher.requests().len(), MAX_REDIRECTS + 1);
    }

    #[tokio::test]
    async fn eleven_redirects_are_too_many() {
        let fetcher = MockFetcher::new();
        redirect_chain(&fetcher, MAX_REDIRECTS + 1);

        let err = fetch_following(&fetcher, url("http://example.com/r0"))
            .await
            .unwrap_err();
        assert!(err.is_redirect());
        assert!(err.to_string().contains("too many redirects"));
    }

    #[tokio::test]
    async fn redirect_loop() {
        let fetcher = MockFetcher::new();
        fetcher.serve("http://example.com/a", FetchResponse::redirect(302, "/b"));
        fetcher.serve("http://example.com/b", FetchResponse::redirect(301, "http://example.com/a"));

        let err = fetch_following(&fetcher, url("http://example.com/a"))
            .await
            .unwrap_err();
        assert!(err.is_redirect());
        assert!(err.to_string().contains("redirect loop"));
    }

    #[tokio::test]
    async fn tls_failure_falls_back_to_http() {
        let fetcher = MockFetcher::new();
        fetcher.fail_tls("https://example.com/logo.png");
        fetcher.serve("http://example.com/logo.png", FetchResponse::ok("image/png", "png"));

        let content = fetch_following(&fetcher, url("https://example.com/logo.png"))
            .await
            .unwrap();
        assert_eq!(content.bytes(), b"png");
        assert_eq!(
            fetcher.requests(),
            ["https://example.com/logo.png", "http://example.com/logo.png"]
        );
    }

    #[tokio::test]
    async fn tls_failure_with_explicit_port_is_fatal() {
        let fetcher = MockFetcher::new();
        fetcher.fail_tls("https://example.com:8443/logo.png");

        let err = fetch_following(&fetcher, url("https://example.com:8443/logo.png"))
            .await
            .unwrap_err();
        assert!(err.is_tls());
        assert_eq!(fetcher.requests().len(), 1);
    }

    #[tokio::test]
    async fn error_status_is_content() {
        let fetcher = MockFetcher::new();
        fetcher.serve(
            "http://example.com/missing.png",
            FetchResponse {
                status: 404,
                content_type: None,
                location: None,
                body: b"not found".to_vec(),
            },
        );

        let content = fetch_following(&fetcher, url("http://example.com/missing.png"))
            .await
            .unwrap();
        assert_eq!(content.content_type(), DEFAULT_CONTENT_TYPE);
        assert_eq!(content.bytes(), b"not found");
    }
}
