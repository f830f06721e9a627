//! Digestion of HTML bodies
//!
//! [`HtmlDigester::digest`] walks the body of a document once, depth-first,
//! and rewrites it in place:
//!
//! * `img`/`link` sources and `background` images of structural elements
//!   become `cid:` references to related parts, `data:` URLs or are left
//!   alone, depending on their `embed` attribute
//! * `url(...)` references in `style` attributes become `cid:` references
//! * links to tagged domains get the tags in scope appended
//! * `tag` elements declare tags for the rest of their enclosing element
//! * `include` elements are replaced by the text they point at
//!
//! The related parts come out of the pass together with the rewritten HTML.

use std::{collections::HashMap, fmt, sync::Arc, sync::OnceLock};

use base64::{engine::general_purpose::STANDARD, Engine};
use encoding_rs::Encoding;
use regex::{Captures, Regex};
use url::Url;

use crate::{
    dom::{Document, NodeId, NodeKind},
    error,
    resource::{BinaryContent, PartSource, Resolver},
    tag::TagScopeStack,
    BoxError, Error,
};

/// Serialization prefix of every non-empty digested body
pub const DOCTYPE: &str = "<!DOCTYPE html>\n";

const BACKGROUND_ELEMENTS: &[&str] = &["body", "table", "tr", "td", "div", "th"];
const LAYOUT_ELEMENTS: &[&str] = &["row", "columns", "callout", "container", "wrapper", "spacer"];

/// Renders markup written with the responsive layout vocabulary
/// (`row`, `columns`, `container`...) into plain HTML
///
/// Failures are reported as layout errors of the digestion.
pub trait LayoutTransform: Send + Sync {
    fn transform(&self, document: &Document, node: NodeId, inline_css: bool) -> Result<String, BoxError>;
}

/// Part ids and contents of the resources embedded by one digestion pass
///
/// Both mappings are keyed by the reference as written in the document.
/// Contents may be seeded before the pass, for example with the related
/// parts of a previously composed message, keyed `cid:<id>`.
#[derive(Debug, Default)]
pub struct EmbeddedPartTable {
    part_ids: Vec<(String, String)>,
    contents: HashMap<String, PartSource>,
}

impl EmbeddedPartTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `content` known under `reference`, so that it is not resolved again
    pub fn seed<R: Into<String>>(&mut self, reference: R, content: BinaryContent) {
        self.contents.insert(reference.into(), content.into());
    }

    pub fn part_id(&self, reference: &str) -> Option<&str> {
        self.part_ids
            .iter()
            .find(|(r, _)| r == reference)
            .map(|(_, id)| id.as_str())
    }

    pub fn content(&self, reference: &str) -> Option<&PartSource> {
        self.contents.get(reference)
    }

    /// Number of references given a part id
    pub fn len(&self) -> usize {
        self.part_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.part_ids.is_empty()
    }

    fn assign(&mut self, reference: &str) -> String {
        if let Some(id) = self.part_id(reference) {
            return id.to_owned();
        }
        let id = format!(
            "part.{}.{}@mail",
            self.part_ids.len() + 1,
            chrono::Utc::now().timestamp_millis()
        );
        tracing::debug!(reference, part_id = %id, "embedded as related part");
        self.part_ids.push((reference.to_owned(), id.clone()));
        id
    }

    /// The part id and content of every embedded reference, in order of assignment
    fn into_related(mut self) -> Vec<(String, PartSource)> {
        let mut related = Vec::with_capacity(self.part_ids.len());
        for (reference, id) in self.part_ids {
            match self.contents.remove(&reference) {
                Some(source) => related.push((id, source)),
                None => tracing::error!(reference, part_id = %id, "no content for part"),
            }
        }
        related
    }
}

/// Result of a digestion pass
#[derive(Debug)]
pub struct DigestedHtml {
    /// The rewritten body, empty if the body had no content
    pub html: String,
    /// `(part id, content)` of each related part referenced by `html`
    pub related: Vec<(String, PartSource)>,
    /// Whether layout vocabulary was seen
    pub uses_layout: bool,
}

#[derive(Clone)]
pub struct HtmlDigester {
    resolver: Resolver,
    encoding: &'static Encoding,
    layout: Option<Arc<dyn LayoutTransform>>,
    inline_css: bool,
}

impl fmt::Debug for HtmlDigester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlDigester")
            .field("encoding", &self.encoding.name())
            .field("layout", &self.layout.is_some())
            .field("inline_css", &self.inline_css)
            .finish_non_exhaustive()
    }
}

enum Step {
    Visit(NodeId),
    Leave,
}

/// What to do with the children of a visited node
enum Descend {
    Children,
    Skip,
}

impl HtmlDigester {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            encoding: encoding_rs::UTF_8,
            layout: None,
            inline_css: false,
        }
    }

    /// Sets the encoding of percent-coded query strings in links
    pub fn encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn layout(mut self, layout: Arc<dyn LayoutTransform>) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn inline_css(mut self, inline_css: bool) -> Self {
        self.inline_css = inline_css;
        self
    }

    /// Digests the children of `body`
    ///
    /// A frame is pushed onto `tags` for each element entered, so tags declared
    /// inside the body never leak out of it, while tags already on the stack
    /// apply to links in the body. The stack is back at its original depth
    /// when this returns, also on error.
    pub async fn digest(
        &self,
        doc: &mut Document,
        body: NodeId,
        tags: &mut TagScopeStack,
        table: EmbeddedPartTable,
    ) -> Result<DigestedHtml, Error> {
        let depth = tags.depth();
        let mut pass = Pass {
            digester: self,
            table,
            uses_layout: false,
            base: None,
        };

        let walked = pass.walk(doc, body, tags).await;
        while tags.depth() > depth {
            tags.pop_frame();
        }
        walked?;

        tracing::debug!(parts = pass.table.len(), "html digested");
        let html = self.serialize(doc, body, pass.uses_layout)?;
        tracing::debug!(characters = html.len(), "html body");

        Ok(DigestedHtml {
            html,
            related: pass.table.into_related(),
            uses_layout: pass.uses_layout,
        })
    }

    fn serialize(&self, doc: &Document, body: NodeId, uses_layout: bool) -> Result<String, Error> {
        let children = doc.children(body);
        if children.is_empty() {
            return Ok(String::new());
        }

        let mut html = String::from(DOCTYPE);
        match (uses_layout, &self.layout) {
            (true, Some(layout)) => {
                for &child in children {
                    let rendered = layout
                        .transform(doc, child, self.inline_css)
                        .map_err(error::layout)?;
                    html.push_str(&rendered);
                }
            }
            (uses_layout, _) => {
                if uses_layout {
                    tracing::warn!("layout elements found, but no layout transform is configured");
                }
                for &child in children {
                    html.push_str(&doc.outer_html(child));
                }
            }
        }
        Ok(html)
    }
}

struct Pass<'d> {
    digester: &'d HtmlDigester,
    table: EmbeddedPartTable,
    uses_layout: bool,
    base: Option<Url>,
}

impl Pass<'_> {
    async fn walk(&mut self, doc: &mut Document, body: NodeId, tags: &mut TagScopeStack) -> Result<(), Error> {
        tags.push_frame();
        let mut steps = vec![Step::Leave];
        steps.extend(doc.children(body).iter().rev().map(|&c| Step::Visit(c)));

        while let Some(step) = steps.pop() {
            match step {
                Step::Leave => tags.pop_frame(),
                Step::Visit(node) => {
                    if let Descend::Skip = self.visit(doc, node, tags).await? {
                        continue;
                    }
                    tags.push_frame();
                    steps.push(Step::Leave);
                    steps.extend(doc.children(node).iter().rev().map(|&c| Step::Visit(c)));
                }
            }
        }
        Ok(())
    }

    async fn visit(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        tags: &mut TagScopeStack,
    ) -> Result<Descend, Error> {
        let Some(name) = doc.name(node).map(str::to_ascii_lowercase) else {
            return Ok(Descend::Skip);
        };

        match name.as_str() {
            "img" => self.replace_resource(doc, node, "src").await?,
            "link" => self.replace_resource(doc, node, "href").await?,
            "base" => self.set_base(doc, node),
            "include" => return self.include(doc, node).await,
            "tag" => {
                declare_tag(doc, node, tags);
                doc.detach(node);
                return Ok(Descend::Skip);
            }
            "binary-content" => {
                doc.detach(node);
                return Ok(Descend::Skip);
            }
            n if BACKGROUND_ELEMENTS.contains(&n) => {
                self.replace_resource(doc, node, "background").await?
            }
            n if LAYOUT_ELEMENTS.contains(&n) => self.uses_layout = true,
            _ => {}
        }

        if let Some(style) = doc.attribute(node, "style").map(str::to_owned) {
            let digested = self.digest_style(&style).await?;
            if digested != style {
                tracing::debug!(from = %style, to = %digested, "style urls");
                doc.set_attribute(node, "style", digested);
            }
        }

        if let Some(href) = doc.attribute(node, "href").map(str::to_owned) {
            let tagged = tags.amend_href_address(&href, self.digester.encoding)?;
            if tagged != href {
                tracing::info!(from = %href, to = %tagged, "tagged link");
                doc.set_attribute(node, "href", tagged);
            }
        }

        Ok(Descend::Children)
    }

    fn set_base(&mut self, doc: &Document, node: NodeId) {
        let href = doc.attribute(node, "href").unwrap_or_default();
        match Url::parse(href) {
            Ok(base) => {
                tracing::debug!(%base, "base href");
                self.base = Some(base);
            }
            Err(e) => tracing::error!("bad <base href=\"{href}\">: {e}"),
        }
    }

    /// Embeds the resource referenced by `attribute`, or by a nested
    /// `binary-content` element when the attribute is missing or empty
    async fn replace_resource(&mut self, doc: &mut Document, node: NodeId, attribute: &str) -> Result<(), Error> {
        let reference = match doc.non_empty_attribute(node, attribute) {
            Some(reference) => reference.to_owned(),
            None => match self.binary_content(doc, node)? {
                Some(reference) => reference,
                None => return Ok(()),
            },
        };

        let embed = doc.attribute(node, "embed").map(str::to_owned);
        match embed.as_deref() {
            Some("inline") => {
                let content = self.content(&reference).await?;
                doc.set_attribute(node, attribute, content.to_data_url());
            }
            Some("false") => {}
            _ => {
                let cid = self.cid_reference(&reference).await?;
                doc.set_attribute(node, attribute, cid);
            }
        }
        doc.remove_attribute(node, "embed");
        Ok(())
    }

    /// Registers the first `binary-content` child of `node` as `mem:/<md5>`,
    /// or as `mem:/<payload>` when it carries no digest
    fn binary_content(&mut self, doc: &Document, node: NodeId) -> Result<Option<String>, Error> {
        let Some(payload) = doc
            .element_children(node)
            .find(|&child| doc.is_element(child, "binary-content"))
        else {
            return Ok(None);
        };

        let md5 = doc.attribute(payload, "md5").unwrap_or_default();
        let base64: String = doc
            .text_content(payload)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let reference = if md5.is_empty() {
            format!("mem:/{base64}")
        } else {
            format!("mem:/{md5}")
        };
        if self.table.content(&reference).is_none() {
            let content_type = doc.attribute(payload, "type").unwrap_or_default();
            let bytes = STANDARD
                .decode(&base64)
                .map_err(|e| error::document(format!("<binary-content md5=\"{md5}\">: {e}")))?;
            self.table
                .seed(reference.clone(), BinaryContent::new(content_type, md5, bytes));
        }
        Ok(Some(reference))
    }

    /// The part source of `reference`, resolved against the current base once per pass
    async fn source(&mut self, reference: &str) -> Result<&PartSource, Error> {
        if self.table.content(reference).is_none() {
            let source = self
                .digester
                .resolver
                .resolve(reference, self.base.as_ref())
                .await?;
            self.table.contents.insert(reference.to_owned(), source);
        }
        self.table
            .content(reference)
            .ok_or_else(|| error::unresolvable(format!("'{reference}'")))
    }

    async fn content(&mut self, reference: &str) -> Result<BinaryContent, Error> {
        let source = self.source(reference).await?.clone();
        self.digester.resolver.load(&source).await
    }

    async fn cid_reference(&mut self, reference: &str) -> Result<String, Error> {
        self.source(reference).await?;
        Ok(format!("cid:{}", self.table.assign(reference)))
    }

    async fn digest_style(&mut self, style: &str) -> Result<String, Error> {
        let urls: Vec<(usize, usize, String, String)> = css_url()
            .captures_iter(style)
            .filter_map(|caps: Captures<'_>| {
                let whole = caps.get(0)?;
                let quote = caps.name("quote").map_or("", |m| m.as_str());
                let url = caps.name("url")?.as_str();
                Some((whole.start(), whole.end(), quote.to_owned(), url.to_owned()))
            })
            .collect();

        let mut digested = String::with_capacity(style.len());
        let mut last = 0;
        for (start, end, quote, url) in urls {
            let cid = self.cid_reference(&url).await?;
            digested.push_str(&style[last..start]);
            digested.push_str(&format!("url({quote}{cid}{quote})"));
            last = end;
        }
        digested.push_str(&style[last..]);
        Ok(digested)
    }

    /// Replaces an `include` element by the text it references
    ///
    /// A failed fetch is logged and leaves the element in place.
    async fn include(&mut self, doc: &mut Document, node: NodeId) -> Result<Descend, Error> {
        let Some(src) = doc.non_empty_attribute(node, "src").map(str::to_owned) else {
            return Ok(Descend::Children);
        };
        tracing::debug!(src = %src, "including");

        match self.digester.resolver.resolve_text(&src, self.base.as_ref()).await {
            Ok(text) => {
                let text = doc.create_text(text);
                doc.replace(node, text);
                Ok(Descend::Skip)
            }
            Err(e) => {
                tracing::error!(src = %src, "include failed: {e}");
                Ok(Descend::Children)
            }
        }
    }
}

/// Puts the tag declared by a `tag` element into the innermost frame
pub(crate) fn declare_tag(doc: &Document, node: NodeId, tags: &mut TagScopeStack) {
    let name = doc.attribute(node, "name").unwrap_or_default();
    if name.is_empty() {
        tracing::warn!("<tag> without name ignored");
        return;
    }
    let value = match doc.attribute(node, "value") {
        Some(value) => value.to_owned(),
        None => doc.text_content(node),
    };
    tags.put(name, value);
}

fn css_url() -> &'static Regex {
    static CSS_URL: OnceLock<Regex> = OnceLock::new();
    CSS_URL.get_or_init(|| {
        Regex::new(r#"url\((?P<quote>['"]?)(?P<url>[^)'"]+)['"]?\)"#).expect("css url pattern is valid")
    })
}

/// Returns true for comments and whitespace-only text
pub(crate) fn is_ignorable(doc: &Document, node: NodeId) -> bool {
    match doc.kind(node) {
        NodeKind::Comment(_) => true,
        NodeKind::Text(text) => text.trim().is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::resource::{ContentCache, FetchResponse, MockFetcher};

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G'];

    fn digester() -> (HtmlDigester, Arc<MockFetcher>) {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.serve(
            "https://cdn.example.com/logo.png",
            FetchResponse::ok("image/png", PNG),
        );
        fetcher.serve(
            "https://cdn.example.com/footer.html",
            FetchResponse::ok("text/html", "<p>Bye</p>"),
        );
        let resolver = Resolver::new(fetcher.clone(), Arc::new(ContentCache::default()));
        (HtmlDigester::new(resolver), fetcher)
    }

    async fn digest(xml: &str, tags: &mut TagScopeStack) -> Result<(DigestedHtml, Document), Error> {
        let (digester, _) = digester();
        let mut doc = Document::parse(xml)?;
        let body = doc.document_element().expect("body");
        let digested = digester
            .digest(&mut doc, body, tags, EmbeddedPartTable::new())
            .await?;
        Ok((digested, doc))
    }

    fn cids(html: &str) -> Vec<&str> {
        html.match_indices("cid:part.")
            .map(|(i, _)| {
                let rest = &html[i + 4..];
                let end = rest.find(['"', '\'', ')']).unwrap_or(rest.len());
                &rest[..end]
            })
            .collect()
    }

    #[tokio::test]
    async fn images_become_related_parts() {
        let mut tags = TagScopeStack::new();
        let (digested, _) = digest(
            r#"<html-body><base href="https://cdn.example.com/"/><div><img src="logo.png"/><img SRC="https://cdn.example.com/logo.png"/><img src="logo.png" embed="false"/></div></html-body>"#,
            &mut tags,
        )
        .await
        .unwrap();

        assert!(digested.html.starts_with(DOCTYPE));
        assert!(!digested.html.contains("embed="));
        assert!(digested.html.contains(r#"<img src="logo.png">"#));

        let ids = cids(&digested.html);
        assert_eq!(ids.len(), 2);
        assert!(ids[0].starts_with("part.1.") && ids[0].ends_with("@mail"));
        assert!(ids[1].starts_with("part.2."));

        assert_eq!(digested.related.len(), 2);
        assert_eq!(digested.related[0].0, ids[0]);
        assert_eq!(
            digested.related[0].1,
            PartSource::Remote(Url::parse("https://cdn.example.com/logo.png").unwrap())
        );
    }

    #[tokio::test]
    async fn same_reference_same_part() {
        let mut tags = TagScopeStack::new();
        let (digested, _) = digest(
            r#"<html-body><img src="https://cdn.example.com/logo.png"/><table background="https://cdn.example.com/logo.png"><tr><td style="background: url('https://cdn.example.com/logo.png') no-repeat">x</td></tr></table></html-body>"#,
            &mut tags,
        )
        .await
        .unwrap();

        let ids = cids(&digested.html);
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(digested.related.len(), 1);
        assert!(digested.html.contains(&format!("url(&apos;cid:{}&apos;) no-repeat", ids[0])));
    }

    #[tokio::test]
    async fn inline_embedding() {
        let mut tags = TagScopeStack::new();
        let (digested, _) = digest(
            r#"<html-body><img embed="inline" src="https://cdn.example.com/logo.png"/></html-body>"#,
            &mut tags,
        )
        .await
        .unwrap();

        assert_eq!(
            digested.html,
            "<!DOCTYPE html>\n<img src=\"data:image/png;base64,iVBORw==\">"
        );
        assert!(digested.related.is_empty());
    }

    #[tokio::test]
    async fn binary_content() {
        let mut tags = TagScopeStack::new();
        let (digested, _) = digest(
            r#"<html-body><img alt="x"><binary-content md5="abc" type="image/gif">R0lG
ODlh</binary-content></img></html-body>"#,
            &mut tags,
        )
        .await
        .unwrap();

        assert!(!digested.html.contains("binary-content"));
        assert_eq!(digested.related.len(), 1);
        let PartSource::Content(content) = &digested.related[0].1 else {
            panic!("binary content is not lazy");
        };
        assert_eq!(content.bytes(), b"GIF89a");
        assert_eq!(content.content_type(), "image/gif");
        assert_eq!(content.name(), "abc");
    }

    #[tokio::test]
    async fn binary_content_without_digest() {
        let mut tags = TagScopeStack::new();
        let (digested, _) = digest(
            concat!(
                r#"<html-body><img><binary-content type="image/gif">R0lGODlh</binary-content></img>"#,
                r#"<img><binary-content type="image/png">iVBORw==</binary-content></img>"#,
                r#"<img><binary-content type="image/gif">R0lGODlh</binary-content></img></html-body>"#,
            ),
            &mut tags,
        )
        .await
        .unwrap();

        assert_eq!(digested.related.len(), 2);
        let bytes: Vec<&[u8]> = digested
            .related
            .iter()
            .map(|(_, source)| match source {
                PartSource::Content(content) => content.bytes(),
                PartSource::Remote(_) => panic!("binary content is not lazy"),
            })
            .collect();
        assert_eq!(bytes, [&b"GIF89a"[..], &[0x89, b'P', b'N', b'G'][..]]);
    }

    #[tokio::test]
    async fn seeded_parts_are_not_resolved() {
        let (digester, fetcher) = digester();
        let mut doc = Document::parse(r#"<b><img src="cid:part.1.99@mail"/></b>"#).unwrap();
        let body = doc.document_element().unwrap();
        let mut table = EmbeddedPartTable::new();
        let seeded = BinaryContent::new("image/png", "", PNG.to_vec());
        table.seed("cid:part.1.99@mail", seeded.clone());

        let digested = digester
            .digest(&mut doc, body, &mut TagScopeStack::new(), table)
            .await
            .unwrap();
        assert_eq!(digested.related.len(), 1);
        assert_eq!(digested.related[0].1, PartSource::Content(seeded));
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn relative_reference_without_base_aborts() {
        let mut tags = TagScopeStack::new();
        tags.put("utm_medium", "email");
        let err = digest(
            r#"<html-body><div><tag name="x" value="y"/><img src="logo.png"/></div></html-body>"#,
            &mut tags,
        )
        .await
        .unwrap_err();

        assert!(err.is_unresolvable());
        assert_eq!(tags.depth(), 1);
    }

    #[tokio::test]
    async fn tags_are_scoped_to_their_element() {
        let mut tags = TagScopeStack::new();
        tags.add_tagged_domains("example.com").unwrap();
        tags.put("utm_medium", "email");

        let (digested, _) = digest(
            concat!(
                r#"<html-body><p><tag name="utm_source">Newsletter</tag>"#,
                r#"<a href="http://example.com/a">a</a><span><tag name="utm_source" value="Inner"/>"#,
                r#"<a HREF="http://example.com/b">b</a></span><a href="http://example.com/c">c</a></p>"#,
                r#"<a href="http://example.com/d?utm_medium=web#top">d</a><a href="http://example.org/e">e</a></html-body>"#
            ),
            &mut tags,
        )
        .await
        .unwrap();

        assert_eq!(
            digested.html,
            concat!(
                "<!DOCTYPE html>\n<p>",
                r#"<a href="http://example.com/a?utm_medium=email&amp;utm_source=Newsletter">a</a>"#,
                r#"<span><a href="http://example.com/b?utm_medium=email&amp;utm_source=Inner">b</a></span>"#,
                r#"<a href="http://example.com/c?utm_medium=email&amp;utm_source=Newsletter">c</a></p>"#,
                r#"<a href="http://example.com/d?utm_medium=web#top">d</a><a href="http://example.org/e">e</a>"#
            )
        );
        assert_eq!(tags.depth(), 1);
        assert_eq!(tags.get("utm_source"), None);
    }

    #[tokio::test]
    async fn includes_and_layout_flag() {
        let mut tags = TagScopeStack::new();
        let (digested, _) = digest(
            r#"<html-body><container><include src="https://cdn.example.com/footer.html"/><include src="https://cdn.example.com/gone.html"/></container></html-body>"#,
            &mut tags,
        )
        .await
        .unwrap();

        assert!(digested.uses_layout);
        assert_eq!(
            digested.html,
            concat!(
                "<!DOCTYPE html>\n<container>&lt;p&gt;Bye&lt;/p&gt;",
                r#"<include src="https://cdn.example.com/gone.html"></include></container>"#
            )
        );
    }

    #[tokio::test]
    async fn layout_transform() {
        struct Upper;

        impl LayoutTransform for Upper {
            fn transform(&self, doc: &Document, node: NodeId, inline_css: bool) -> Result<String, BoxError> {
                assert!(inline_css);
                Ok(doc.outer_html(node).to_uppercase())
            }
        }

        let (digester, _) = digester();
        let digester = digester.layout(Arc::new(Upper)).inline_css(true);
        let mut doc = Document::parse("<b><row>x</row></b>").unwrap();
        let body = doc.document_element().unwrap();
        let digested = digester
            .digest(&mut doc, body, &mut TagScopeStack::new(), EmbeddedPartTable::new())
            .await
            .unwrap();
        assert_eq!(digested.html, "<!DOCTYPE html>\n<ROW>X</ROW>");
    }

    #[tokio::test]
    async fn failing_layout_transform() {
        struct Broken;

        impl LayoutTransform for Broken {
            fn transform(&self, _: &Document, _: NodeId, _: bool) -> Result<String, BoxError> {
                Err("unknown column count".into())
            }
        }

        let (digester, _) = digester();
        let digester = digester.layout(Arc::new(Broken));
        let mut doc = Document::parse("<b><row>x</row></b>").unwrap();
        let body = doc.document_element().unwrap();
        let err = digester
            .digest(&mut doc, body, &mut TagScopeStack::new(), EmbeddedPartTable::new())
            .await
            .unwrap_err();
        assert!(err.is_layout());
        assert_eq!(err.to_string(), "layout transform error: unknown column count");
    }

    #[tokio::test]
    async fn empty_body() {
        let mut tags = TagScopeStack::new();
        let (digested, _) = digest("<html-body/>", &mut tags).await.unwrap();
        assert_eq!(digested.html, "");
    }
}
