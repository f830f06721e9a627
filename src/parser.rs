//! Reader of mail specification documents
//!
//! A specification lists the messages to compose:
//!
//! ```xml
//! <email-list>
//!   <tag-domain>example.com *.example.com</tag-domain>
//!   <tag name="utm_source">newsletter</tag>
//!   <email tracking-id="KXQZB">
//!     <subject>Spring sale</subject>
//!     <sent>2024-03-01T09:00:00+0100</sent>
//!     <addresses>
//!       <from><email-address>shop@example.com</email-address><personal>Shop</personal></from>
//!       <to><email-address>ann@example.org</email-address></to>
//!     </addresses>
//!     <plain-body>Spring is here</plain-body>
//!     <html-body><p><a href="https://example.com/sale">Spring</a> is here</p></html-body>
//!     <attachment src="https://example.com/terms.pdf"/>
//!   </email>
//! </email-list>
//! ```
//!
//! Each `<email>` gets a tag frame of its own holding its tracking id, so
//! tagged links in its HTML body carry the id next to the list-wide tags.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, FixedOffset};

use crate::{
    address::Address,
    assembly::MailMessageAssembly,
    config::{Config, TrackingConfig},
    digest::{declare_tag, is_ignorable, EmbeddedPartTable, HtmlDigester, LayoutTransform},
    dom::{Document, NodeId, NodeKind},
    error,
    message::Mailbox,
    resource::{BinaryContent, PartSource, Reference, Resolver},
    tag::TagScopeStack,
    Error,
};

/// Format of `<sent>` timestamps
pub const SENT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Reads `<email>` specifications into [`MailMessageAssembly`]s
///
/// Every call starts from the tagged domains of the configuration, so tags
/// and domains declared by one document never apply to another.
#[derive(Debug, Clone)]
pub struct MailParser {
    resolver: Resolver,
    digester: HtmlDigester,
    tags: TagScopeStack,
    tracking: TrackingConfig,
}

impl MailParser {
    pub fn new(config: &Config, resolver: Resolver) -> Result<Self, Error> {
        let mut tags = TagScopeStack::new();
        tags.add_tagged_domains(&config.tracking.domains)?;
        let digester = HtmlDigester::new(resolver.clone())
            .encoding(config.html.encoding()?)
            .inline_css(config.html.inline_css);

        Ok(Self {
            resolver,
            digester,
            tags,
            tracking: config.tracking.clone(),
        })
    }

    /// Renders HTML bodies using layout elements with `layout`
    pub fn layout(mut self, layout: Arc<dyn LayoutTransform>) -> Self {
        self.digester = self.digester.layout(layout);
        self
    }

    /// Reads every `<email>` among the children of `list`, descending into
    /// nested `<email-list>`s
    ///
    /// `<tag-domain>` and `<tag>` apply to the emails following them.
    pub async fn parse_mails(
        &self,
        doc: &mut Document,
        list: NodeId,
    ) -> Result<Vec<MailMessageAssembly>, Error> {
        let mut tags = self.tags.clone();
        let mut mails = Vec::new();
        let mut pending: Vec<NodeId> = doc.children(list).iter().rev().copied().collect();

        while let Some(node) = pending.pop() {
            match doc.kind(node) {
                NodeKind::Comment(text) => {
                    tracing::info!("\"{text}\" - comment ignored");
                    continue;
                }
                NodeKind::Text(text) => {
                    if !text.trim().is_empty() {
                        tracing::info!("\"{}\" - text ignored", text.trim());
                    }
                    continue;
                }
                NodeKind::Document | NodeKind::Element { .. } => {}
            }

            let name = doc.name(node).unwrap_or_default().to_ascii_lowercase();
            match name.as_str() {
                "email-list" => {
                    tracing::debug!("parsing email-list");
                    pending.extend(doc.children(node).iter().rev().copied());
                }
                "email" => mails.push(self.parse_in_scope(doc, node, &mut tags).await?),
                "tag-domain" => tags.add_tagged_domains(&doc.text_content(node))?,
                "tag" => declare_tag(doc, node, &mut tags),
                _ => tracing::warn!(element = %name, "unknown element ignored"),
            }
        }

        tracing::debug!(mails = mails.len(), "specification read");
        Ok(mails)
    }

    /// Reads a single `<email>` element
    pub async fn parse_mail(&self, doc: &mut Document, email: NodeId) -> Result<MailMessageAssembly, Error> {
        let mut tags = self.tags.clone();
        self.parse_in_scope(doc, email, &mut tags).await
    }

    async fn parse_in_scope(
        &self,
        doc: &mut Document,
        email: NodeId,
        tags: &mut TagScopeStack,
    ) -> Result<MailMessageAssembly, Error> {
        tags.push_frame();
        let parsed = self.read_mail(doc, email, tags).await;
        tags.pop_frame();
        parsed
    }

    async fn read_mail(
        &self,
        doc: &mut Document,
        email: NodeId,
        tags: &mut TagScopeStack,
    ) -> Result<MailMessageAssembly, Error> {
        let tracking_id = match doc.non_empty_attribute(email, "tracking-id") {
            Some(id) => id.to_owned(),
            None => self.random_token(),
        };
        tags.put(self.tracking.parameter.as_str(), tracking_id.as_str());
        tracing::debug!(%tracking_id, "parsing email");

        // parts of a previously composed message, referenced as cid:<id>
        let related = related_parts(doc, email)?;

        let mut mail = MailMessageAssembly::new();
        mail.set_header(self.tracking.header.as_str(), tracking_id.as_str())?;

        let children = doc.children(email).to_vec();
        for node in children {
            let Some(element) = doc.name(node).map(str::to_owned) else {
                if !is_ignorable(doc, node) {
                    tracing::debug!(%node, "non-element ignored");
                }
                continue;
            };

            match element.to_ascii_lowercase().as_str() {
                "subject" => {
                    let subject = doc.text_content(node);
                    tracing::debug!(%subject, "subject");
                    mail.set_subject(subject);
                }
                "sent" => mail.set_sent(parse_sent(&doc.text_content(node))?),
                "plain-body" => {
                    let body = doc.text_content(node);
                    tracing::debug!(characters = body.len(), "text/plain body");
                    mail.set_plain_body(body);
                }
                "html-body" => {
                    let mut table = EmbeddedPartTable::new();
                    for (reference, content) in &related {
                        table.seed(reference.as_str(), content.clone());
                    }
                    let digested = self.digester.digest(doc, node, tags, table).await?;
                    mail.set_html_body(digested.html);
                    for (part_id, source) in digested.related {
                        mail.add_related(part_id, source);
                    }
                }
                "addresses" => read_addresses(doc, node, &mut mail)?,
                "header" => {
                    let name = doc.attribute(node, "name").unwrap_or_default().to_owned();
                    let value = match doc.non_empty_attribute(node, "value") {
                        Some(value) => value.to_owned(),
                        None => doc.text_content(node),
                    };
                    tracing::debug!("{name}: \"{value}\"");
                    mail.set_header(name, value)?;
                }
                "related" => {
                    tracing::debug!(id = doc.attribute(node, "id").unwrap_or_default(), "related part seen");
                }
                "attachment" => {
                    let src = doc.attribute(node, "src").unwrap_or_default();
                    mail.attach(self.attachment(src).await?);
                }
                "message-id" => mail.set_message_id(doc.text_content(node)),
                _ => {
                    let name = format!("X-{}", capitalize(&element));
                    let value = doc.text_content(node);
                    tracing::warn!("unknown {name}: \"{value}\"");
                    mail.set_header(name, value)?;
                }
            }
        }

        Ok(mail)
    }

    /// A tracking id made of the configured alphabet
    fn random_token(&self) -> String {
        let alphabet: Vec<char> = self.tracking.token_alphabet.chars().collect();
        (0..self.tracking.token_length)
            .filter_map(|_| fastrand::choice(&alphabet))
            .collect()
    }

    /// Local and remote attachments are read when the message is composed
    async fn attachment(&self, src: &str) -> Result<PartSource, Error> {
        match Reference::parse(src, None)? {
            Reference::Local(url) => Ok(PartSource::Remote(url)),
            reference => self.resolver.resolve_reference(reference).await,
        }
    }
}

fn parse_sent(text: &str) -> Result<DateTime<FixedOffset>, Error> {
    DateTime::parse_from_str(text.trim(), SENT_FORMAT)
        .map_err(|e| error::document(format!("'sent' unparseable date \"{text}\": {e}")))
}

/// The `<related>` parts of `email`, keyed `cid:<id>`
fn related_parts(doc: &Document, email: NodeId) -> Result<Vec<(String, BinaryContent)>, Error> {
    let mut related = Vec::new();
    for node in doc.element_children(email) {
        if !doc.is_element(node, "related") {
            continue;
        }

        let reference = format!("cid:{}", doc.attribute(node, "id").unwrap_or_default());
        let content_type = doc
            .child_element(node, "type")
            .map(|t| doc.text_content(t).trim().to_owned())
            .unwrap_or_default();
        let payload: String = doc
            .child_element(node, "content")
            .map(|c| doc.text_content(c))
            .unwrap_or_default()
            .split_whitespace()
            .collect();
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| error::document(format!("'{reference}' content: {e}")))?;

        tracing::debug!(%reference, %content_type, bytes = bytes.len(), "saved related part");
        related.push((reference, BinaryContent::new(content_type, "", bytes)));
    }
    Ok(related)
}

fn read_addresses(doc: &Document, addresses: NodeId, mail: &mut MailMessageAssembly) -> Result<(), Error> {
    for node in doc.element_children(addresses) {
        let kind = doc.name(node).unwrap_or_default().to_ascii_lowercase();
        let mailbox = mailbox(doc, node, &kind)?;
        tracing::debug!("{kind}: [{mailbox}]");

        match kind.as_str() {
            "from" => mail.add_from(mailbox),
            "to" => mail.add_to(mailbox),
            "cc" => mail.add_cc(mailbox),
            "bcc" => mail.add_bcc(mailbox),
            "reply-to" => mail.add_reply_to(mailbox),
            "sender" => mail.set_sender(mailbox),
            "bounce-to" => mail.set_bounce_address(mailbox.email),
            _ => tracing::error!("{kind}: unknown address type"),
        }
    }
    Ok(())
}

fn mailbox(doc: &Document, node: NodeId, kind: &str) -> Result<Mailbox, Error> {
    let address = doc
        .child_element(node, "email-address")
        .ok_or_else(|| error::address(format!("'{kind}' email-address is missing")))?;
    let text = doc.text_content(address);
    let text = text.trim();
    if text.is_empty() {
        return Err(error::address(format!("'{kind}' email-address is blank")));
    }
    let email: Address = text
        .parse()
        .map_err(|e| error::address(format!("'{kind}' email-address unparseable - {e}")))?;

    let name = doc
        .child_element(node, "personal")
        .map(|personal| doc.text_content(personal))
        .filter(|name| !name.trim().is_empty());
    Ok(Mailbox::new(name, email))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use url::Url;

    use super::*;
    use crate::resource::{ContentCache, MockFetcher};

    fn parser() -> (MailParser, Arc<MockFetcher>) {
        let fetcher = Arc::new(MockFetcher::new());
        let resolver = Resolver::new(fetcher.clone(), Arc::new(ContentCache::default()));
        (MailParser::new(&Config::default(), resolver).unwrap(), fetcher)
    }

    async fn parse(xml: &str) -> Result<Vec<MailMessageAssembly>, Error> {
        let (parser, _) = parser();
        let mut doc = Document::parse(xml)?;
        let root = doc.root();
        parser.parse_mails(&mut doc, root).await
    }

    #[tokio::test]
    async fn complete_email() {
        let mails = parse(
            r#"<email-list>
                <email tracking-id="KXQZB">
                    <subject>Spring sale</subject>
                    <sent>1994-11-15T09:12:31+0100</sent>
                    <addresses>
                        <from><email-address>shop@example.com</email-address><personal>Shop</personal></from>
                        <to><email-address> ann@example.org </email-address></to>
                        <cc><email-address>bob@example.org</email-address><personal></personal></cc>
                        <bounce-to><email-address>bounces@example.com</email-address></bounce-to>
                    </addresses>
                    <plain-body>Spring is here</plain-body>
                    <header name="X-Campaign" value="spring"/>
                    <header name="X-Segment">regulars</header>
                    <message-id>&lt;sale.1@example.com&gt;</message-id>
                    <priority>high</priority>
                </email>
            </email-list>"#,
        )
        .await
        .unwrap();

        assert_eq!(mails.len(), 1);
        let mail = &mails[0];
        assert_eq!(mail.subject(), "Spring sale");
        assert_eq!(mail.plain_body(), Some("Spring is here"));
        assert_eq!(mail.html_body(), None);
        assert_eq!(mail.header("X-Tracking-ID"), Some("KXQZB"));
        assert_eq!(mail.header("X-Campaign"), Some("spring"));
        assert_eq!(mail.header("X-Segment"), Some("regulars"));
        assert_eq!(mail.header("X-Priority"), Some("high"));
        assert_eq!(mail.message_id.as_deref(), Some("<sale.1@example.com>"));
        assert_eq!(
            mail.sent.map(|sent| sent.to_rfc3339()),
            Some("1994-11-15T09:12:31+01:00".to_owned())
        );

        assert_eq!(mail.from[0].to_string(), "Shop <shop@example.com>");
        assert_eq!(mail.to[0].to_string(), "ann@example.org");
        assert_eq!(mail.cc[0].name, None);
        assert_eq!(
            mail.bounce_address().map(|a| a.to_string()),
            Some("bounces@example.com".to_owned())
        );
    }

    #[tokio::test]
    async fn links_carry_list_tags_and_tracking_id() {
        let mails = parse(
            r#"<email-list>
                <tag-domain>shop.example.com</tag-domain>
                <tag name="utm_source">newsletter</tag>
                <email tracking-id="AAA">
                    <html-body><p><a href="https://shop.example.com/sale?x=1">Sale</a></p></html-body>
                </email>
                <email-list>
                    <email tracking-id="BBB">
                        <html-body><a href="https://elsewhere.example.net/">Elsewhere</a></html-body>
                    </email>
                </email-list>
            </email-list>"#,
        )
        .await
        .unwrap();

        assert_eq!(mails.len(), 2);
        assert_eq!(
            mails[0].html_body(),
            Some("<!DOCTYPE html>\n<p><a href=\"https://shop.example.com/sale?x=1&amp;utm_source=newsletter&amp;track-id=AAA\">Sale</a></p>")
        );
        assert_eq!(
            mails[1].html_body(),
            Some("<!DOCTYPE html>\n<a href=\"https://elsewhere.example.net/\">Elsewhere</a>")
        );
        assert_eq!(mails[1].header("X-Tracking-ID"), Some("BBB"));
    }

    #[tokio::test]
    async fn random_tracking_ids() {
        let mails = parse("<email-list><email/><email/></email-list>").await.unwrap();

        let alphabet = TrackingConfig::default().token_alphabet;
        let ids: Vec<&str> = mails
            .iter()
            .map(|mail| mail.header("X-Tracking-ID").unwrap())
            .collect();
        for id in &ids {
            assert_eq!(id.len(), 10);
            assert!(id.chars().all(|c| alphabet.contains(c)));
        }
        assert_ne!(ids[0], ids[1]);
    }

    #[tokio::test]
    async fn related_parts_are_reused_without_fetching() {
        let (parser, fetcher) = parser();
        let mut doc = Document::parse(
            r#"<email>
                <related id="logo@mail"><type>image/png</type><content>iVBO
                Rw==</content></related>
                <html-body><img src="cid:logo@mail"/></html-body>
                <attachment src="https://cdn.example.com/terms.pdf"/>
                <attachment src="file:///srv/mail/terms.pdf"/>
            </email>"#,
        )
        .unwrap();
        let email = doc.document_element().unwrap();
        let mail = parser.parse_mail(&mut doc, email).await.unwrap();

        assert_eq!(mail.related().len(), 1);
        assert_eq!(
            mail.related()[0].1,
            PartSource::Content(BinaryContent::new("image/png", "", vec![0x89, b'P', b'N', b'G']))
        );
        assert!(mail
            .html_body()
            .unwrap()
            .contains(&format!("cid:{}", mail.related()[0].0)));

        assert_eq!(
            mail.attachments(),
            &[
                PartSource::Remote(Url::parse("https://cdn.example.com/terms.pdf").unwrap()),
                PartSource::Remote(Url::parse("file:///srv/mail/terms.pdf").unwrap()),
            ]
        );
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn bad_addresses() {
        let missing = parse("<email><addresses><to><personal>Ann</personal></to></addresses></email>")
            .await
            .unwrap_err();
        assert!(missing.is_address());
        assert!(missing.to_string().contains("'to' email-address is missing"));

        let blank = parse("<email><addresses><cc><email-address> </email-address></cc></addresses></email>")
            .await
            .unwrap_err();
        assert!(blank.to_string().contains("'cc' email-address is blank"));

        let unparseable = parse(
            "<email><addresses><from><email-address>no-at-sign</email-address></from></addresses></email>",
        )
        .await
        .unwrap_err();
        assert!(unparseable.is_address());
    }

    #[tokio::test]
    async fn bad_sent_date() {
        let err = parse("<email><sent>yesterday</sent></email>").await.unwrap_err();
        assert!(err.is_document());
    }

    #[test]
    fn capitalized_header_names() {
        assert_eq!(capitalize("priority"), "Priority");
        assert_eq!(capitalize(""), "");
    }
}
