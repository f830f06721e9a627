//! Everything a message is composed from

use chrono::{DateTime, FixedOffset};

use crate::{
    address::Address,
    error,
    message::{
        header::{HeaderName, HeaderValue, Headers},
        Mailbox, Part,
    },
    resource::PartSource,
    Error,
};

/// Subject of messages which were not given one
pub const NO_SUBJECT: &str = "(no subject)";

/// The contents and addressing of one outbound message, before composition
///
/// Filled in by the [`MailParser`][crate::MailParser] or by hand, and
/// consumed by [`Composer::compose`][crate::Composer::compose].
#[derive(Debug, Clone)]
pub struct MailMessageAssembly {
    pub(crate) sender: Option<Mailbox>,
    pub(crate) bounce: Option<Address>,
    pub(crate) from: Vec<Mailbox>,
    pub(crate) reply_to: Vec<Mailbox>,
    pub(crate) to: Vec<Mailbox>,
    pub(crate) cc: Vec<Mailbox>,
    pub(crate) bcc: Vec<Mailbox>,
    pub(crate) subject: String,
    pub(crate) sent: Option<DateTime<FixedOffset>>,
    pub(crate) message_id: Option<String>,
    pub(crate) headers: Headers,
    pub(crate) plain_body: Option<String>,
    pub(crate) html_body: Option<String>,
    pub(crate) alternative_body: Option<Part>,
    pub(crate) related: Vec<(String, PartSource)>,
    pub(crate) attachments: Vec<PartSource>,
}

impl Default for MailMessageAssembly {
    fn default() -> Self {
        Self {
            sender: None,
            bounce: None,
            from: Vec::new(),
            reply_to: Vec::new(),
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: NO_SUBJECT.to_owned(),
            sent: None,
            message_id: None,
            headers: Headers::new(),
            plain_body: None,
            html_body: None,
            alternative_body: None,
            related: Vec::new(),
            attachments: Vec::new(),
        }
    }
}

impl MailMessageAssembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the mailbox sending on behalf of the `From` mailboxes
    pub fn set_sender(&mut self, sender: Mailbox) {
        self.sender = Some(sender);
    }

    /// Sets the envelope sender bounces go to
    pub fn set_bounce_address(&mut self, bounce: Address) {
        self.bounce = Some(bounce);
    }

    pub fn bounce_address(&self) -> Option<&Address> {
        self.bounce.as_ref()
    }

    pub fn add_from(&mut self, mailbox: Mailbox) {
        self.from.push(mailbox);
    }

    pub fn add_reply_to(&mut self, mailbox: Mailbox) {
        self.reply_to.push(mailbox);
    }

    pub fn add_to(&mut self, mailbox: Mailbox) {
        self.to.push(mailbox);
    }

    pub fn add_cc(&mut self, mailbox: Mailbox) {
        self.cc.push(mailbox);
    }

    pub fn add_bcc(&mut self, mailbox: Mailbox) {
        self.bcc.push(mailbox);
    }

    /// The first `To`, else `Cc`, else `Bcc` recipient
    pub fn first_recipient(&self) -> Option<&Mailbox> {
        self.to
            .first()
            .or_else(|| self.cc.first())
            .or_else(|| self.bcc.first())
    }

    pub fn set_subject<S: Into<String>>(&mut self, subject: S) {
        self.subject = subject.into();
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Sets the `Date` of the message, which is the time of composition otherwise
    pub fn set_sent(&mut self, sent: DateTime<FixedOffset>) {
        self.sent = Some(sent);
    }

    pub fn set_message_id<S: Into<String>>(&mut self, id: S) {
        self.message_id = Some(id.into());
    }

    /// Sets a custom header, replacing any header of the same name
    pub fn set_header<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) -> Result<(), Error> {
        let name = HeaderName::new_from_ascii(name.into()).map_err(error::document)?;
        self.headers.set_raw(HeaderValue::new(name, value.into()));
        Ok(())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get_raw(name)
    }

    pub fn set_plain_body<S: Into<String>>(&mut self, text: S) {
        self.plain_body = Some(text.into());
    }

    pub fn plain_body(&self) -> Option<&str> {
        self.plain_body.as_deref()
    }

    pub fn set_html_body<S: Into<String>>(&mut self, html: S) {
        self.html_body = Some(html.into());
    }

    pub fn html_body(&self) -> Option<&str> {
        self.html_body.as_deref()
    }

    /// Sets a ready-made variant of the body, composed next to the plain and HTML bodies
    pub fn set_alternative_body(&mut self, part: Part) {
        self.alternative_body = Some(part);
    }

    /// Adds a part referenced from the HTML body as `cid:<part_id>`,
    /// replacing any part with the same id
    pub fn add_related<S: Into<String>>(&mut self, part_id: S, source: PartSource) {
        let part_id = part_id.into();
        match self.related.iter_mut().find(|(id, _)| *id == part_id) {
            Some(entry) => entry.1 = source,
            None => self.related.push((part_id, source)),
        }
    }

    pub fn related(&self) -> &[(String, PartSource)] {
        &self.related
    }

    pub fn attach(&mut self, source: PartSource) {
        self.attachments.push(source);
    }

    pub fn attachments(&self) -> &[PartSource] {
        &self.attachments
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::resource::BinaryContent;

    #[test]
    fn custom_headers_last_write_wins() {
        let mut assembly = MailMessageAssembly::new();
        assembly.set_header("X-Campaign", "spring").unwrap();
        assembly.set_header("x-campaign", "summer").unwrap();

        assert_eq!(assembly.header("X-Campaign"), Some("summer"));
        assert_eq!(assembly.headers.len(), 1);
        assert!(assembly.set_header("X Campaign", "x").unwrap_err().is_document());
    }

    #[test]
    fn related_parts_are_unique_by_id() {
        let mut assembly = MailMessageAssembly::new();
        let a = PartSource::from(BinaryContent::new("image/png", "a.png", vec![1]));
        let b = PartSource::from(BinaryContent::new("image/png", "b.png", vec![2]));
        assembly.add_related("part.1", a);
        assembly.add_related("part.2", b.clone());
        assembly.add_related("part.1", b.clone());

        assert_eq!(assembly.related().len(), 2);
        assert_eq!(assembly.related()[0], ("part.1".to_owned(), b));
    }

    #[test]
    fn defaults() {
        let mut assembly = MailMessageAssembly::new();
        assert_eq!(assembly.subject(), NO_SUBJECT);
        assert!(assembly.first_recipient().is_none());

        assembly.add_bcc("audit@example.com".parse().unwrap());
        assembly.add_cc("cc@example.com".parse().unwrap());
        assert_eq!(
            assembly.first_recipient().unwrap().email.as_ref(),
            "cc@example.com"
        );
    }
}
