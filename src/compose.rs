//! Composition of a [`MailMessageAssembly`] into a MIME [`Message`]
//!
//! The body takes the first matching shape:
//!
//! | bodies present                 | top-level content                      |
//! |--------------------------------|----------------------------------------|
//! | none                           | an empty plain text part               |
//! | plain                          | the plain part                         |
//! | HTML                           | the HTML part                          |
//! | alternative                    | the alternative part                   |
//! | two or more                    | `multipart/alternative` of them, in that order |
//!
//! An HTML body with related parts becomes a `multipart/related` of the
//! HTML followed by the related parts. With attachments, the body is
//! the first part of a `multipart/mixed`, followed by the attachments.

use std::{error::Error as StdError, fmt::Write};

use crate::{
    assembly::MailMessageAssembly,
    message::{
        header::{ContentDisposition, ContentId, ContentType},
        Message, MultiPart, Part, SinglePart,
    },
    resource::{BinaryContent, PartSource, Resolver},
    Error,
};

/// `Content-Type` of plain text bodies
pub const PLAIN_CONTENT_TYPE: &str = "text/plain; charset=UTF-8; format=flowed";

/// File name of the text attachment standing in for one that failed
pub const FAILED_ATTACHMENT_NAME: &str = "failed-attachment.txt";

const REPORT_DELIMITER: &str = "# ========";

/// Composes messages, loading related parts and attachments through a [`Resolver`]
///
/// When `failsafe`, related parts which cannot be loaded are left out and
/// attachments which cannot be loaded are replaced by a text attachment
/// describing the failure. Otherwise either failure aborts the composition.
#[derive(Debug, Clone)]
pub struct Composer<'r> {
    resolver: &'r Resolver,
    failsafe: bool,
}

impl<'r> Composer<'r> {
    pub fn new(resolver: &'r Resolver, failsafe: bool) -> Self {
        Self { resolver, failsafe }
    }

    pub async fn compose(&self, assembly: MailMessageAssembly) -> Result<Message, Error> {
        let mut builder = Message::builder();
        if let Some(sent) = assembly.sent {
            builder = builder.date(sent.into());
        }
        for from in assembly.from.iter().cloned() {
            builder = builder.from(from);
        }
        if let Some(sender) = assembly.sender.clone() {
            builder = builder.sender(sender);
        }
        for reply_to in assembly.reply_to.iter().cloned() {
            builder = builder.reply_to(reply_to);
        }
        for to in assembly.to.iter().cloned() {
            builder = builder.to(to);
        }
        for cc in assembly.cc.iter().cloned() {
            builder = builder.cc(cc);
        }
        for bcc in assembly.bcc.iter().cloned() {
            builder = builder.bcc(bcc);
        }
        builder = builder.subject(assembly.subject.clone());
        if let Some(bounce) = assembly.bounce.clone() {
            builder = builder.bounce(bounce);
        }
        if let Some(id) = assembly.message_id.clone() {
            builder = builder.message_id(Some(id));
        }
        for value in assembly.headers.iter() {
            builder = builder.raw_header(value.clone());
        }

        let body = self.compose_body(&assembly).await?;
        let content = if assembly.attachments.is_empty() {
            body
        } else {
            let mut mixed = MultiPart::mixed().part(body);
            for source in &assembly.attachments {
                mixed = mixed.singlepart(self.compose_attachment(source).await?);
            }
            Part::Multi(mixed)
        };

        Ok(builder.part(content))
    }

    async fn compose_body(&self, assembly: &MailMessageAssembly) -> Result<Part, Error> {
        let mut plain = assembly.plain_body.as_deref();
        if plain.is_none() && assembly.html_body.is_none() && assembly.alternative_body.is_none() {
            plain = Some("");
        }

        let mut variants = Vec::with_capacity(3);
        if let Some(text) = plain {
            variants.push(Part::Single(plain_part(text)));
        }
        if let Some(html) = &assembly.html_body {
            variants.push(self.compose_html(html, &assembly.related).await?);
        }
        if let Some(alternative) = &assembly.alternative_body {
            variants.push(alternative.clone());
        }

        if variants.len() == 1 {
            return Ok(variants.remove(0));
        }
        let alternatives = variants
            .into_iter()
            .fold(MultiPart::alternative().build(), MultiPart::part);
        Ok(Part::Multi(alternatives))
    }

    async fn compose_html(&self, html: &str, related: &[(String, PartSource)]) -> Result<Part, Error> {
        let html_part = SinglePart::html(html.to_owned());
        if related.is_empty() {
            return Ok(Part::Single(html_part));
        }

        let mut multipart = MultiPart::related().singlepart(html_part);
        for (part_id, source) in related {
            tracing::debug!(%part_id, %source, "attaching related part");
            match self.resolver.load(source).await {
                Ok(content) => {
                    let part = SinglePart::builder()
                        .content_type(content_type(&content))
                        .header(ContentId::from(format!("<{part_id}>")))
                        .header(ContentDisposition::inline())
                        .body(content.bytes());
                    multipart = multipart.singlepart(part);
                }
                Err(e) if self.failsafe => {
                    tracing::error!(%part_id, %source, "failed to attach related part: {e}");
                }
                Err(e) => {
                    tracing::warn!(%part_id, %source, "failed to attach related part: {e}");
                    return Err(e);
                }
            }
        }
        Ok(Part::Multi(multipart))
    }

    async fn compose_attachment(&self, source: &PartSource) -> Result<SinglePart, Error> {
        match self.resolver.load(source).await {
            Ok(content) => Ok(SinglePart::builder()
                .content_type(content_type(&content))
                .header(ContentDisposition::attachment(content.file_name()))
                .body(content.bytes())),
            Err(e) if self.failsafe => {
                tracing::error!(%source, "failed to compose attachment: {e}");
                Ok(SinglePart::builder()
                    .content_type(ContentType::TEXT_PLAIN)
                    .header(ContentDisposition::attachment(FAILED_ATTACHMENT_NAME))
                    .body(failure_report(source, &e)))
            }
            Err(e) => Err(e),
        }
    }
}

fn plain_part(text: &str) -> SinglePart {
    let content_type = ContentType::parse(PLAIN_CONTENT_TYPE).unwrap_or(ContentType::TEXT_PLAIN);
    SinglePart::builder()
        .content_type(content_type)
        .body(text.to_owned())
}

/// The declared content type of `content`, or `application/octet-stream`
fn content_type(content: &BinaryContent) -> ContentType {
    ContentType::parse(content.content_type()).unwrap_or_else(|e| {
        tracing::warn!(
            name = content.name(),
            content_type = content.content_type(),
            "unusable content type, sending as octet-stream: {e}"
        );
        ContentType::OCTET_STREAM
    })
}

/// Text body of the attachment replacing one that could not be loaded
fn failure_report(source: &PartSource, error: &Error) -> String {
    let mut report = String::new();
    let _ = writeln!(report, "{REPORT_DELIMITER}");
    let _ = writeln!(report, "# Failed to compose attachment {source}");
    let _ = writeln!(report, "# Server stack trace follows:");
    let _ = writeln!(report, "{error}");
    let mut cause = error.source();
    while let Some(e) = cause {
        let _ = writeln!(report, "caused by: {e}");
        cause = e.source();
    }
    let _ = writeln!(report, "{REPORT_DELIMITER}");
    report
}
