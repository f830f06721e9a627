//! Provides a strongly typed way to build MIME messages
//!
//! [`MessageBuilder`] collects the headers of a message, and is finished
//! with a [`SinglePart`] or [`MultiPart`] body:
//!
//! ```rust
//! use mailwright::message::{header::ContentType, Message, MultiPart, SinglePart};
//!
//! # use std::error::Error;
//! # fn main() -> Result<(), Box<dyn Error>> {
//! let m = Message::builder()
//!     .from("NoBody <nobody@domain.tld>".parse()?)
//!     .to("Hei <hei@domain.tld>".parse()?)
//!     .subject("Happy new year")
//!     .multipart(
//!         MultiPart::alternative()
//!             .singlepart(SinglePart::plain(String::from("Hello, world! :)")))
//!             .singlepart(SinglePart::html(String::from("<p><b>Hello</b>, world!</p>"))),
//!     );
//! assert_eq!(m.envelope().unwrap().to().len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! The part tree can be inspected through [`Message::body`] before the
//! message is written out with [`Message::formatted`].

pub use body::{Body, IntoBody, MaybeString};
pub use mailbox::*;
pub use mimebody::*;

mod body;
pub mod header;
mod mailbox;
mod mimebody;

use std::time::SystemTime;

use uuid::Uuid;

use crate::{
    address::{Address, Envelope},
    message::header::{Header, HeaderValue, Headers, MailboxesHeader},
};

const DEFAULT_MESSAGE_ID_DOMAIN: &str = "localhost";

/// Something that can be formatted as an email message
trait EmailFormat {
    fn format(&self, out: &mut Vec<u8>);
}

/// A builder for messages
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    headers: Headers,
    bounce: Option<Address>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom header to message
    pub fn header<H: Header>(mut self, header: H) -> Self {
        self.headers.set(header);
        self
    }

    /// Set a header which has no type of its own
    pub fn raw_header(mut self, value: HeaderValue) -> Self {
        self.headers.set_raw(value);
        self
    }

    /// Add mailbox to header
    pub fn mailbox<H: Header + MailboxesHeader>(self, header: H) -> Self {
        match self.headers.get::<H>() {
            Some(mut current) => {
                current.join_mailboxes(header);
                self.header(current)
            }
            None => self.header(header),
        }
    }

    /// Add `Date` header to message
    pub fn date(self, date: SystemTime) -> Self {
        self.header(header::Date::new(date))
    }

    /// Set `Date` header using current date/time
    pub fn date_now(self) -> Self {
        self.date(SystemTime::now())
    }

    /// Set `Subject` header to message
    pub fn subject<S: Into<String>>(self, subject: S) -> Self {
        let s: String = subject.into();
        self.header(header::Subject::from(s))
    }

    /// Set `Sender` header
    ///
    /// Defined in [RFC5322](https://tools.ietf.org/html/rfc5322#section-3.6.2).
    pub fn sender(self, mbox: Mailbox) -> Self {
        self.header(header::Sender::from(mbox))
    }

    /// Set or add mailbox to `From` header
    ///
    /// Defined in [RFC5322](https://tools.ietf.org/html/rfc5322#section-3.6.2).
    pub fn from(self, mbox: Mailbox) -> Self {
        self.mailbox(header::From(mbox.into()))
    }

    /// Set or add mailbox to `Reply-To` header
    pub fn reply_to(self, mbox: Mailbox) -> Self {
        self.mailbox(header::ReplyTo(mbox.into()))
    }

    /// Set or add mailbox to `To` header
    pub fn to(self, mbox: Mailbox) -> Self {
        self.mailbox(header::To(mbox.into()))
    }

    /// Set or add mailbox to `Cc` header
    pub fn cc(self, mbox: Mailbox) -> Self {
        self.mailbox(header::Cc(mbox.into()))
    }

    /// Set or add mailbox to `Bcc` header
    pub fn bcc(self, mbox: Mailbox) -> Self {
        self.mailbox(header::Bcc(mbox.into()))
    }

    /// Address bounces are returned to, used as the envelope sender
    pub fn bounce(mut self, address: Address) -> Self {
        self.bounce = Some(address);
        self
    }

    /// Set [Message-ID
    /// header](https://tools.ietf.org/html/rfc5322#section-3.6.4)
    ///
    /// If `None` is provided, an id will be generated in the
    /// `<UUID@HOSTNAME>` form.
    pub fn message_id(self, id: Option<String>) -> Self {
        match id {
            Some(i) => self.header(header::MessageId::from(i)),
            None => {
                #[cfg(feature = "hostname")]
                let hostname = hostname::get()
                    .ok()
                    .and_then(|s| s.into_string().ok())
                    .unwrap_or_else(|| DEFAULT_MESSAGE_ID_DOMAIN.to_owned());
                #[cfg(not(feature = "hostname"))]
                let hostname = DEFAULT_MESSAGE_ID_DOMAIN.to_owned();

                self.header(header::MessageId::from(
                    // https://tools.ietf.org/html/rfc5322#section-3.6.4
                    format!("<{}@{}>", Uuid::new_v4(), hostname),
                ))
            }
        }
    }

    /// Create message from body
    fn build(self, body: Part) -> Message {
        let res = if self.headers.get::<header::Date>().is_none() {
            self.date_now()
        } else {
            self
        };

        let envelope = match Envelope::from_headers(&res.headers, res.bounce) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                tracing::debug!("message has no envelope: {e}");
                None
            }
        };

        let mut headers = res.headers;
        headers.set(header::MIME_VERSION_1_0);

        Message {
            headers,
            body,
            envelope,
        }
    }

    /// Create message using mime body ([`MultiPart`][self::MultiPart])
    pub fn multipart(self, part: MultiPart) -> Message {
        self.build(Part::Multi(part))
    }

    /// Create message using mime body ([`SinglePart`][self::SinglePart])
    pub fn singlepart(self, part: SinglePart) -> Message {
        self.build(Part::Single(part))
    }

    /// Create message using a mime body of either kind
    pub fn part(self, part: Part) -> Message {
        self.build(part)
    }
}

/// Email message which can be formatted
#[derive(Clone, Debug)]
pub struct Message {
    headers: Headers,
    body: Part,
    envelope: Option<Envelope>,
}

impl Message {
    /// Create a new message builder without headers
    pub fn builder() -> MessageBuilder {
        MessageBuilder::new()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The top-level part of the message
    pub fn body(&self) -> &Part {
        &self.body
    }

    /// Get `Message` envelope, `None` if the message has no recipients
    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_ref()
    }

    /// Get message content formatted for SMTP
    ///
    /// `Bcc` recipients are part of the envelope only.
    pub fn formatted(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.format(&mut out);
        out
    }
}

impl EmailFormat for Message {
    fn format(&self, out: &mut Vec<u8>) {
        for value in self.headers.iter() {
            if value.name().eq_ignore_ascii_case(&header::Bcc::name()) {
                continue;
            }
            out.extend_from_slice(value.name().as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.encoded_value().as_bytes());
            out.extend_from_slice(b"\r\n");
        }

        self.body.format(out);
    }
}
