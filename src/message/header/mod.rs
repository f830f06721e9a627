//! Headers widely used in email messages
// https://tools.ietf.org/html/rfc5322#section-2.2

use std::{
    borrow::Cow,
    error::Error as StdError,
    fmt::{self, Display, Formatter, Write},
    ops::Deref,
};

use email_encoding::headers::writer::EmailWriter;

pub use self::{
    content::*,
    content_disposition::ContentDisposition,
    content_type::{ContentType, ContentTypeErr},
    date::Date,
    mailbox::*,
    special::*,
    textual::*,
};
use crate::BoxError;

mod content;
mod content_disposition;
mod content_type;
mod date;
mod mailbox;
mod special;
mod textual;

/// Represents an email header
///
/// Email header as defined in [RFC5322](https://datatracker.ietf.org/doc/html/rfc5322) and extensions.
pub trait Header: Clone {
    fn name() -> HeaderName;

    fn parse(s: &str) -> Result<Self, BoxError>;

    fn display(&self) -> HeaderValue;
}

/// A set of email headers
///
/// Names are unique, ignoring case. Setting a header replaces any header of
/// the same name in place.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    headers: Vec<HeaderValue>,
}

impl Headers {
    /// Create an empty `Headers`
    #[inline]
    pub const fn new() -> Self {
        Self {
            headers: Vec::new(),
        }
    }

    /// Returns a copy of an `Header` present in `Headers`
    ///
    /// Returns `None` if `Header` isn't present or can't be parsed.
    pub fn get<H: Header>(&self) -> Option<H> {
        self.get_raw(&H::name()).and_then(|raw| H::parse(raw).ok())
    }

    /// Sets `header` into `Headers`, overriding `header` if it
    /// was already present in `Headers`
    pub fn set<H: Header>(&mut self, header: H) {
        self.set_raw(header.display());
    }

    /// Remove `H` from `Headers`, returning it
    pub fn remove<H: Header>(&mut self) -> Option<H> {
        self.remove_raw(&H::name())
            .and_then(|value| H::parse(&value.raw_value).ok())
    }

    /// Returns `true` if a header named `name` is present
    pub fn has_raw(&self, name: &str) -> bool {
        self.find_header(name).is_some()
    }

    /// Returns the raw value of a header named `name`
    pub fn get_raw(&self, name: &str) -> Option<&str> {
        self.find_header(name).map(|value| value.raw_value.as_str())
    }

    /// Sets a header from a raw value, overriding a header of the same name
    pub fn set_raw(&mut self, value: HeaderValue) {
        match self
            .headers
            .iter_mut()
            .find(|h| h.name.eq_ignore_ascii_case(&value.name))
        {
            Some(current) => *current = value,
            None => self.headers.push(value),
        }
    }

    pub fn remove_raw(&mut self, name: &str) -> Option<HeaderValue> {
        let index = self
            .headers
            .iter()
            .position(|h| h.name.eq_ignore_ascii_case(name))?;
        Some(self.headers.remove(index))
    }

    /// Iterates over the headers in the order they were first set
    pub fn iter(&self) -> impl Iterator<Item = &HeaderValue> {
        self.headers.iter()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    fn find_header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers
            .iter()
            .find(|value| name.eq_ignore_ascii_case(&value.name))
    }
}

impl Display for Headers {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for value in &self.headers {
            f.write_str(&value.name)?;
            f.write_str(": ")?;
            f.write_str(&value.encoded_value)?;
            f.write_str("\r\n")?;
        }

        Ok(())
    }
}

/// A possible error when converting a `HeaderName` from another type.
#[derive(Debug, Clone)]
pub struct InvalidHeaderName(String);

impl Display for InvalidHeaderName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "invalid header name: {:?}", self.0)
    }
}

impl StdError for InvalidHeaderName {}

/// A valid header name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderName(Cow<'static, str>);

impl HeaderName {
    /// Creates a new header name
    ///
    /// The name must be printable ASCII without spaces or colons, and at most
    /// 76 characters long.
    pub fn new_from_ascii(ascii: String) -> Result<Self, InvalidHeaderName> {
        if !ascii.is_empty()
            && ascii.len() <= 76
            && ascii.bytes().all(|b| b.is_ascii_graphic() && b != b':')
        {
            Ok(Self(Cow::Owned(ascii)))
        } else {
            Err(InvalidHeaderName(ascii))
        }
    }

    /// Creates a header name from a constant
    pub(crate) const fn new_from_ascii_str(ascii: &'static str) -> Self {
        Self(Cow::Borrowed(ascii))
    }
}

impl Display for HeaderName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self)
    }
}

impl Deref for HeaderName {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for HeaderName {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A header with its value, both as set and as written into the message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderValue {
    name: HeaderName,
    raw_value: String,
    encoded_value: String,
}

impl HeaderValue {
    /// Creates a header with an unstructured value, encoding words which
    /// aren't plain ASCII as [RFC2047](https://tools.ietf.org/html/rfc2047) encoded words
    pub fn new(name: HeaderName, raw_value: String) -> Self {
        let mut encoded_value = String::with_capacity(raw_value.len());
        HeaderValueEncoder::encode(&name, &raw_value, &mut encoded_value)
            .expect("writing `HeaderValue` to a `String` never fails");
        Self::dangerous_new_pre_encoded(name, raw_value, encoded_value)
    }

    /// Creates a header whose `encoded_value` has already been encoded
    pub fn dangerous_new_pre_encoded(
        name: HeaderName,
        raw_value: String,
        encoded_value: String,
    ) -> Self {
        Self {
            name,
            raw_value,
            encoded_value,
        }
    }

    pub fn name(&self) -> &HeaderName {
        &self.name
    }

    pub fn raw_value(&self) -> &str {
        &self.raw_value
    }

    pub fn encoded_value(&self) -> &str {
        &self.encoded_value
    }
}

fn allowed_str(s: &str) -> bool {
    s.chars().all(allowed_char)
}

fn allowed_char(c: char) -> bool {
    matches!(c, '\u{1}'..='\u{9}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{7f}')
}

/// Writes an unstructured value, folding long lines and turning each run of
/// words with characters outside of ASCII into encoded words
struct HeaderValueEncoder<'a> {
    writer: EmailWriter<'a>,
    encode_buf: String,
}

impl<'a> HeaderValueEncoder<'a> {
    fn encode(name: &str, value: &str, f: &'a mut dyn Write) -> fmt::Result {
        let encoder = Self::new(name, f);
        encoder.format(value.split_inclusive(' '))
    }

    fn new(name: &str, writer: &'a mut dyn Write) -> Self {
        let line_len = name.len() + ": ".len();
        Self {
            writer: EmailWriter::new(writer, line_len, 0, false),
            encode_buf: String::new(),
        }
    }

    fn format<'w>(mut self, words: impl Iterator<Item = &'w str>) -> fmt::Result {
        for word in words {
            if allowed_str(word) {
                self.flush_encode_buf()?;
                self.writer.folding().write_str(word)?;
            } else {
                self.encode_buf.push_str(word);
            }
        }

        self.flush_encode_buf()
    }

    fn flush_encode_buf(&mut self) -> fmt::Result {
        if self.encode_buf.is_empty() {
            return Ok(());
        }

        // an encoded word never ends in a space
        let text = self.encode_buf.trim_end_matches(' ');
        let spaces = self.encode_buf.len() - text.len();
        email_encoding::headers::rfc2047::encode(text, &mut self.writer)?;
        for _ in 0..spaces {
            self.writer.space();
        }

        self.encode_buf.clear();
        Ok(())
    }
}
