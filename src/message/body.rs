use std::mem;

use crate::message::header::ContentTransferEncoding;

/// A [`SinglePart`][super::SinglePart] body that has already been encoded
#[derive(Debug, Clone)]
pub struct Body {
    buf: Vec<u8>,
    encoding: ContentTransferEncoding,
}

/// Either a `Vec<u8>` or a `String`.
///
/// If the content is valid utf-8 a `String` should be passed, as it
/// makes for a more efficient `Content-Transfer-Encoding` to be chosen.
#[derive(Debug, Clone)]
pub enum MaybeString {
    /// Binary data
    Binary(Vec<u8>),
    /// UTF-8 string
    String(String),
}

impl Body {
    /// Encode the supplied `buf`, making it ready to be sent as a body.
    ///
    /// Automatically chooses the most efficient encoding between
    /// `7bit`, `quoted-printable` and `base64`.
    ///
    /// If `String` is passed, line endings are converted to `CRLF`.
    pub fn new<B: Into<MaybeString>>(buf: B) -> Self {
        let mut buf: MaybeString = buf.into();

        let encoding = buf.encoding();
        buf.encode_crlf();
        let buf: Vec<u8> = buf.into();

        match encoding {
            ContentTransferEncoding::SevenBit => Self { buf, encoding },
            ContentTransferEncoding::QuotedPrintable => Self {
                buf: quoted_printable::encode(buf),
                encoding,
            },
            ContentTransferEncoding::Base64 => {
                let len = email_encoding::body::base64::encoded_len(buf.len());

                let mut out = String::with_capacity(len);
                email_encoding::body::base64::encode(&buf, &mut out)
                    .expect("encode body as base64");

                Self {
                    buf: out.into_bytes(),
                    encoding,
                }
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn encoding(&self) -> ContentTransferEncoding {
        self.encoding
    }

    #[inline]
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

impl MaybeString {
    /// Suggests the best `Content-Transfer-Encoding` for a transport without
    /// 8-bit support
    fn encoding(&self) -> ContentTransferEncoding {
        use email_encoding::body::Encoding;

        let output = match self {
            Self::String(s) => Encoding::choose(s.as_str(), false),
            Self::Binary(b) => Encoding::choose(b.as_slice(), false),
        };

        match output {
            Encoding::SevenBit => ContentTransferEncoding::SevenBit,
            Encoding::EightBit | Encoding::QuotedPrintable => {
                ContentTransferEncoding::QuotedPrintable
            }
            Encoding::Base64 => ContentTransferEncoding::Base64,
        }
    }

    /// Encode line endings to CRLF if the variant is `String`
    fn encode_crlf(&mut self) {
        match self {
            Self::String(string) => in_place_crlf_line_endings(string),
            Self::Binary(_) => {}
        }
    }
}

/// Something that can be encoded into a [`Body`]
pub trait IntoBody {
    fn into_body(self) -> Body;
}

impl<T> IntoBody for T
where
    T: Into<MaybeString>,
{
    fn into_body(self) -> Body {
        Body::new(self)
    }
}

impl IntoBody for Body {
    fn into_body(self) -> Body {
        self
    }
}

impl AsRef<[u8]> for Body {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.buf.as_ref()
    }
}

impl From<Vec<u8>> for MaybeString {
    #[inline]
    fn from(b: Vec<u8>) -> Self {
        Self::Binary(b)
    }
}

impl From<&[u8]> for MaybeString {
    #[inline]
    fn from(b: &[u8]) -> Self {
        Self::Binary(b.to_vec())
    }
}

impl From<String> for MaybeString {
    #[inline]
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for MaybeString {
    #[inline]
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<MaybeString> for Vec<u8> {
    #[inline]
    fn from(s: MaybeString) -> Self {
        match s {
            MaybeString::Binary(b) => b,
            MaybeString::String(s) => s.into(),
        }
    }
}

/// In place conversion to CRLF line endings
fn in_place_crlf_line_endings(string: &mut String) {
    let indices = find_all_lf_char_indices(string);

    for i in indices {
        // this relies on `indices` being in reverse order
        string.insert(i, '\r');
    }
}

/// Find indices to all places where `\r` should be inserted
/// in order to make `s` have CRLF line endings
///
/// The list is reversed, which is more efficient.
fn find_all_lf_char_indices(s: &str) -> Vec<usize> {
    let mut indices = Vec::new();

    let mut found_lf = false;
    for (i, c) in s.char_indices().rev() {
        if mem::take(&mut found_lf) && c != '\r' {
            // the previous character was `\n`, but this isn't a `\r`
            indices.push(i + c.len_utf8());
        }

        found_lf = c == '\n';
    }

    if found_lf {
        // the first character is `\n`
        indices.push(0);
    }

    indices
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn seven_bit_text() {
        let body = Body::new("Hello, world!\nBye");

        assert_eq!(body.encoding(), ContentTransferEncoding::SevenBit);
        assert_eq!(body.as_ref(), b"Hello, world!\r\nBye");
    }

    #[test]
    fn non_ascii_text_is_quoted_printable() {
        let body = Body::new(String::from(
            "Grüße aus Berlin, und bis bald beim nächsten Newsletter!",
        ));

        assert_eq!(body.encoding(), ContentTransferEncoding::QuotedPrintable);
        assert!(body.as_ref().starts_with(b"Gr=C3=BC=C3=9Fe aus Berlin"));
    }

    #[test]
    fn binary_is_base64_in_lines() {
        let body = Body::new(vec![0u8; 100]);

        assert_eq!(body.encoding(), ContentTransferEncoding::Base64);
        let text = String::from_utf8(body.into_vec()).unwrap();
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 76);
        assert_eq!(lines[0].len() + lines[1].len(), 136);
    }

    #[test]
    fn crlf() {
        let mut string = String::from("\nline one\r\nline two\n\nend");
        in_place_crlf_line_endings(&mut string);
        assert_eq!(string, "\r\nline one\r\nline two\r\n\r\nend");
    }
}
