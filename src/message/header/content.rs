use std::{
    fmt::{Display, Formatter as FmtFormatter, Result as FmtResult},
    str::FromStr,
};

use super::{Header, HeaderName, HeaderValue};
use crate::BoxError;

/// `Content-Transfer-Encoding` of the body
///
/// Chosen by [`Body::new`][crate::message::Body::new] from the content, so
/// it shouldn't be set manually.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ContentTransferEncoding {
    /// ASCII, lines of at most 998 characters
    SevenBit,
    QuotedPrintable,
    Base64,
}

impl Header for ContentTransferEncoding {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("Content-Transfer-Encoding")
    }

    fn parse(s: &str) -> Result<Self, BoxError> {
        Ok(s.parse()?)
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.to_string())
    }
}

impl Display for ContentTransferEncoding {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        f.write_str(match *self {
            Self::SevenBit => "7bit",
            Self::QuotedPrintable => "quoted-printable",
            Self::Base64 => "base64",
        })
    }
}

impl FromStr for ContentTransferEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            s if s.eq_ignore_ascii_case("7bit") => Ok(Self::SevenBit),
            s if s.eq_ignore_ascii_case("quoted-printable") => Ok(Self::QuotedPrintable),
            s if s.eq_ignore_ascii_case("base64") => Ok(Self::Base64),
            _ => Err(format!("unsupported transfer encoding: {s}")),
        }
    }
}
