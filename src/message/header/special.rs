use super::{Header, HeaderName, HeaderValue};
use crate::BoxError;

/// Message format version, defined in [RFC2045](https://tools.ietf.org/html/rfc2045#section-4)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MimeVersion {
    major: u8,
    minor: u8,
}

/// MIME version 1.0
///
/// Set on every message with a MIME body.
pub const MIME_VERSION_1_0: MimeVersion = MimeVersion::new(1, 0);

impl MimeVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        MimeVersion { major, minor }
    }

    #[inline]
    pub const fn major(self) -> u8 {
        self.major
    }

    #[inline]
    pub const fn minor(self) -> u8 {
        self.minor
    }
}

impl Header for MimeVersion {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("MIME-Version")
    }

    fn parse(s: &str) -> Result<Self, BoxError> {
        let (major, minor) = s
            .trim()
            .split_once('.')
            .ok_or("MIME-Version header doesn't contain '.'")?;
        Ok(MimeVersion::new(major.parse()?, minor.parse()?))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), format!("{}.{}", self.major, self.minor))
    }
}

impl Default for MimeVersion {
    fn default() -> Self {
        MIME_VERSION_1_0
    }
}
