use std::fmt::{self, Write};

use email_encoding::headers::writer::EmailWriter;

use super::{Header, HeaderName, HeaderValue};
use crate::BoxError;

/// `Content-Disposition` of a part
///
/// Defined in [RFC2183](https://tools.ietf.org/html/rfc2183)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    file_name: Option<String>,
}

impl ContentDisposition {
    /// A part to be displayed inline in the message
    pub fn inline() -> Self {
        Self { file_name: None }
    }

    /// A part to be downloaded separately, under `file_name`
    pub fn attachment(file_name: &str) -> Self {
        Self {
            file_name: Some(file_name.to_owned()),
        }
    }

    pub fn is_attachment(&self) -> bool {
        self.file_name.is_some()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }
}

fn quote(file_name: &str) -> String {
    file_name.replace('\\', "\\\\").replace('"', "\\\"")
}

fn encode_attachment(file_name: &str, w: &mut EmailWriter<'_>) -> fmt::Result {
    w.write_str("attachment;")?;
    w.space();
    email_encoding::headers::rfc2231::encode("filename", file_name, w)
}

impl Header for ContentDisposition {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("Content-Disposition")
    }

    fn parse(s: &str) -> Result<Self, BoxError> {
        let mut params = s.split(';').map(str::trim);
        match params.next() {
            Some(kind) if kind.eq_ignore_ascii_case("inline") => Ok(Self::inline()),
            Some(kind) if kind.eq_ignore_ascii_case("attachment") => {
                let file_name = params
                    .find_map(|p| p.strip_prefix("filename="))
                    .map(|name| name.trim_matches('"').replace("\\\"", "\"").replace("\\\\", "\\"))
                    .unwrap_or_default();
                Ok(Self::attachment(&file_name))
            }
            _ => Err(format!("unknown disposition: {s}").into()),
        }
    }

    fn display(&self) -> HeaderValue {
        match &self.file_name {
            None => HeaderValue::new(Self::name(), "inline".to_owned()),
            Some(file_name) => {
                let raw = format!("attachment; filename=\"{}\"", quote(file_name));

                let mut encoded = String::new();
                let line_len = "Content-Disposition: ".len();
                {
                    let mut w = EmailWriter::new(&mut encoded, line_len, 0, false);
                    encode_attachment(file_name, &mut w)
                        .expect("writing `ContentDisposition` to a `String` never fails");
                }
                HeaderValue::dangerous_new_pre_encoded(Self::name(), raw, encoded)
            }
        }
    }
}
