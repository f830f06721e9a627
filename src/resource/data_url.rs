use std::sync::OnceLock;

use base64::{engine::general_purpose::STANDARD, Engine};
use regex::Regex;

use super::BinaryContent;
use crate::{error, Error};

/// Name given to content decoded from a `data:` URL
pub const INLINE_DATA_NAME: &str = "inline-data";

fn data_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)^data:(?P<type>[^;,]*)(?P<encoding>;[^,]*)?,(?P<payload>.*)$")
            .expect("data: URL pattern is valid")
    })
}

/// Decodes a `data:<type>[;base64],<payload>` URL
///
/// The payload is base64-decoded only when the encoding token is exactly
/// `;base64`, otherwise its text bytes are used as they are.
pub fn decode(data_url: &str) -> Result<BinaryContent, Error> {
    let caps = data_url_pattern()
        .captures(data_url)
        .ok_or_else(|| error::data_url(format!("'{}'", abbreviate(data_url))))?;

    let content_type = caps.name("type").map_or("", |m| m.as_str());
    let base64 = caps.name("encoding").map(|m| m.as_str()) == Some(";base64");
    let payload = caps.name("payload").map_or("", |m| m.as_str());

    let bytes = if base64 {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD
            .decode(compact)
            .map_err(|e| error::data_url(format!("'{}': {e}", abbreviate(data_url))))?
    } else {
        payload.as_bytes().to_vec()
    };

    tracing::debug!(content_type, bytes = bytes.len(), "inline data");
    Ok(BinaryContent::new(content_type, INLINE_DATA_NAME, bytes))
}

fn abbreviate(s: &str) -> &str {
    match s.char_indices().nth(64) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
