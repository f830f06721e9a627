//! Query string splitting and joining
//!
//! Names and values are coded the way HTML forms code them
//! (`application/x-www-form-urlencoded`): a space becomes `+`, and every byte
//! outside of `[A-Za-z0-9*-._]` becomes a `%XX` escape of the byte in the
//! requested character encoding.

use std::fmt::{self, Display};

use encoding_rs::Encoding;
use percent_encoding::percent_decode;
use url::form_urlencoded::byte_serialize;

use crate::{error, Error};

/// One `name[=value]` item of a query string
///
/// `name` is always present, although it may be empty. A flag-style
/// parameter such as `?debug` has neither separator nor value, while
/// `?debug=` has a separator and an empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameter {
    name: String,
    separator: Option<char>,
    value: Option<String>,
}

impl QueryParameter {
    /// A `name=value` parameter
    pub fn named_value<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self {
            name: name.into(),
            separator: Some('='),
            value: Some(value.into()),
        }
    }

    /// A bare `name` parameter, without separator or value
    pub fn flag<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            separator: None,
            value: None,
        }
    }

    /// Parses one `name[=value]` item, decoding both parts using `encoding`
    pub fn parse(part: &str, encoding: &'static Encoding) -> Result<Self, Error> {
        let (name, separator, value) = match part.split_once('=') {
            Some((name, value)) => (name, Some('='), Some(value)),
            None => (part, None, None),
        };

        if value.map_or(false, |v| v.contains(['\r', '\n'])) {
            return Err(error::query(format!("'{part}': unrecognized query string")));
        }

        let name = url_decode(name, encoding)
            .map_err(|e| error::query(format!("'{part}': {e}")))?;
        let value = value
            .map(|v| url_decode(v, encoding))
            .transpose()
            .map_err(|e| error::query(format!("'{part}': {e}")))?;

        tracing::debug!(part, name = %name, ?separator, ?value, "query parameter");
        Ok(Self {
            name,
            separator,
            value,
        })
    }

    /// The decoded parameter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The decoded parameter value, if the parameter has one
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Returns true if the parameter carries a `=` separator
    pub fn has_separator(&self) -> bool {
        self.separator.is_some()
    }

    fn append_to(&self, out: &mut String, encoding: &'static Encoding) {
        out.push(if out.is_empty() { '?' } else { '&' });
        out.push_str(&url_encode(&self.name, encoding));
        if let Some(sep) = self.separator {
            out.push(sep);
            if let Some(value) = &self.value {
                out.push_str(&url_encode(value, encoding));
            }
        }
    }
}

impl Display for QueryParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.append_to(&mut out, encoding_rs::UTF_8);
        f.write_str(&out[1..])
    }
}

/// Splits `query` on runs of `&` and `?`, skipping blank items
pub fn split_query_string(
    query: &str,
    encoding: &'static Encoding,
) -> Result<Vec<QueryParameter>, Error> {
    query
        .split(['&', '?'])
        .filter(|part| !part.trim().is_empty())
        .map(|part| QueryParameter::parse(part, encoding))
        .collect()
}

/// Joins parameters back into a query string
///
/// The first parameter is prefixed by `?`, the following ones by `&`. An empty
/// list gives an empty string, not a lone `?`.
pub fn join_query_string(parameters: &[QueryParameter], encoding: &'static Encoding) -> String {
    let mut out = String::new();
    for parameter in parameters {
        parameter.append_to(&mut out, encoding);
    }
    out
}

/// Form-encodes `s` in the given character encoding
///
/// Text the encoding cannot represent is encoded as UTF-8 instead.
pub fn url_encode(s: &str, encoding: &'static Encoding) -> String {
    if s.is_empty() {
        return String::new();
    }
    let (bytes, _, unmappable) = encoding.encode(s);
    if unmappable {
        tracing::warn!(
            value = s,
            encoding = encoding.name(),
            "value cannot be represented in the query encoding, using UTF-8"
        );
        return byte_serialize(s.as_bytes()).collect();
    }
    byte_serialize(&bytes).collect()
}

/// Form-decodes `s`, interpreting the escaped bytes in the given character encoding
///
/// Fails on a `%` which is not followed by two hexadecimal digits.
pub fn url_decode(s: &str, encoding: &'static Encoding) -> Result<String, String> {
    if s.is_empty() {
        return Ok(String::new());
    }

    let bytes = s.as_bytes();
    let mut i = 0;
    while let Some(pos) = bytes[i..].iter().position(|&b| b == b'%') {
        let at = i + pos;
        let escape = bytes.get(at + 1..at + 3);
        if !escape.map_or(false, |hex| hex.iter().all(u8::is_ascii_hexdigit)) {
            return Err(format!("incomplete escape sequence at index {at}"));
        }
        i = at + 3;
    }

    let plus_as_space = s.replace('+', " ");
    let raw: Vec<u8> = percent_decode(plus_as_space.as_bytes()).collect();
    let (decoded, _) = encoding.decode_without_bom_handling(&raw);
    Ok(decoded.into_owned())
}

/// Looks up a character encoding by its label, such as `UTF-8` or `ISO-8859-1`
pub fn charset(label: &str) -> Result<&'static Encoding, Error> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| error::charset(format!("'{label}': unsupported encoding")))
}

#[cfg(test)]
mod test {
    use encoding_rs::{UTF_8, WINDOWS_1252};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn split_skips_separator_runs() {
        let params = split_query_string("??a=1&&&b&c=", UTF_8).unwrap();
        assert_eq!(
            params,
            vec![
                QueryParameter::named_value("a", "1"),
                QueryParameter::flag("b"),
                QueryParameter::named_value("c", ""),
            ]
        );
    }

    #[test]
    fn join_keeps_parameter_shapes() {
        let params = vec![
            QueryParameter::flag("Jhsd6JH56JH"),
            QueryParameter::named_value("empty", ""),
            QueryParameter::named_value("q", "ping og pong"),
        ];
        assert_eq!(
            join_query_string(&params, UTF_8),
            "?Jhsd6JH56JH&empty=&q=ping+og+pong"
        );
        assert_eq!(join_query_string(&[], UTF_8), "");
    }

    #[test]
    fn value_round_trip() {
        for value in ["a&b=c", "1+1 = 2", "blåbærgrød", "€ 100", "%41"] {
            let encoded = url_encode(value, UTF_8);
            assert_eq!(url_decode(&encoded, UTF_8).unwrap(), value);
        }

        let encoded = url_encode("blåbær", WINDOWS_1252);
        assert_eq!(encoded, "bl%E5b%E6r");
        assert_eq!(url_decode(&encoded, WINDOWS_1252).unwrap(), "blåbær");
    }

    #[test]
    fn unmappable_values_fall_back_to_utf8() {
        assert_eq!(
            url_encode("Ελλάδα", WINDOWS_1252),
            "%CE%95%CE%BB%CE%BB%CE%AC%CE%B4%CE%B1"
        );
        assert_eq!(url_encode("café", WINDOWS_1252), "caf%E9");
    }

    #[test]
    fn bad_escape_is_malformed() {
        let err = split_query_string("?a=%zz", UTF_8).unwrap_err();
        assert!(err.is_query());

        let err = split_query_string("?a=100%", UTF_8).unwrap_err();
        assert!(err.is_query());
    }

    #[test]
    fn line_break_in_value_is_malformed() {
        assert!(split_query_string("?a=x\ny", UTF_8).unwrap_err().is_query());
    }

    #[test]
    fn charset_labels() {
        assert_eq!(charset("utf-8").unwrap(), UTF_8);
        assert_eq!(charset(" ISO-8859-1 ").unwrap(), WINDOWS_1252);
        assert!(charset("klingon").unwrap_err().is_charset());
    }
}
