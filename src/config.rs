//! Configuration
//!
//! Loaded from a TOML document. Every key is optional:
//!
//! ```toml
//! [tracking]
//! domains = "example.com *.example.com"
//! header = "X-Tracking-ID"
//! parameter = "track-id"
//! token-alphabet = "BCDFGHJKLMNPQRSTVWXZbcdfghjkmnpqrstvwxz"
//! token-length = 10
//!
//! [html]
//! encoding = "UTF-8"
//! inline-css = false
//!
//! [fetch]
//! user-agent = "..."
//! connect-timeout = 15
//! read-timeout = 15
//! cache-ttl = 300
//! cache-capacity = 1024
//! ```

use std::{path::Path, time::Duration};

use encoding_rs::Encoding;
use serde::Deserialize;

use crate::{error, resource::DEFAULT_USER_AGENT, tag, Error};

/// Environment variable naming the configuration file read by [`Config::from_env`]
pub const CONFIG_ENV: &str = "MAIL_PARSER_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub tracking: TrackingConfig,
    pub html: HtmlConfig,
    pub fetch: FetchConfig,
}

/// Link tagging and tracking identifiers
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TrackingConfig {
    /// Whitespace-separated `?`/`*` globs of domains whose links get tagged
    pub domains: String,
    /// Header carrying the tracking identifier of a message
    pub header: String,
    /// Query parameter carrying the tracking identifier in tagged links
    pub parameter: String,
    /// Characters random tracking identifiers are made of
    pub token_alphabet: String,
    pub token_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HtmlConfig {
    /// Character encoding of percent-coded query strings
    pub encoding: String,
    /// Whether the layout transform inlines CSS
    pub inline_css: bool,
}

/// Remote resource retrieval
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetchConfig {
    pub user_agent: String,
    /// Seconds
    pub connect_timeout: u64,
    /// Seconds
    pub read_timeout: u64,
    /// Seconds a fetched resource stays cached
    pub cache_ttl: u64,
    /// Number of cached resources
    pub cache_capacity: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            domains: "localhost localhost:*".to_owned(),
            header: "X-Tracking-ID".to_owned(),
            parameter: "track-id".to_owned(),
            token_alphabet: "BCDFGHJKLMNPQRSTVWXZbcdfghjkmnpqrstvwxz".to_owned(),
            token_length: 10,
        }
    }
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self {
            encoding: "UTF-8".to_owned(),
            inline_css: false,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            connect_timeout: 15,
            read_timeout: 15,
            cache_ttl: 5 * 60,
            cache_capacity: 1024,
        }
    }
}

impl HtmlConfig {
    pub fn encoding(&self) -> Result<&'static Encoding, Error> {
        tag::charset(&self.encoding)
    }
}

impl FetchConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(text).map_err(error::config)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| error::config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml(&text)?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Reads the file named by [`CONFIG_ENV`], or returns the defaults when it is unset
    pub fn from_env() -> Result<Self, Error> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), Error> {
        self.html.encoding()?;
        if self.tracking.token_alphabet.is_empty() {
            return Err(error::config("empty tracking token alphabet"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.tracking.domains, "localhost localhost:*");
        assert_eq!(config.tracking.header, "X-Tracking-ID");
        assert_eq!(config.tracking.token_length, 10);
        assert_eq!(config.html.encoding().unwrap(), encoding_rs::UTF_8);
        assert_eq!(config.fetch.read_timeout(), Duration::from_secs(15));
        assert_eq!(config.fetch.cache_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let config = Config::from_toml(
            r#"
[tracking]
domains = "example.com *.example.com"
token-length = 6

[html]
encoding = "iso-8859-1"
inline-css = true
"#,
        )
        .unwrap();

        assert_eq!(config.tracking.domains, "example.com *.example.com");
        assert_eq!(config.tracking.token_length, 6);
        assert_eq!(config.tracking.parameter, "track-id");
        assert_eq!(config.html.encoding().unwrap(), encoding_rs::WINDOWS_1252);
        assert!(config.html.inline_css);
        assert_eq!(config.fetch, FetchConfig::default());
    }

    #[test]
    fn invalid_documents() {
        assert!(Config::from_toml("[html]\nencoding = \"klingon\"")
            .unwrap_err()
            .is_charset());
        assert!(Config::from_toml("[fetch]\ncache-ttl = \"soon\"")
            .unwrap_err()
            .is_config());
        assert!(Config::from_toml("[tracking]\ntoken-alphabet = \"\"")
            .unwrap_err()
            .is_config());
    }

    #[test]
    fn from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mail.toml");
        std::fs::write(&path, "[tracking]\nheader = \"X-Campaign\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.tracking.header, "X-Campaign");
        assert!(Config::from_file(dir.path().join("missing.toml"))
            .unwrap_err()
            .is_config());
    }
}
