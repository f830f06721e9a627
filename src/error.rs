//! Error and result type for resolving, digesting and composing messages

use std::{error::Error as StdError, fmt};

use crate::BoxError;

// Inspired by https://github.com/seanmonstar/reqwest/blob/a8566383168c0ef06c21f38cbc9213af6ff6db31/src/error.rs

/// The errors that may occur while turning a specification into a message
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    source: Option<BoxError>,
}

impl Error {
    pub(crate) fn new<E>(kind: Kind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                source: source.map(Into::into),
            }),
        }
    }

    /// Returns true if a query string could not be split into parameters
    pub fn is_query(&self) -> bool {
        matches!(self.inner.kind, Kind::Query)
    }

    /// Returns true if a URL (or base href) could not be parsed
    pub fn is_url(&self) -> bool {
        matches!(self.inner.kind, Kind::Url)
    }

    /// Returns true if a relative reference was found with no base to resolve it against
    pub fn is_unresolvable(&self) -> bool {
        matches!(self.inner.kind, Kind::Unresolvable)
    }

    /// Returns true if a `data:` URL was malformed
    pub fn is_data_url(&self) -> bool {
        matches!(self.inner.kind, Kind::DataUrl)
    }

    /// Returns true if a packaged resource does not exist
    pub fn is_missing_resource(&self) -> bool {
        matches!(self.inner.kind, Kind::MissingResource)
    }

    /// Returns true if reading a local resource failed
    pub fn is_io(&self) -> bool {
        matches!(self.inner.kind, Kind::Io)
    }

    /// Returns true if the error comes from the network transport
    pub fn is_network(&self) -> bool {
        matches!(self.inner.kind, Kind::Network)
    }

    /// Returns true if the error is a TLS handshake failure
    pub fn is_tls(&self) -> bool {
        matches!(self.inner.kind, Kind::Tls)
    }

    /// Returns true if a redirect chain looped or was too long
    pub fn is_redirect(&self) -> bool {
        matches!(self.inner.kind, Kind::Redirect)
    }

    /// Returns true if a character encoding label is unknown
    pub fn is_charset(&self) -> bool {
        matches!(self.inner.kind, Kind::Charset)
    }

    /// Returns true if an e-mail address is invalid
    pub fn is_address(&self) -> bool {
        matches!(self.inner.kind, Kind::Address)
    }

    /// Returns true if a specification document is malformed
    pub fn is_document(&self) -> bool {
        matches!(self.inner.kind, Kind::Document)
    }

    /// Returns true if the layout transform failed
    pub fn is_layout(&self) -> bool {
        matches!(self.inner.kind, Kind::Layout)
    }

    /// Returns true if the configuration could not be loaded
    pub fn is_config(&self) -> bool {
        matches!(self.inner.kind, Kind::Config)
    }

    /// A transport failure, as reported by a [`Fetch`][crate::resource::Fetch] implementation
    pub fn network<E>(source: E) -> Error
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        network(source)
    }

    /// A failed TLS handshake, as reported by a [`Fetch`][crate::resource::Fetch] implementation
    ///
    /// Requests to `https:` URLs without an explicit port failing this way
    /// are retried over `http:`.
    pub fn tls<E>(source: E) -> Error
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        tls(source)
    }

    /// Returns true if the error is caused by a timeout
    pub fn is_timeout(&self) -> bool {
        let mut source = self.source();

        while let Some(err) = source {
            if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
                return io_err.kind() == std::io::ErrorKind::TimedOut;
            }
            #[cfg(feature = "http")]
            if let Some(http_err) = err.downcast_ref::<reqwest::Error>() {
                return http_err.is_timeout();
            }

            source = err.source();
        }

        false
    }
}

#[derive(Debug)]
pub(crate) enum Kind {
    /// Unparseable query string
    Query,
    /// Unparseable URL
    Url,
    /// Relative reference without a base
    Unresolvable,
    /// Malformed inline `data:` URL
    DataUrl,
    /// Packaged resource not found
    MissingResource,
    /// Local read failure
    Io,
    /// Underlying network failure
    Network,
    /// TLS failure
    Tls,
    /// Redirect loop or too many redirects
    Redirect,
    /// Unknown character encoding
    Charset,
    /// Invalid e-mail address
    Address,
    /// Malformed specification document
    Document,
    /// Layout transform failure
    Layout,
    /// Configuration failure
    Config,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("mailwright::Error");

        builder.field("kind", &self.inner.kind);

        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }

        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.kind {
            Kind::Query => f.write_str("unrecognized query string")?,
            Kind::Url => f.write_str("malformed url")?,
            Kind::Unresolvable => f.write_str("unresolvable reference")?,
            Kind::DataUrl => f.write_str("unrecognized data: URL format")?,
            Kind::MissingResource => f.write_str("resource not found")?,
            Kind::Io => f.write_str("i/o error")?,
            Kind::Network => f.write_str("network error")?,
            Kind::Tls => f.write_str("tls error")?,
            Kind::Redirect => f.write_str("redirect error")?,
            Kind::Charset => f.write_str("unknown character encoding")?,
            Kind::Address => f.write_str("invalid address")?,
            Kind::Document => f.write_str("malformed document")?,
            Kind::Layout => f.write_str("layout transform error")?,
            Kind::Config => f.write_str("configuration error")?,
        };

        if let Some(ref e) = self.inner.source {
            write!(f, ": {e}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| {
            let r: &(dyn StdError + 'static) = &**e;
            r
        })
    }
}

pub(crate) fn query<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Query, Some(e))
}

pub(crate) fn url<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Url, Some(e))
}

pub(crate) fn unresolvable<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Unresolvable, Some(e))
}

pub(crate) fn data_url<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::DataUrl, Some(e))
}

pub(crate) fn missing_resource<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::MissingResource, Some(e))
}

pub(crate) fn io<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Io, Some(e))
}

pub(crate) fn network<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Network, Some(e))
}

pub(crate) fn tls<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Tls, Some(e))
}

pub(crate) fn redirect<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Redirect, Some(e))
}

pub(crate) fn charset<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Charset, Some(e))
}

pub(crate) fn address<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Address, Some(e))
}

pub(crate) fn document<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Document, Some(e))
}

pub(crate) fn layout<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Layout, Some(e))
}

pub(crate) fn config<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Config, Some(e))
}
