//! Tracking parameters scoped to nested parts of a document
//!
//! A [`TagScopeStack`] holds one [`TagFrame`] per nesting level. Outer frames
//! provide defaults, inner frames override them, and a tag never overrides a
//! parameter already present in a link.
//!
//! ```rust
//! use mailwright::tag::TagScopeStack;
//!
//! # use std::error::Error;
//! # fn main() -> Result<(), Box<dyn Error>> {
//! let utf8 = encoding_rs::UTF_8;
//! let mut tags = TagScopeStack::new();
//! tags.add_tagged_domains("example.com *.example.com")?;
//! tags.put("utm_medium", "email");
//!
//! tags.push_frame();
//! tags.put("utm_source", "Newsletter");
//! assert_eq!(
//!     tags.amend_href_address("https://www.example.com/offers?id=7#top", utf8)?,
//!     "https://www.example.com/offers?id=7&utm_medium=email&utm_source=Newsletter#top"
//! );
//! tags.pop_frame();
//!
//! assert_eq!(tags.amend_query_string("", utf8)?, "?utm_medium=email");
//! # Ok(())
//! # }
//! ```

use std::sync::OnceLock;

use encoding_rs::Encoding;
use regex::Regex;

pub use self::{domain::DomainPatterns, query::*};
use crate::Error;

mod domain;
mod query;

/// Ordered tag name to tag value mapping of one nesting level
///
/// Names are unique within a frame. Insertion order is kept, so tags are
/// appended to links in the order they were first declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFrame {
    tags: Vec<(String, String)>,
}

impl TagFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a tag, keeping the position of a replaced one
    pub fn put<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) -> Option<String> {
        let name = name.into();
        let value = value.into();
        match self.tags.iter_mut().find(|(n, _)| *n == name) {
            Some((_, current)) => Some(std::mem::replace(current, value)),
            None => {
                self.tags.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn clear(&mut self) {
        self.tags.clear();
    }
}

/// Stack of [`TagFrame`]s, innermost last, plus the domains whose links get tagged
///
/// The stack is never empty: a base frame lives as long as the stack itself.
#[derive(Debug, Clone)]
pub struct TagScopeStack {
    frames: Vec<TagFrame>,
    tagged_domains: DomainPatterns,
}

impl TagScopeStack {
    /// Creates a stack holding only the base frame, and no tagged domains
    pub fn new() -> Self {
        Self {
            frames: vec![TagFrame::new()],
            tagged_domains: DomainPatterns::new(),
        }
    }

    /// Appends an empty frame
    pub fn push_frame(&mut self) {
        self.frames.push(TagFrame::new());
    }

    /// Removes the innermost frame
    ///
    /// The base frame is never removed: popping it is logged and ignored.
    pub fn pop_frame(&mut self) {
        if self.frames.len() <= 1 {
            tracing::error!("unbalanced pop_frame: the base tag frame cannot be removed");
            return;
        }
        if let Some(mut frame) = self.frames.pop() {
            frame.clear();
        }
    }

    /// Number of frames, including the base frame
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Sets a tag in the innermost frame only
    pub fn put<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        let name = name.into();
        let value = value.into();
        tracing::trace!(depth = self.frames.len(), name = %name, value = %value, "tag");
        if let Some(frame) = self.frames.last_mut() {
            frame.put(name, value);
        }
    }

    /// The effective value of a tag: the innermost frame defining it wins
    pub fn get(&self, name: &str) -> Option<&str> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Every tag name visible from the stack, in the order it was first declared,
    /// outer frames first
    pub fn visible_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for frame in &self.frames {
            for name in frame.names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Registers whitespace-separated `?`/`*` wildcards for domains whose links get tagged
    pub fn add_tagged_domains(&mut self, wildcards: &str) -> Result<(), Error> {
        self.tagged_domains.add(wildcards)
    }

    /// Returns true if links to `domain` get tagged
    pub fn is_tagged_domain(&self, domain: &str) -> bool {
        self.tagged_domains.matches(domain)
    }

    /// Appends each visible tag missing from `query` as a `name=value` parameter
    ///
    /// Parameters already in `query` are kept as they are, with their values.
    /// Returns an empty string when there are no parameters at all.
    pub fn amend_query_string(
        &self,
        query: &str,
        encoding: &'static Encoding,
    ) -> Result<String, Error> {
        let mut parameters = split_query_string(query, encoding)?;

        let missing: Vec<&str> = self
            .visible_names()
            .into_iter()
            .filter(|name| !parameters.iter().any(|p| p.name() == *name))
            .collect();

        for name in missing {
            if let Some(value) = self.get(name) {
                parameters.push(QueryParameter::named_value(name, value));
            }
        }

        Ok(join_query_string(&parameters, encoding))
    }

    /// Tags the query string of `address` if it is a `//` web URL to a tagged domain
    ///
    /// Anything else is returned unchanged. A `;params` or `#fragment` suffix is
    /// kept after the amended query string.
    pub fn amend_href_address(
        &self,
        address: &str,
        encoding: &'static Encoding,
    ) -> Result<String, Error> {
        let Some(caps) = web_url().captures(address) else {
            tracing::debug!(href = address, "not a web URL");
            return Ok(address.to_owned());
        };

        let group = |name: &str| caps.name(name).map_or("", |m| m.as_str());
        let (scheme, domain, path, query, suffix) = (
            group("scheme"),
            group("domain"),
            group("path"),
            group("query"),
            group("suffix"),
        );

        if !self.is_tagged_domain(domain) {
            tracing::debug!(scheme, domain, path, query, suffix, "page link unchanged");
            return Ok(address.to_owned());
        }

        let query = self.amend_query_string(query, encoding)?;
        tracing::debug!(scheme, domain, path, query = %query, suffix, "tagged link");

        Ok(format!("{scheme}//{domain}{path}{query}{suffix}"))
    }
}

impl Default for TagScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

fn web_url() -> &'static Regex {
    static WEB_URL: OnceLock<Regex> = OnceLock::new();
    WEB_URL.get_or_init(|| {
        Regex::new(
            r"^(?P<scheme>https?:)?//(?P<domain>[^/]+)(?P<path>/[^?&#;]*)?(?P<query>\?[^#;]*)?(?P<suffix>[;#].*)?$",
        )
        .expect("web URL pattern is valid")
    })
}
