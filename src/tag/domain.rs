use regex::Regex;

use crate::{error, Error};

/// Compiled `?`/`*` wildcard patterns matched against a whole domain
///
/// A domain includes its optional `:port`, so `localhost` does not match
/// `localhost:8080` but `localhost:*` does.
#[derive(Debug, Clone, Default)]
pub struct DomainPatterns {
    patterns: Vec<Regex>,
}

impl DomainPatterns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles and adds each whitespace-separated wildcard in `wildcards`
    pub fn add(&mut self, wildcards: &str) -> Result<(), Error> {
        for wildcard in wildcards.split_whitespace() {
            tracing::info!(pattern = wildcard, "domain pattern");
            let regex = Regex::new(&wildcard_regex(wildcard))
                .map_err(|e| error::config(format!("'{wildcard}': {e}")))?;
            self.patterns.push(regex);
        }
        Ok(())
    }

    /// Returns true if any pattern matches all of `domain`
    pub fn matches(&self, domain: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(domain))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn wildcard_regex(wildcard: &str) -> String {
    let mut rx = String::with_capacity(wildcard.len() + 8);
    rx.push_str("^(?:");
    let mut literal = String::new();
    for c in wildcard.chars() {
        match c {
            '?' | '*' => {
                rx.push_str(&regex::escape(&literal));
                literal.clear();
                rx.push_str(if c == '?' { "." } else { ".*" });
            }
            _ => literal.push(c),
        }
    }
    rx.push_str(&regex::escape(&literal));
    rx.push_str(")$");
    rx
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wildcards() {
        let mut domains = DomainPatterns::new();
        domains.add("example.com *.example.com\n localhost:*  te?t.org").unwrap();

        assert!(domains.matches("example.com"));
        assert!(domains.matches("some.subdomain.example.com"));
        assert!(domains.matches("localhost:8080"));
        assert!(domains.matches("test.org"));
        assert!(domains.matches("text.org"));

        assert!(!domains.matches("example.org"));
        assert!(!domains.matches("examplexcom"));
        assert!(!domains.matches("localhost"));
        assert!(!domains.matches("teest.org"));
        assert!(!domains.matches("example.com.evil.net"));
    }

    #[test]
    fn empty_matches_nothing() {
        let domains = DomainPatterns::new();
        assert!(domains.is_empty());
        assert!(!domains.matches("example.com"));
    }
}
