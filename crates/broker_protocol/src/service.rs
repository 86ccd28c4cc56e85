//! Service naming: concrete names and wildcard prefix patterns.
//!
//! A service name ending in `*` is a wildcard pattern; matching is
//! prefix-based on the literal characters before the asterisk
//! (`spec.md` §6 "Service naming").

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A service name ending in `*` is a wildcard pattern.
    pub fn is_wildcard(&self) -> bool {
        self.0.ends_with('*')
    }

    /// The literal prefix before the trailing `*`, or the whole name for a
    /// concrete service.
    pub fn prefix(&self) -> &str {
        self.0.strip_suffix('*').unwrap_or(&self.0)
    }

    /// Whether this wildcard service's prefix matches a concrete service
    /// name. Only meaningful when `self.is_wildcard()`.
    pub fn matches(&self, concrete: &ServiceName) -> bool {
        self.is_wildcard() && concrete.0.starts_with(self.prefix())
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ServiceName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ServiceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concrete_is_not_wildcard() {
        assert!(!ServiceName::new("echo").is_wildcard());
    }

    #[test]
    fn wildcard_prefix_matches() {
        let wildcard = ServiceName::new("audio.*");
        assert!(wildcard.is_wildcard());
        assert_eq!(wildcard.prefix(), "audio.");
        assert!(wildcard.matches(&ServiceName::new("audio.transcode")));
        assert!(!wildcard.matches(&ServiceName::new("video.transcode")));
    }

}
