//! Learner identity used to key remote progress
use regex::Regex;
use std::sync::OnceLock;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern should compile")
    })
}

/// A validated, normalized learner email.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Trims and lowercases `raw`; `None` unless it looks like an email.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        email_pattern()
            .is_match(&normalized)
            .then_some(Self(normalized))
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes_emails() {
        let id = Identity::parse("  Ana.Investigator@Example.COM ").unwrap();
        assert_eq!(id.email(), "ana.investigator@example.com");
        assert_eq!(id.to_string(), "ana.investigator@example.com");
    }

    #[test]
    fn rejects_non_emails() {
        for raw in ["", "undefined", "ana@", "@example.com", "ana example@x.io", "ana@host"] {
            assert!(Identity::parse(raw).is_none(), "{raw} accepted");
        }
    }
}
