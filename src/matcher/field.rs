use super::Matcher;
use crate::types::ANY;

/// Case-insensitive equality-or-wildcard matcher for zones, protocol and application
#[derive(Debug, Clone)]
pub struct FieldMatcher {
    tokens: Vec<String>,
}

impl FieldMatcher {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .collect(),
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// The first rule token that accepts the candidate.
    ///
    /// Order-sensitive: `["trust", "any"]` reports `trust` for a `trust`
    /// candidate while `["any", "trust"]` reports `any`. An `any` candidate
    /// reports the first token. A field with no tokens matches nothing, not
    /// even an `any` candidate.
    pub fn matching_token(&self, candidate: &str) -> Option<&str> {
        if candidate.trim().eq_ignore_ascii_case(ANY) {
            return self.tokens.first().map(String::as_str);
        }
        let candidate = candidate.trim();
        self.tokens
            .iter()
            .find(|t| *t == ANY || t.eq_ignore_ascii_case(candidate))
            .map(String::as_str)
    }
}

impl Matcher<str> for FieldMatcher {
    fn matches(&self, candidate: &str) -> bool {
        self.matching_token(candidate).is_some()
    }
}
