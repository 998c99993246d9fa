//! Sensitive term masking
//!
//! Fixed block-list replacement applied to extracted addresses before they
//! are canonicalized, so names of contact fields and similar noise never end
//! up in a lookup key.

use coachlink_common::config::AddressConfig;

/// Block-list filter, immutable once built
#[derive(Debug, Clone, Default)]
pub struct SensitiveTermFilter {
    /// Longest terms first so overlapping terms mask completely
    terms: Vec<String>,
    replacement: String,
}

impl SensitiveTermFilter {
    pub fn new<I, S>(terms: I, replacement: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut terms: Vec<String> = terms
            .into_iter()
            .map(Into::into)
            .filter(|t| !t.is_empty())
            .collect();
        terms.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        terms.dedup();

        Self {
            terms,
            replacement: replacement.into(),
        }
    }

    pub fn from_config(config: &AddressConfig) -> Self {
        Self::new(
            config.sensitive_terms.iter().cloned(),
            config.sensitive_replacement.clone(),
        )
    }

    pub fn mask(&self, text: &str) -> String {
        self.terms
            .iter()
            .fold(text.to_string(), |acc, term| acc.replace(term.as_str(), &self.replacement))
    }
}
