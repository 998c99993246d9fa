//! Address plausibility heuristic
//!
//! Decides whether free text could be a postal address. Not a geocoder:
//! false positives only cost a failed ledger lookup downstream.
//!
//! Rules, first match wins:
//! 1. blank → false
//! 2. fewer than `min_chars` characters after trimming → false
//! 3. two or more join characters → true (canonical keys re-classify as plausible)
//! 4. any rejected punctuation → false
//! 5. true only if an administrative / geographic marker is present

use crate::services::address_canonicalizer::DEFAULT_JOIN;

/// Punctuation that does not occur in a postal address
pub const DEFAULT_REJECTED_PUNCTUATION: &[char] = &[
    '!', '！', '?', '？', '@', '#', '$', '^', '&', '*', '~', '`', '=', '+', '<', '>', '{', '}',
    '[', ']', '【', '】', '《', '》', '|', '\\', ';', '；', '"', '“', '”', '…',
];

/// Province / city / county / district / town / village / street / road /
/// lane / house-number markers
pub const DEFAULT_MARKERS: &[char] = &[
    '省', '市', '县', '区', '州', '旗', '镇', '乡', '村', '屯', '街', '道', '路', '巷', '弄',
    '里', '号', '栋', '幢', '楼', '室',
];

/// Classifier configuration, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    pub min_chars: usize,
    /// Join character of canonical keys
    pub join: char,
    pub rejected_punctuation: Vec<char>,
    pub markers: Vec<char>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_chars: 3,
            join: DEFAULT_JOIN,
            rejected_punctuation: DEFAULT_REJECTED_PUNCTUATION
                .iter()
                .copied()
                .filter(|c| *c != DEFAULT_JOIN)
                .collect(),
            markers: DEFAULT_MARKERS.to_vec(),
        }
    }
}

/// Address plausibility classifier
#[derive(Debug, Clone, Default)]
pub struct AddressClassifier {
    config: ClassifierConfig,
}

impl AddressClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Whether `text` could be a postal address (or an already canonical key)
    pub fn is_plausible_address(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return false;
        }

        if trimmed.chars().count() < self.config.min_chars {
            return false;
        }

        let joins = trimmed.chars().filter(|c| *c == self.config.join).count();
        if joins >= 2 {
            return true;
        }

        if trimmed
            .chars()
            .any(|c| c != self.config.join && self.config.rejected_punctuation.contains(&c))
        {
            return false;
        }

        self.has_marker(trimmed)
    }

    /// Cheap pre-filter for chat bodies worth sending to the extraction oracle
    pub fn looks_address_like(&self, body: &str) -> bool {
        self.has_marker(body)
    }

    fn has_marker(&self, text: &str) -> bool {
        text.chars().any(|c| self.config.markers.contains(&c))
    }
}
