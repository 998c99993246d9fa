//! Address canonicalization
//!
//! Compresses a dash-separated address (`省-市-区-详细地址`) into a short key
//! such as `江苏%无锡%江阴%顾山%2号`. The join character doubles as the SQL
//! `LIKE` wildcard, so the key matches the full, differently formatted
//! address text held by the order ledger.
//!
//! Pure and deterministic. Inputs are expected to have passed through
//! [`SensitiveTermFilter`](crate::services::SensitiveTermFilter) first.

/// Segment separator in oracle-formatted addresses
pub const DEFAULT_SEPARATOR: char = '-';

/// Join character between key parts
pub const DEFAULT_JOIN: char = '%';

/// Characters kept from each leading segment
const SEGMENT_KEEP: usize = 2;

/// Canonicalizer configuration, immutable once built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalizerConfig {
    pub separator: char,
    pub join: char,
}

impl Default for CanonicalizerConfig {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
            join: DEFAULT_JOIN,
        }
    }
}

/// Address canonicalizer
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressCanonicalizer {
    config: CanonicalizerConfig,
}

impl AddressCanonicalizer {
    pub fn new(config: CanonicalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CanonicalizerConfig {
        &self.config
    }

    /// Compress `raw` into its lookup key
    ///
    /// Inputs with fewer than two separators are returned unchanged. Otherwise
    /// every segment but the last is cut to its first two characters and
    /// followed by the join character; the last segment goes through
    /// [`compress_house_number`](Self::compress_house_number).
    pub fn canonicalize(&self, raw: &str) -> String {
        let separators = raw.chars().filter(|c| *c == self.config.separator).count();
        if separators < 2 {
            return raw.to_string();
        }

        let segments: Vec<&str> = raw.split(self.config.separator).collect();
        let (last, leading) = match segments.split_last() {
            Some(parts) => parts,
            None => return raw.to_string(),
        };

        let mut key = String::with_capacity(raw.len());
        for segment in leading {
            key.extend(segment.chars().take(SEGMENT_KEEP));
            key.push(self.config.join);
        }
        key.push_str(&self.compress_house_number(last));
        key
    }

    /// Last-segment rule: keep the first and last two characters around a
    /// join character, but only when that actually shortens the segment.
    pub fn compress_house_number(&self, segment: &str) -> String {
        let chars: Vec<char> = segment.chars().collect();
        let len = chars.len();
        if len < 4 {
            return segment.to_string();
        }

        let prefix: String = chars[..2].iter().collect();
        let suffix: String = chars[len - 2..].iter().collect();

        // Prefix [0, 2) and suffix [len-2, len) overlap. Cannot hold for
        // len >= 4 but kept as part of the rule.
        if 1 >= len - 2 {
            return segment.to_string();
        }

        if len > 5 {
            let mut compressed = prefix;
            compressed.push(self.config.join);
            compressed.push_str(&suffix);
            compressed
        } else {
            segment.to_string()
        }
    }
}
