//! # Number Extraction Module
//!
//! Scans recognized text for 10-digit Indian mobile numbers and normalizes
//! them to the canonical 12-digit international form (`91` + 10 digits).
//!
//! ## Pattern
//!
//! A match is a 10-digit run whose first digit is 6–9, optionally preceded by
//! one of the literal prefixes `+91`, `91` or `0` with at most one separator
//! (space or hyphen) in between. A run immediately followed by another digit
//! is not a mobile number and is rejected. Matching is leftmost and
//! non-overlapping; results are deduplicated per call in first-seen order.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

/// Country calling code prepended during normalization
pub const COUNTRY_PREFIX: &str = "91";

// The `regex` crate has no lookahead, so the trailing token boundary ("not
// immediately followed by another digit") is a zero-width check applied
// manually: when it fails, the scan resumes one position past the attempted
// match start, exactly as a pattern ending in a lookahead would behave under
// global matching.
const MOBILE_PATTERN: &str = r"(?:\+91|91|0)?[\s-]?([6-9][0-9]{9})";

lazy_static! {
    static ref MOBILE_REGEX: Regex =
        Regex::new(MOBILE_PATTERN).expect("Default mobile number pattern should be valid");
}

/// Mobile number extractor over recognized text
pub struct NumberExtractor {
    /// Compiled pattern for detecting mobile numbers
    pattern: Regex,
}

impl NumberExtractor {
    /// Create a new extractor with the default mobile number pattern
    pub fn new() -> Self {
        Self {
            pattern: MOBILE_REGEX.clone(),
        }
    }

    /// The pattern string in use, mainly for diagnostics and tests
    pub fn pattern_str(&self) -> &str {
        self.pattern.as_str()
    }

    /// Extract normalized mobile numbers from `text`.
    ///
    /// Pure and deterministic. Every match is reduced to its captured
    /// 10-digit group (prefix and separator discarded) and prepended with
    /// `91`. Duplicates are dropped; the first occurrence wins the ordering.
    /// Text with zero matches yields an empty vector, not an error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use phonescan::extraction::NumberExtractor;
    ///
    /// let extractor = NumberExtractor::new();
    /// let numbers = extractor.extract("Call +91 9876543210 or 09812345678");
    /// assert_eq!(numbers, vec!["919876543210", "919812345678"]);
    /// ```
    pub fn extract(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut numbers = Vec::new();
        let mut pos = 0;

        while let Some(caps) = self.pattern.captures_at(text, pos) {
            let whole = caps
                .get(0)
                .expect("capture group 0 always exists for a match");
            let digits = caps
                .get(1)
                .expect("digit group is not optional in the pattern");

            // Token boundary: a run followed by another digit is part of a
            // longer digit sequence, not a mobile number. The check is
            // zero-width, so a failure does not consume the attempted span;
            // the scan resumes one position past where the attempt started.
            // Every pattern position is ASCII, so byte offsets are safe.
            if text
                .as_bytes()
                .get(whole.end())
                .is_some_and(|b| b.is_ascii_digit())
            {
                pos = whole.start() + 1;
                continue;
            }

            let normalized = format!("{}{}", COUNTRY_PREFIX, digits.as_str());
            if seen.insert(normalized.clone()) {
                numbers.push(normalized);
            }
            pos = whole.end();
        }

        debug!(
            target: "extraction",
            "Extracted {} unique mobile number(s) from {} characters of text",
            numbers.len(),
            text.len()
        );

        numbers
    }
}

impl Default for NumberExtractor {
    fn default() -> Self {
        Self::new()
    }
}
