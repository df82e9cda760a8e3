//! Content fingerprint used for concurrent-edit detection.
//!
//! # Invariants
//! - Rolling 32-bit hash (`h = h * 31 + unit`, wrapping) over UTF-16 code
//!   units, so values agree with fingerprints computed by the editor runtime.
//! - Text form is the signed value in lowercase base-36.
//! - Detection heuristic only: collisions are possible and tolerated.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Cheap, non-cryptographic checksum of a content string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(i32);

impl Fingerprint {
    /// Computes the fingerprint of `content`.
    pub fn of(content: &str) -> Self {
        let hash = content
            .encode_utf16()
            .fold(0_i32, |hash, unit| {
                hash.wrapping_mul(31).wrapping_add(i32::from(unit))
            });
        Self(hash)
    }

    /// Returns the raw 32-bit value.
    pub fn value(self) -> i32 {
        self.0
    }
}

/// Parse failure for fingerprint text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintParseError(String);

impl Display for FingerprintParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid fingerprint `{}`", self.0)
    }
}

impl Error for FingerprintParseError {}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

        let mut magnitude = i64::from(self.0).unsigned_abs();
        if magnitude == 0 {
            return f.write_str("0");
        }
        let mut buf = Vec::with_capacity(8);
        while magnitude > 0 {
            buf.push(DIGITS[(magnitude % 36) as usize]);
            magnitude /= 36;
        }
        if self.0 < 0 {
            buf.push(b'-');
        }
        buf.reverse();
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let parsed = i64::from_str_radix(trimmed, 36)
            .map_err(|_| FingerprintParseError(value.to_string()))?;
        i32::try_from(parsed)
            .map(Self)
            .map_err(|_| FingerprintParseError(value.to_string()))
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = FingerprintParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::Fingerprint;

    #[test]
    fn empty_content_hashes_to_zero() {
        assert_eq!(Fingerprint::of("").value(), 0);
        assert_eq!(Fingerprint::of("").to_string(), "0");
    }

    #[test]
    fn matches_known_rolling_hash_values() {
        // "a" = 97, "ab" = 97 * 31 + 98
        assert_eq!(Fingerprint::of("a").value(), 97);
        assert_eq!(Fingerprint::of("ab").value(), 3105);
        assert_eq!(Fingerprint::of("ab").to_string(), "2e9");
    }

    #[test]
    fn hashes_utf16_units_not_bytes() {
        // U+00E9 is one UTF-16 unit (233) but two UTF-8 bytes.
        assert_eq!(Fingerprint::of("\u{e9}").value(), 233);
    }

    #[test]
    fn text_form_parses_back() {
        let negative: Fingerprint = "-1a".parse().expect("negative text should parse");
        assert_eq!(negative.value(), -46);
        assert_eq!(negative.to_string(), "-1a");

        let fingerprint = Fingerprint::of("the quick brown fox jumps over the lazy dog");
        let text = fingerprint.to_string();
        let parsed: Fingerprint = text.parse().expect("fingerprint text should parse");
        assert_eq!(parsed, fingerprint);
    }

    #[test]
    fn rejects_out_of_range_and_garbage_text() {
        assert!("zzzzzzzzzz".parse::<Fingerprint>().is_err());
        assert!("not a hash".parse::<Fingerprint>().is_err());
    }

    #[test]
    fn different_content_changes_fingerprint() {
        assert_ne!(Fingerprint::of("hello"), Fingerprint::of("hello!"));
    }
}
