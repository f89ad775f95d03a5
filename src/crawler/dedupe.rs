//! Review identity hashing
//!
//! A review's identity is SHA-256 over its canonicalized content, rating and
//! date text. Markup and formatting never take part, so the same review
//! rendered twice with different whitespace or casing hashes the same.

use crate::crawler::parser::ReviewCandidate;
use sha2::{Digest, Sha256};
use std::fmt;

/// Separates hash input fields; not expected in review text
const FIELD_SEPARATOR: char = '\u{1f}';

/// Non-ASCII punctuation that reviewers commonly repeat
const EXTRA_PUNCTUATION: [char; 6] = ['！', '？', '。', '～', '…', '·'];

/// 256-bit review identity
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandidateHash([u8; 32]);

impl CandidateHash {
    /// Lowercase hex rendering (64 characters)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First `len` hex characters, used to name snapshot files
    pub fn hex_prefix(&self, len: usize) -> String {
        let mut hex = self.to_hex();
        hex.truncate(len);
        hex
    }
}

impl fmt::Display for CandidateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for CandidateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CandidateHash({})", self.hex_prefix(16))
    }
}

/// Normalizes review text for hashing
///
/// Whitespace runs become one space, the result is trimmed and lowercased,
/// and runs of one repeated punctuation character collapse to a single one
/// (`"Great!!!"` and `"great!"` are the same review).
pub fn canonicalize_content(content: &str) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    let lowered = collapsed.to_lowercase();

    let mut canonical = String::with_capacity(lowered.len());
    let mut previous: Option<char> = None;

    for c in lowered.chars() {
        if previous == Some(c) && is_punctuation(c) {
            continue;
        }
        canonical.push(c);
        previous = Some(c);
    }

    canonical
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || EXTRA_PUNCTUATION.contains(&c)
}

/// Computes the identity hash of a review candidate
pub fn hash_candidate(candidate: &ReviewCandidate) -> CandidateHash {
    hash_fields(candidate.content(), candidate.rating(), candidate.date_text())
}

/// Computes the identity hash from raw fields
///
/// Absent rating and date are encoded as empty fields; the separator keeps
/// `("a", None, Some("1"))` distinct from `("a", Some(1), None)`.
pub fn hash_fields(content: &str, rating: Option<i32>, date_text: Option<&str>) -> CandidateHash {
    let rating = rating.map(|r| r.to_string()).unwrap_or_default();
    let input = format!(
        "{}{sep}{}{sep}{}",
        canonicalize_content(content),
        rating,
        date_text.unwrap_or(""),
        sep = FIELD_SEPARATOR
    );

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    CandidateHash(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_whitespace_and_case() {
        assert_eq!(
            canonicalize_content("  Kind\n\tDoctor   and  STAFF "),
            "kind doctor and staff"
        );
    }

    #[test]
    fn test_canonicalize_repeated_punctuation() {
        assert_eq!(canonicalize_content("Great clinic!!   "), "great clinic!");
        assert_eq!(canonicalize_content("정말 좋아요～～～"), "정말 좋아요～");
        // Different punctuation marks are kept
        assert_eq!(canonicalize_content("Really?!"), "really?!");
        // Repeated letters are content
        assert_eq!(canonicalize_content("sooo good"), "sooo good");
    }

    #[test]
    fn test_hash_stable_across_formatting() {
        let a = hash_fields("Great clinic!!   ", Some(5), Some("2024-01-01"));
        let b = hash_fields("great clinic!", Some(5), Some("2024-01-01"));
        assert_eq!(a, b);

        let c = hash_fields("GREAT\n   clinic!", Some(5), Some("2024-01-01"));
        assert_eq!(a, c);
    }

    #[test]
    fn test_hash_sensitive_to_rating_and_date() {
        let base = hash_fields("Great clinic", Some(5), Some("2024-01-01"));
        assert_ne!(base, hash_fields("Great clinic", Some(4), Some("2024-01-01")));
        assert_ne!(base, hash_fields("Great clinic", None, Some("2024-01-01")));
        assert_ne!(base, hash_fields("Great clinic", Some(5), Some("2024-01-02")));
        assert_ne!(base, hash_fields("Great clinic", Some(5), None));
        assert_ne!(base, hash_fields("Great clinic.", Some(5), Some("2024-01-01")));
    }

    #[test]
    fn test_placeholders_do_not_collide() {
        let rating_only = hash_fields("ok", Some(1), None);
        let date_only = hash_fields("ok", None, Some("1"));
        assert_ne!(rating_only, date_only);
    }

    #[test]
    fn test_hex_rendering() {
        let hash = hash_fields("x", None, None);
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash.hex_prefix(16), hex[..16]);
        assert_eq!(hash.to_string(), hex);
    }

    #[test]
    fn test_hash_candidate_ignores_markup() {
        let a = ReviewCandidate::new(
            "Nice".to_string(),
            Some(5),
            None,
            false,
            "<li class='a'>Nice</li>".to_string(),
        );
        let b = ReviewCandidate::new(
            "nice".to_string(),
            Some(5),
            None,
            true,
            "<li class='b'><span>nice</span></li>".to_string(),
        );
        assert_eq!(hash_candidate(&a), hash_candidate(&b));
    }
}
