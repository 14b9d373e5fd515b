//! Subscription checksum handling
//!
//! A list may declare `! Checksum: <value>` near its top. The value is the
//! MD5 of the list with blank lines and the checksum line itself removed,
//! base64-encoded with the two trailing padding characters stripped.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use md5::{Digest, Md5};

const CHECKSUM_PREFIX: &str = "! Checksum:";

/// A downloaded subscription body split into its canonical buffer and the
/// declared checksum, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalList {
    pub data: String,
    pub checksum: Option<String>,
}

/// Canonicalize a subscription body.
///
/// The header line is kept, blank lines are dropped, and the first
/// `! Checksum:` line is captured and removed from the buffer.
pub fn canonicalize(body: &str) -> CanonicalList {
    let mut lines = body.lines();

    let mut data = String::with_capacity(body.len());
    if let Some(header) = lines.next() {
        data.push_str(header.trim_end_matches('\r'));
    }

    let mut checksum = None;

    for line in lines {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        if checksum.is_none() {
            if let Some(value) = line.strip_prefix(CHECKSUM_PREFIX) {
                checksum = Some(value.trim().to_string());
                continue;
            }
        }

        data.push('\n');
        data.push_str(line);
    }

    CanonicalList { data, checksum }
}

/// Compute the checksum field for a canonical buffer.
pub fn compute(data: &str) -> String {
    let digest = Md5::digest(data.as_bytes());
    let mut encoded = STANDARD.encode(digest);
    // MD5 always base64-encodes to 24 characters ending in "==".
    encoded.truncate(encoded.len() - 2);
    encoded
}

/// True when the list declares no checksum or the declared value matches.
pub fn verify(list: &CanonicalList) -> bool {
    match &list.checksum {
        Some(declared) => compute(&list.data) == *declared,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "[Adblock Plus 2.0]\n! Title: Example\n||ads.test^\n##.banner\n";

    #[test]
    fn canonical_buffer_drops_blank_and_checksum_lines() {
        let body = "[Adblock Plus 2.0]\n\n! Checksum: abc\n||ads.test^\n\n";
        let list = canonicalize(body);

        assert_eq!(list.checksum.as_deref(), Some("abc"));
        assert_eq!(list.data, "[Adblock Plus 2.0]\n||ads.test^");
    }

    #[test]
    fn computed_checksum_round_trips() {
        let canonical = canonicalize(BODY);
        let declared = compute(&canonical.data);

        // Re-insert the checksum line after the header and verify.
        let mut body_with_checksum = String::new();
        let mut lines = BODY.lines();
        body_with_checksum.push_str(lines.next().unwrap());
        body_with_checksum.push_str("\n! Checksum: ");
        body_with_checksum.push_str(&declared);
        for line in lines {
            body_with_checksum.push('\n');
            body_with_checksum.push_str(line);
        }

        let list = canonicalize(&body_with_checksum);
        assert_eq!(list.checksum.as_deref(), Some(declared.as_str()));
        assert!(verify(&list));
    }

    #[test]
    fn checksum_has_padding_stripped() {
        let value = compute("[Adblock Plus 2.0]");
        assert_eq!(value.len(), 22);
        assert!(!value.ends_with('='));
    }

    #[test]
    fn tampered_body_fails_verification() {
        let canonical = canonicalize(BODY);
        let declared = compute(&canonical.data);

        let tampered = format!(
            "[Adblock Plus 2.0]\n! Checksum: {declared}\n||ads.test^\n||extra.test^\n"
        );
        assert!(!verify(&canonicalize(&tampered)));
    }

    #[test]
    fn lists_without_checksum_verify_trivially() {
        assert!(verify(&canonicalize(BODY)));
    }

    #[test]
    fn only_the_first_checksum_line_is_captured() {
        let body = "[h]\n! Checksum: one\n! Checksum: two\n";
        let list = canonicalize(body);

        assert_eq!(list.checksum.as_deref(), Some("one"));
        assert_eq!(list.data, "[h]\n! Checksum: two");
    }
}
