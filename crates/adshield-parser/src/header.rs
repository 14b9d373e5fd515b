//! Subscription header scanning
//!
//! A cheap pre-pass over the first lines of a profile file: it validates
//! the `[Adblock` marker and pulls out the title without building any trie.
//! Used before a full load and at startup.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

/// How many lines after the header marker the scanner will look at.
const HEADER_SCAN_LINES: usize = 50;

const TITLE_PREFIX: &str = "! Title: ";

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("failed to read profile file: {0}")]
    Read(#[from] std::io::Error),
    #[error("invalid header, missing [Adblock marker")]
    InvalidHeader,
}

/// What the scan found out about a subscription file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderInfo {
    pub title: Option<String>,
    /// False as soon as a non-blank, non-comment line was seen inside the
    /// scan window.
    pub is_empty: bool,
}

impl Default for HeaderInfo {
    fn default() -> Self {
        Self {
            title: None,
            is_empty: true,
        }
    }
}

/// True when the line carries the subscription format marker.
pub fn contains_header_marker(line: &str) -> bool {
    line.to_ascii_lowercase().contains("[adblock")
}

/// Scan a subscription header from a buffered reader.
pub fn scan_header<R: BufRead>(reader: R) -> Result<HeaderInfo, HeaderError> {
    let mut lines = reader.lines();

    let first = match lines.next() {
        Some(line) => line?,
        None => return Err(HeaderError::InvalidHeader),
    };
    if !contains_header_marker(&first) {
        return Err(HeaderError::InvalidHeader);
    }

    let mut info = HeaderInfo::default();

    for line in lines.take(HEADER_SCAN_LINES) {
        let line = line?;
        let line = line.trim();

        if info.is_empty && !line.is_empty() && !line.starts_with('!') {
            info.is_empty = false;
        }

        if info.title.is_none() {
            if let Some(title) = line.strip_prefix(TITLE_PREFIX) {
                info.title = Some(title.trim().to_string());
            }
        }
    }

    Ok(info)
}

/// Scan the header of a profile file.
///
/// A file that does not exist yet reports the default (empty) header
/// without raising an error.
pub fn scan_header_file(path: &Path) -> Result<HeaderInfo, HeaderError> {
    if !path.exists() {
        return Ok(HeaderInfo::default());
    }

    let file = File::open(path)?;
    scan_header(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn extracts_title_and_emptiness() {
        let body = "[Adblock Plus 2.0]\n! Title: Example List\n! Expires: 4 days\n||ads.test^\n";
        let info = scan_header(Cursor::new(body)).unwrap();

        assert_eq!(info.title.as_deref(), Some("Example List"));
        assert!(!info.is_empty);
    }

    #[test]
    fn comment_only_files_stay_empty() {
        let body = "[Adblock Plus 2.0]\n! Title: Quiet\n!\n\n";
        let info = scan_header(Cursor::new(body)).unwrap();

        assert_eq!(info.title.as_deref(), Some("Quiet"));
        assert!(info.is_empty);
    }

    #[test]
    fn marker_check_is_case_insensitive() {
        let info = scan_header(Cursor::new("[ADBLOCK PLUS 1.1]\n")).unwrap();
        assert!(info.is_empty);
    }

    #[test]
    fn missing_marker_is_a_parse_error() {
        let result = scan_header(Cursor::new("; not an adblock file\n||ads.test^\n"));
        assert!(matches!(result, Err(HeaderError::InvalidHeader)));

        let result = scan_header(Cursor::new(""));
        assert!(matches!(result, Err(HeaderError::InvalidHeader)));
    }

    #[test]
    fn scan_stops_after_fifty_lines() {
        let mut body = String::from("[Adblock Plus 2.0]\n");
        for _ in 0..HEADER_SCAN_LINES {
            body.push_str("! filler\n");
        }
        body.push_str("! Title: Beyond The Window\n||ads.test^\n");

        let info = scan_header(Cursor::new(body)).unwrap();
        assert_eq!(info.title, None);
        assert!(info.is_empty);
    }

    #[test]
    fn first_title_line_wins() {
        let body = "[Adblock Plus 2.0]\n! Title: First\n! Title: Second\n";
        let info = scan_header(Cursor::new(body)).unwrap();
        assert_eq!(info.title.as_deref(), Some("First"));
    }

    #[test]
    fn missing_file_reports_empty_default() {
        let info = scan_header_file(Path::new("/nonexistent/profile.txt")).unwrap();
        assert_eq!(info, HeaderInfo::default());
    }
}
