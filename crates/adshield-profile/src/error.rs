//! Error kinds for the profile lifecycle.

use thiserror::Error;

/// Non-fatal error state carried by a profile.
///
/// Failures set this state, emit a console message and leave the profile in
/// its previous state; they never abort the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileError {
    #[default]
    None,
    /// I/O failure opening the profile file.
    Read,
    /// Missing or invalid header during scan or update.
    Parse,
    /// Fetch failure or invalid/empty update URL.
    Download,
    /// Declared checksum does not match the computed one.
    Checksum,
}

/// Failure modes of the data-fetch job.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned HTTP {0}")]
    Status(u16),
    #[error("download cancelled")]
    Cancelled,
}
