//! adshield profile lifecycle
//!
//! A profile is a named, versioned subscription file of filter rules,
//! fetched from a URL and cached locally. This crate owns the lifecycle
//! around the matching engine: header scanning, loading the trie,
//! asynchronous updates with checksum validation and atomic persistence,
//! and removal.
//!
//! Errors are never raised through return paths. Failures set an error
//! state on the profile and are surfaced to the host through the
//! [`console::ConsoleSink`].

pub mod console;
pub mod error;
pub mod job;
pub mod profile;

pub use console::{ConsoleSink, MessageCategory, MessageLevel, TracingConsole};
pub use error::{FetchError, ProfileError};
pub use job::DataFetchJob;
pub use profile::{FilterProfile, ProfileCategory, ProfileDescriptor, ProfileFlags};
