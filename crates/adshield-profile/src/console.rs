//! Console sink for surfacing profile messages to the host.

use std::path::Path;

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Log,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCategory {
    ContentBlocking,
    Network,
    Other,
}

/// Host-facing sink for error and status messages, tagged with severity and
/// the path of the profile involved.
pub trait ConsoleSink: Send + Sync {
    fn add_message(
        &self,
        message: &str,
        category: MessageCategory,
        level: MessageLevel,
        path: Option<&Path>,
    );
}

/// Default sink forwarding every message to `tracing`.
#[derive(Debug, Default)]
pub struct TracingConsole;

impl ConsoleSink for TracingConsole {
    fn add_message(
        &self,
        message: &str,
        category: MessageCategory,
        level: MessageLevel,
        path: Option<&Path>,
    ) {
        let path = path.map(|p| p.display().to_string()).unwrap_or_default();

        match level {
            MessageLevel::Error => error!(?category, %path, "{message}"),
            MessageLevel::Warning => warn!(?category, %path, "{message}"),
            MessageLevel::Log => info!(?category, %path, "{message}"),
        }
    }
}
