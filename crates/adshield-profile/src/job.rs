//! Asynchronous subscription download job
//!
//! The fetch runs on the tokio runtime while the profile stays on its
//! owning thread; the body comes back through a oneshot channel.
//! Cancellation makes a late completion a no-op.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

use crate::error::FetchError;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("adshield/", env!("CARGO_PKG_VERSION"));

/// One in-flight subscription download, exclusively owned by its profile.
pub struct DataFetchJob {
    handle: JoinHandle<()>,
    receiver: oneshot::Receiver<Result<String, FetchError>>,
    progress: Arc<AtomicI32>,
    cancelled: Arc<AtomicBool>,
}

impl DataFetchJob {
    /// Spawn the download on the current tokio runtime.
    pub fn start(url: Url) -> Self {
        let (sender, receiver) = oneshot::channel();
        let progress = Arc::new(AtomicI32::new(0));
        let cancelled = Arc::new(AtomicBool::new(false));

        let task_progress = Arc::clone(&progress);
        let task_cancelled = Arc::clone(&cancelled);
        let handle = tokio::spawn(async move {
            let result = fetch(url, task_progress).await;
            if task_cancelled.load(Ordering::SeqCst) {
                return;
            }
            let _ = sender.send(result);
        });

        Self {
            handle,
            receiver,
            progress,
            cancelled,
        }
    }

    /// Download progress in `0..=100`.
    pub fn progress(&self) -> i32 {
        self.progress.load(Ordering::SeqCst)
    }

    /// Cancel the job. A completion racing in is discarded.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.handle.abort();
    }

    /// Non-blocking completion check.
    pub fn try_finish(&mut self) -> Option<Result<String, FetchError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(FetchError::Cancelled)),
        }
    }

    /// Wait for the download to finish.
    pub async fn finish(self) -> Result<String, FetchError> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Cancelled),
        }
    }
}

async fn fetch(url: Url, progress: Arc<AtomicI32>) -> Result<String, FetchError> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .build()?;

    debug!(%url, "fetching subscription");

    let mut response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(FetchError::Status(response.status().as_u16()));
    }

    let total = response.content_length().filter(|total| *total > 0);
    let mut body: Vec<u8> = Vec::new();

    while let Some(chunk) = response.chunk().await? {
        body.extend_from_slice(&chunk);

        if let Some(total) = total {
            let percent = ((body.len() as u64 * 100) / total).min(100) as i32;
            progress.store(percent, Ordering::SeqCst);
        }
    }

    progress.store(100, Ordering::SeqCst);
    debug!(bytes = body.len(), "subscription download finished");

    Ok(String::from_utf8_lossy(&body).into_owned())
}
