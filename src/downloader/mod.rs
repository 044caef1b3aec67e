//! Bounded-concurrency batch downloader.
//!
//! - [`gates`] - The two counting gates (network connections, open files)
//! - [`task`] - One gated, streamed, self-cleaning file download
//!
//! A batch builds one HTTP client and one pair of gates, turns every request
//! into a future and polls them all together on the calling task. Results come
//! back in submission order and a failed file never affects its siblings.

pub mod gates;
pub mod task;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use gates::{ConcurrencyGates, GatePermits};
pub use task::{DownloadContext, download_file};

use crate::config::DownloadConfig;
use crate::error::Result;
use crate::types::{DownloadEvent, DownloadRequest, DownloadResult};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Runs batches of downloads under a [`DownloadConfig`]
///
/// # Example
///
/// ```no_run
/// use jupyterlab_sdk::{BatchDownloader, DownloadConfig, DownloadRequest};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = BatchDownloader::new(DownloadConfig::with_caps(4, 16))?;
///
///     let mut events = downloader.subscribe();
///     tokio::spawn(async move {
///         while let Ok(event) = events.recv().await {
///             println!("Event: {:?}", event);
///         }
///     });
///
///     let results = downloader
///         .run(vec![DownloadRequest::new("https://data.example/sst.nc", "data")])
///         .await?;
///     for result in results {
///         println!("{}: {}", result.path.display(), result.comment());
///     }
///     Ok(())
/// }
/// ```
pub struct BatchDownloader {
    config: DownloadConfig,
    cancel_token: CancellationToken,
    event_tx: broadcast::Sender<DownloadEvent>,
}

impl BatchDownloader {
    /// Create a downloader after validating `config`
    pub fn new(config: DownloadConfig) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(config.event_capacity);
        Ok(Self {
            config,
            cancel_token: CancellationToken::new(),
            event_tx,
        })
    }

    /// Subscribe to download events
    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.event_tx.subscribe()
    }

    /// Token that aborts running batches when cancelled
    ///
    /// Cancelling is permanent: later batches on this downloader fail every
    /// request that is not already on disk with
    /// [`DownloadError::Cancelled`](crate::error::DownloadError::Cancelled).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Cancel running and future batches
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// The configuration this downloader was built with
    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Download every request, returning one result per request in input order
    ///
    /// # Errors
    ///
    /// Only fails if the HTTP client cannot be built. Per-file failures are
    /// reported in the returned results.
    pub async fn run<I>(&self, requests: I) -> Result<Vec<DownloadResult>>
    where
        I: IntoIterator<Item = DownloadRequest>,
    {
        let client = self.config.build_client()?;
        let gates = ConcurrencyGates::new(self.config.cap_https, self.config.cap_files);
        let ctx = DownloadContext::new(client, gates, self.config.chunk_size)
            .with_read_timeout(self.config.read_timeout)
            .with_cancellation(self.cancel_token.clone())
            .with_events(self.event_tx.clone());

        let tasks: Vec<_> = requests
            .into_iter()
            .map(|request| download_file(&ctx, request))
            .collect();

        tracing::info!(
            files = tasks.len(),
            cap_https = self.config.cap_https,
            cap_files = self.config.cap_files,
            "starting download batch"
        );

        let results = futures::future::join_all(tasks).await;
        drop(ctx);

        let succeeded = results.iter().filter(|r| r.success()).count();
        let failed = results.len() - succeeded;
        tracing::info!(total = results.len(), succeeded, failed, "download batch finished");
        self.event_tx
            .send(DownloadEvent::BatchCompleted {
                total: results.len(),
                succeeded,
                failed,
            })
            .ok();

        Ok(results)
    }
}

/// Download `requests` with at most `cap_https` connections and `cap_files`
/// open files at once
///
/// Shorthand for [`BatchDownloader::run`] with default timeouts and chunk size.
///
/// # Example
///
/// ```no_run
/// use jupyterlab_sdk::{DownloadRequest, smart_download};
///
/// # async fn example() -> jupyterlab_sdk::Result<()> {
/// let results = smart_download(
///     vec![
///         DownloadRequest::new("https://data.example/a.nc", "data"),
///         DownloadRequest::new("https://data.example/b.nc", "data").with_filename("b-copy.nc"),
///     ],
///     4,
///     2,
/// )
/// .await?;
/// assert_eq!(results.len(), 2);
/// # Ok(())
/// # }
/// ```
pub async fn smart_download<I>(
    requests: I,
    cap_https: usize,
    cap_files: usize,
) -> Result<Vec<DownloadResult>>
where
    I: IntoIterator<Item = DownloadRequest>,
{
    BatchDownloader::new(DownloadConfig::with_caps(cap_https, cap_files))?
        .run(requests)
        .await
}
