//! Single-file download -- existence short-circuit, gated streaming, cleanup.

use crate::config::DEFAULT_READ_TIMEOUT;
use crate::error::DownloadError;
use crate::types::{DownloadEvent, DownloadOutcome, DownloadRequest, DownloadResult};
use crate::utils::{remove_partial_file, resolve_output_path};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::gates::ConcurrencyGates;

/// Everything a download shares with the rest of its batch.
///
/// Cloning is cheap: the client, gates, token and sender are all handles.
#[derive(Clone)]
pub struct DownloadContext {
    pub(crate) client: reqwest::Client,
    pub(crate) gates: ConcurrencyGates,
    pub(crate) chunk_size: usize,
    pub(crate) read_timeout: Duration,
    pub(crate) cancel_token: CancellationToken,
    pub(crate) event_tx: broadcast::Sender<DownloadEvent>,
}

impl DownloadContext {
    /// Context with the default idle timeout, a fresh cancellation token and
    /// an event channel nobody listens to
    pub fn new(client: reqwest::Client, gates: ConcurrencyGates, chunk_size: usize) -> Self {
        let (event_tx, _rx) = broadcast::channel(16);
        Self {
            client,
            gates,
            chunk_size: chunk_size.max(1),
            read_timeout: DEFAULT_READ_TIMEOUT,
            cancel_token: CancellationToken::new(),
            event_tx,
        }
    }

    /// Fail a download when no body data arrives for this long
    #[must_use]
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Abort pending and in-flight downloads when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Publish [`DownloadEvent`]s on `event_tx`
    #[must_use]
    pub fn with_events(mut self, event_tx: broadcast::Sender<DownloadEvent>) -> Self {
        self.event_tx = event_tx;
        self
    }

    fn emit(&self, event: DownloadEvent) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }
}

/// Download one file, producing exactly one result.
///
/// Never returns an error: every failure is folded into the result, and any
/// file this call created is removed before it returns.
pub async fn download_file(ctx: &DownloadContext, request: DownloadRequest) -> DownloadResult {
    let path = match resolve_output_path(&request) {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(url = %request.url, error = %e, "cannot resolve output path");
            return DownloadResult::failed(request.output_dir, e);
        }
    };

    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        tracing::debug!(path = %path.display(), "file already exists, skipping");
        ctx.emit(DownloadEvent::Skipped { path: path.clone() });
        return DownloadResult::already_exists(path);
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        // create_dir_all succeeds when another task created the directory first
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            tracing::warn!(path = %parent.display(), error = %e, "cannot create output directory");
            return DownloadResult::failed(path, e.into());
        }
    }

    match fetch_gated(ctx, &request.url, &path).await {
        Ok(outcome) => {
            tracing::debug!(url = %request.url, path = %path.display(), "download complete");
            DownloadResult {
                path,
                outcome: Ok(outcome),
            }
        }
        Err(e) => {
            tracing::warn!(url = %request.url, path = %path.display(), error = %e, "download failed");
            DownloadResult::failed(path, e)
        }
    }
}

/// Hold both permits from before the request until cleanup is done
async fn fetch_gated(
    ctx: &DownloadContext,
    url: &str,
    path: &Path,
) -> Result<DownloadOutcome, DownloadError> {
    let _permits = tokio::select! {
        biased;
        _ = ctx.cancel_token.cancelled() => return Err(DownloadError::Cancelled),
        permits = ctx.gates.acquire() => permits.map_err(|_| DownloadError::Cancelled)?,
    };

    let started = Instant::now();
    let mut created = false;

    let result = tokio::select! {
        biased;
        _ = ctx.cancel_token.cancelled() => Err(DownloadError::Cancelled),
        bytes = stream_to_file(ctx, url, path, &mut created) => bytes,
    };

    if created {
        if result.is_err() {
            remove_partial_file(path).await;
        }
        ctx.emit(DownloadEvent::Finished {
            path: path.to_path_buf(),
            success: result.is_ok(),
        });
    }

    result.map(|bytes| DownloadOutcome::Completed {
        bytes,
        elapsed: started.elapsed(),
    })
}

/// GET `url` and write its body to `path`, returning the byte count
///
/// Sets `created` as soon as the output file exists on disk.
async fn stream_to_file(
    ctx: &DownloadContext,
    url: &str,
    path: &Path,
    created: &mut bool,
) -> Result<u64, DownloadError> {
    let response = tokio::time::timeout(ctx.read_timeout, ctx.client.get(url).send())
        .await
        .map_err(|_| DownloadError::Timeout {
            after: ctx.read_timeout,
        })??;

    let status = response.status();
    if status.as_u16() > 399 {
        return Err(DownloadError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    let total_bytes = response.content_length();

    let mut file = match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(DownloadError::DestinationExists {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(e.into()),
    };
    *created = true;

    ctx.emit(DownloadEvent::Started {
        url: url.to_string(),
        path: path.to_path_buf(),
    });

    let mut response = response;
    let mut bytes_written = 0u64;
    loop {
        let chunk = tokio::time::timeout(ctx.read_timeout, response.chunk())
            .await
            .map_err(|_| DownloadError::Timeout {
                after: ctx.read_timeout,
            })??;
        let Some(chunk) = chunk else {
            break;
        };

        for piece in chunk.chunks(ctx.chunk_size) {
            file.write_all(piece).await?;
            bytes_written += piece.len() as u64;
            ctx.emit(DownloadEvent::Progress {
                path: path.to_path_buf(),
                bytes_written,
                total_bytes,
            });
        }
    }

    file.flush().await?;
    Ok(bytes_written)
}
