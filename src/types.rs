//! Core types for jupyterlab-sdk

use crate::error::DownloadError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One file to fetch as part of a batch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Source URL
    pub url: String,
    /// Directory the file is written into (created if missing)
    pub output_dir: PathBuf,
    /// Output filename; defaults to the last path segment of the URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_filename: Option<String>,
}

impl DownloadRequest {
    /// Request that names the file after the URL's last path segment
    pub fn new(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output_dir: output_dir.into(),
            output_filename: None,
        }
    }

    /// Override the output filename
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.output_filename = Some(filename.into());
        self
    }

    /// Requests for many URLs sharing one output directory
    ///
    /// Handy for feeding [`extract_tds_catalog`](crate::catalog::extract_tds_catalog)
    /// output straight into a batch.
    pub fn from_urls<I, S>(urls: I, output_dir: impl AsRef<Path>) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dir = output_dir.as_ref();
        urls.into_iter().map(|url| Self::new(url, dir)).collect()
    }
}

/// How a successful download ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// A file was already present at the output path; nothing was fetched
    ///
    /// The existing file is not checked for size or content.
    AlreadyExists,
    /// The body was streamed to disk
    Completed {
        /// Bytes written
        bytes: u64,
        /// Wall-clock time from acquiring the gates to the last write
        elapsed: Duration,
    },
}

/// Per-request result of a batch
///
/// Exactly one is produced per [`DownloadRequest`], in submission order.
#[derive(Debug)]
pub struct DownloadResult {
    /// Resolved output path
    pub path: PathBuf,
    /// Success outcome or the reason this file failed
    pub outcome: std::result::Result<DownloadOutcome, DownloadError>,
}

impl DownloadResult {
    pub(crate) fn already_exists(path: PathBuf) -> Self {
        Self {
            path,
            outcome: Ok(DownloadOutcome::AlreadyExists),
        }
    }

    pub(crate) fn failed(path: PathBuf, error: DownloadError) -> Self {
        Self {
            path,
            outcome: Err(error),
        }
    }

    /// Whether the file is now present at [`path`](Self::path)
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The error, if this download failed
    pub fn error(&self) -> Option<&DownloadError> {
        self.outcome.as_ref().err()
    }

    /// Human-readable one-line summary
    pub fn comment(&self) -> String {
        match &self.outcome {
            Ok(DownloadOutcome::AlreadyExists) => "File already exist".to_string(),
            Ok(DownloadOutcome::Completed { elapsed, .. }) => {
                format!("Completed in {}s", elapsed.as_secs_f64())
            }
            Err(e) => e.to_string(),
        }
    }
}

/// Event emitted while a batch runs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// Output file already existed; no request was made
    Skipped {
        /// Output path
        path: PathBuf,
    },

    /// Both gate permits are held and the output file is open
    Started {
        /// Source URL
        url: String,
        /// Output path
        path: PathBuf,
    },

    /// A piece of the body was written
    Progress {
        /// Output path
        path: PathBuf,
        /// Bytes written so far
        bytes_written: u64,
        /// Content-Length, when the server sent one
        #[serde(skip_serializing_if = "Option::is_none")]
        total_bytes: Option<u64>,
    },

    /// Writer finished; emitted before its gate permits are released
    Finished {
        /// Output path
        path: PathBuf,
        /// Whether the file was kept
        success: bool,
    },

    /// Every request of the batch has a result
    BatchCompleted {
        /// Number of requests
        total: usize,
        /// Successful results (including skipped files)
        succeeded: usize,
        /// Failed results
        failed: usize,
    },
}
