//! Utility functions for output path resolution, cleanup and HTTP clients

use crate::error::{self, DownloadError, Error};
use crate::types::DownloadRequest;
use std::path::{Path, PathBuf};

/// User-Agent sent by every client this crate builds
pub(crate) const USER_AGENT: &str = concat!("jupyterlab-sdk/", env!("CARGO_PKG_VERSION"));

/// Finish a client builder, reporting failures as [`Error::Other`]
pub(crate) fn build_http_client(
    builder: reqwest::ClientBuilder,
) -> error::Result<reqwest::Client> {
    builder
        .build()
        .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))
}

/// Resolve the file a request writes to
///
/// Uses the explicit filename when given, otherwise the last path segment of
/// the URL (query and fragment excluded, percent-decoded).
///
/// # Errors
///
/// - [`DownloadError::InvalidUrl`] if the URL cannot be parsed and no override is set
/// - [`DownloadError::InvalidFilename`] if the name is empty, `.` or `..`, or a
///   URL-derived name decodes to something containing a path separator
///
/// # Examples
///
/// ```
/// use jupyterlab_sdk::types::DownloadRequest;
/// use jupyterlab_sdk::utils::resolve_output_path;
/// use std::path::Path;
///
/// let request = DownloadRequest::new("https://data.example/files/sst.nc?v=2", "out");
/// assert_eq!(resolve_output_path(&request).unwrap(), Path::new("out/sst.nc"));
/// ```
pub fn resolve_output_path(request: &DownloadRequest) -> Result<PathBuf, DownloadError> {
    let filename = match &request.output_filename {
        Some(name) => name.clone(),
        None => {
            let name = filename_from_url(&request.url)?;
            if name.contains('/') || name.contains('\\') {
                return Err(DownloadError::InvalidFilename {
                    url: request.url.clone(),
                });
            }
            name
        }
    };

    if matches!(filename.as_str(), "" | "." | "..") {
        return Err(DownloadError::InvalidFilename {
            url: request.url.clone(),
        });
    }

    Ok(request.output_dir.join(filename))
}

/// Last path segment of `url`, percent-decoded (may be empty)
fn filename_from_url(url: &str) -> Result<String, DownloadError> {
    let parsed = url::Url::parse(url).map_err(|e| DownloadError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    match urlencoding::decode(segment) {
        Ok(decoded) => Ok(decoded.into_owned()),
        // Not valid UTF-8 once decoded; keep the raw segment
        Err(_) => Ok(segment.to_string()),
    }
}

/// Delete a partially written download
///
/// Failures are logged, not returned: the download has already failed and
/// its result carries the original error.
pub(crate) async fn remove_partial_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed partial download");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to remove partial download"
            );
        }
    }
}
