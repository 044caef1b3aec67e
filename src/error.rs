//! Error types for jupyterlab-sdk
//!
//! Two layers of errors live here:
//! - [`Error`] is returned by operations with no natural unit of isolation
//!   (uploads, catalog extraction, building a batch).
//! - [`DownloadError`] describes why a single file of a batch failed. It never
//!   escapes a batch; it is carried inside that file's
//!   [`DownloadResult`](crate::types::DownloadResult).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for jupyterlab-sdk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for jupyterlab-sdk
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "cap_https")
        key: Option<String>,
    },

    /// I/O error (missing source file, permission denied, non UTF-8 content)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Dataset name filter is not a valid regular expression
    #[error("invalid name pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// THREDDS catalog could not be fetched or understood
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// THREDDS catalog errors
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog server answered with a non-success status
    #[error("catalog {url} returned HTTP {status}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Catalog URL that was requested
        url: String,
    },

    /// The document is not well-formed XML
    #[error("malformed catalog XML: {0}")]
    Xml(String),

    /// A file dataset carries no `urlPath` attribute, so no download URL can be built
    #[error("dataset {name:?} has no urlPath attribute")]
    MissingUrlPath {
        /// The dataset's `name` attribute (empty if absent)
        name: String,
    },
}

/// Why a single download of a batch failed
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The URL could not be parsed and no filename override was given
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// The resolved filename is empty or names a directory (`.`/`..`)
    #[error("cannot derive a file name from {url}; pass an explicit output filename")]
    InvalidFilename {
        /// The URL the filename was derived from
        url: String,
    },

    /// The server answered with an error status (> 399)
    #[error("HTTP {status} for {url}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Transport failure while sending the request or reading the body
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Local disk failure (directory creation, open, write)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No data arrived within the idle timeout
    #[error("no data received for {after:?}")]
    Timeout {
        /// The idle timeout that elapsed
        after: Duration,
    },

    /// The batch was cancelled before this download finished
    #[error("download cancelled")]
    Cancelled,

    /// Another request of the same batch created the destination first
    #[error("destination {path} was created by another download")]
    DestinationExists {
        /// The contested output path
        path: PathBuf,
    },
}

impl Error {
    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::InvalidPattern(_) => "invalid_pattern",
            Error::Catalog(e) => match e {
                CatalogError::HttpStatus { .. } => "catalog_http_status",
                CatalogError::Xml(_) => "catalog_xml",
                CatalogError::MissingUrlPath { .. } => "catalog_missing_url_path",
            },
            Error::Other(_) => "internal_error",
        }
    }

    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

impl DownloadError {
    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            DownloadError::InvalidUrl { .. } => "invalid_url",
            DownloadError::InvalidFilename { .. } => "invalid_filename",
            DownloadError::HttpStatus { .. } => "http_status",
            DownloadError::Request(_) => "request_failed",
            DownloadError::Io(_) => "io_error",
            DownloadError::Timeout { .. } => "timeout",
            DownloadError::Cancelled => "cancelled",
            DownloadError::DestinationExists { .. } => "destination_exists",
        }
    }
}
