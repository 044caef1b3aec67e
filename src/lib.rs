//! # jupyterlab-sdk
//!
//! Helpers for moving data in and out of a hosted JupyterLab environment.
//!
//! - **Upload** a local text file into a Jupyter server through its contents API
//! - **Batch download** many HTTP resources with separate limits on open
//!   connections and open output files
//! - **Scrape** a THREDDS catalog for the download URLs of the files it lists
//!
//! ## Quick Start
//!
//! ```no_run
//! use jupyterlab_sdk::{DownloadRequest, extract_tds_catalog, smart_download};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let urls = extract_tds_catalog(
//!         "https://tds.example/thredds/catalog/ocean/sst/catalog.xml",
//!         Some(r"sst_2024.*\.nc"),
//!     )
//!     .await?;
//!
//!     let results = smart_download(DownloadRequest::from_urls(urls, "sst"), 4, 8).await?;
//!     for result in &results {
//!         println!("{}: {}", result.path.display(), result.comment());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// THREDDS catalog scraping
pub mod catalog;
/// Configuration types
pub mod config;
/// Bounded-concurrency batch downloader
pub mod downloader;
/// Error types
pub mod error;
/// Core types
pub mod types;
/// Jupyter contents API upload
pub mod upload;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use catalog::{CatalogDataset, CatalogUrls, extract_tds_catalog};
pub use config::DownloadConfig;
pub use downloader::{
    BatchDownloader, ConcurrencyGates, DownloadContext, download_file, smart_download,
};
pub use error::{CatalogError, DownloadError, Error, Result};
pub use types::{DownloadEvent, DownloadOutcome, DownloadRequest, DownloadResult};
pub use upload::{JupyterClient, jupyter_upload};
