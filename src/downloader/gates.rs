//! Dual concurrency gate -- network connections and open file handles.

use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Two independent counting gates shared by every download of a batch.
///
/// `https` bounds simultaneous HTTP connections, `files` bounds simultaneously
/// open output files. A download holds one permit of each for its whole
/// transfer; the caps need not be equal.
#[derive(Clone, Debug)]
pub struct ConcurrencyGates {
    https: Arc<Semaphore>,
    files: Arc<Semaphore>,
}

/// Both permits of one download; dropping it releases both.
#[derive(Debug)]
pub struct GatePermits {
    _https: OwnedSemaphorePermit,
    _files: OwnedSemaphorePermit,
}

impl ConcurrencyGates {
    /// Create gates sized to the given caps
    ///
    /// # Panics
    ///
    /// If a cap exceeds [`Semaphore::MAX_PERMITS`]. [`DownloadConfig::validate`]
    /// rejects such caps before a batch builds its gates.
    ///
    /// [`DownloadConfig::validate`]: crate::config::DownloadConfig::validate
    pub fn new(cap_https: usize, cap_files: usize) -> Self {
        Self {
            https: Arc::new(Semaphore::new(cap_https)),
            files: Arc::new(Semaphore::new(cap_files)),
        }
    }

    /// Wait for a network permit, then a file permit
    ///
    /// The order is fixed for every caller, so two downloads can never each
    /// hold the permit the other is waiting for.
    pub async fn acquire(&self) -> Result<GatePermits, AcquireError> {
        let https = self.https.clone().acquire_owned().await?;
        let files = self.files.clone().acquire_owned().await?;
        Ok(GatePermits {
            _https: https,
            _files: files,
        })
    }

    /// Free network permits
    pub fn available_https(&self) -> usize {
        self.https.available_permits()
    }

    /// Free file permits
    pub fn available_files(&self) -> usize {
        self.files.available_permits()
    }
}
