//! Configuration types for jupyterlab-sdk

use crate::error::{Error, Result};
use crate::utils::{USER_AGENT, build_http_client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Default size of the pieces written to disk
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Default idle timeout between body chunks
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Batch download configuration (concurrency caps, streaming, timeouts)
///
/// Durations serialize as whole seconds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Maximum simultaneous HTTP connections (default: 8)
    #[serde(default = "default_cap")]
    pub cap_https: usize,

    /// Maximum simultaneously open output files (default: 8)
    #[serde(default = "default_cap")]
    pub cap_files: usize,

    /// Largest piece written to disk at once, in bytes (default: 8192)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// TCP/TLS connect timeout (default: 30s)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Idle timeout between response chunks (default: 60s)
    ///
    /// A stalled connection fails its download after this long instead of
    /// holding its gate permits forever.
    #[serde(default = "default_read_timeout", with = "duration_serde")]
    pub read_timeout: Duration,

    /// Whole-request timeout (None = unbounded, the default)
    #[serde(default, with = "optional_duration_serde")]
    pub request_timeout: Option<Duration>,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Capacity of the download event channel (default: 1000)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            cap_https: default_cap(),
            cap_files: default_cap(),
            chunk_size: default_chunk_size(),
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            request_timeout: None,
            user_agent: default_user_agent(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl DownloadConfig {
    /// Config with the given caps and defaults for everything else
    pub fn with_caps(cap_https: usize, cap_files: usize) -> Self {
        Self {
            cap_https,
            cap_files,
            ..Default::default()
        }
    }

    /// Reject settings that would stall or break a batch
    ///
    /// A zero-sized gate would never hand out a permit; a gate larger than
    /// [`Semaphore::MAX_PERMITS`] cannot be created.
    pub fn validate(&self) -> Result<()> {
        for (key, cap) in [("cap_https", self.cap_https), ("cap_files", self.cap_files)] {
            if cap == 0 {
                return Err(Error::config(key, "must be at least 1"));
            }
            if cap > Semaphore::MAX_PERMITS {
                return Err(Error::config(
                    key,
                    format!("must be at most {}", Semaphore::MAX_PERMITS),
                ));
            }
        }
        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size", "must be at least 1 byte"));
        }
        if self.event_capacity == 0 {
            return Err(Error::config("event_capacity", "must be at least 1"));
        }
        Ok(())
    }

    /// Build the HTTP client shared by every download of a batch
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(&self.user_agent);
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        build_http_client(builder)
    }
}

// Default value functions
fn default_cap() -> usize {
    8
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_read_timeout() -> Duration {
    DEFAULT_READ_TIMEOUT
}

fn default_user_agent() -> String {
    USER_AGENT.to_string()
}

fn default_event_capacity() -> usize {
    1000
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
