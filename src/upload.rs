//! File upload into a Jupyter server through the contents REST API.
//!
//! The file is sent as one base64-encoded JSON document with
//! `PUT {server}/api/contents/{path}`, authenticated with a token issued by
//! JupyterHub (found at `https://<hub>/hub/token`).

use crate::error::Result;
use crate::utils::{USER_AGENT, build_http_client};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// JSON document accepted by `PUT /api/contents/{path}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadBody {
    /// Base64 of the file's bytes
    pub content: String,
    /// Basename of the local file
    pub name: String,
    /// Destination path on the server, relative to the user's home
    pub path: String,
    /// Always "base64"
    pub format: String,
    /// Always "file"
    #[serde(rename = "type")]
    pub kind: String,
}

/// Read `local_path` and build the contents API body for `remote_path`
///
/// The file must be UTF-8 text; anything else fails with an I/O error of kind
/// `InvalidData`.
pub async fn build_upload_body(local_path: &Path, remote_path: &str) -> Result<UploadBody> {
    let text = tokio::fs::read_to_string(local_path).await?;
    let name = local_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(UploadBody {
        content: STANDARD.encode(text.as_bytes()),
        name,
        path: remote_path.to_string(),
        format: "base64".to_string(),
        kind: "file".to_string(),
    })
}

/// Contents endpoint for `remote_path`, with the whole path percent-encoded
///
/// # Examples
///
/// ```
/// use jupyterlab_sdk::upload::contents_url;
///
/// assert_eq!(
///     contents_url("https://hub.example/user/ana/", "work/data 1.csv"),
///     "https://hub.example/user/ana/api/contents/work%2Fdata%201.csv"
/// );
/// ```
pub fn contents_url(server_url: &str, remote_path: &str) -> String {
    format!(
        "{}/api/contents/{}",
        server_url.trim_end_matches('/'),
        urlencoding::encode(remote_path)
    )
}

/// Reusable uploader bound to one Jupyter server and token
///
/// Certificate validation is always on.
#[derive(Clone, Debug)]
pub struct JupyterClient {
    http_client: reqwest::Client,
    server_url: String,
    token: String,
}

impl JupyterClient {
    /// Create a client for `server_url` (typically `https://<hub>/user/<name>`)
    pub fn new(server_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let http_client = build_http_client(reqwest::Client::builder().user_agent(USER_AGENT))?;

        Ok(Self {
            http_client,
            server_url: server_url.into(),
            token: token.into(),
        })
    }

    /// Server this client uploads to
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Upload `local_path` to `remote_path`, creating or overwriting it
    ///
    /// The destination directory must already exist on the server. The raw
    /// response is returned whatever its status; callers decide what a 4xx
    /// or 5xx means for them.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`](crate::Error::Io) if the local file cannot be read as UTF-8 text
    /// - [`Error::Network`](crate::Error::Network) if the request cannot be sent
    pub async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<reqwest::Response> {
        let body = build_upload_body(local_path, remote_path).await?;
        let url = contents_url(&self.server_url, remote_path);

        tracing::info!(
            local = %local_path.display(),
            remote = %remote_path,
            "uploading file to Jupyter server"
        );

        let response = self
            .http_client
            .put(&url)
            .header(AUTHORIZATION, format!("token {}", self.token))
            .json(&body)
            .send()
            .await?;

        tracing::debug!(url = %url, status = %response.status(), "upload response received");
        Ok(response)
    }
}

/// Upload one file to a Jupyter server
///
/// One-shot form of [`JupyterClient::upload`]. This is an `async fn`; blocking
/// callers can drive it with a tokio `Runtime::block_on`.
///
/// # Example
///
/// ```no_run
/// use jupyterlab_sdk::jupyter_upload;
/// use std::path::Path;
///
/// # async fn example() -> jupyterlab_sdk::Result<()> {
/// let response = jupyter_upload(
///     "0123456789abcdef",
///     Path::new("notes/analysis.py"),
///     "work/analysis.py",
///     "https://hub.example/user/ana",
/// )
/// .await?;
/// println!("server answered {}", response.status());
/// # Ok(())
/// # }
/// ```
pub async fn jupyter_upload(
    token: &str,
    local_path: &Path,
    remote_path: &str,
    jupyter_url: &str,
) -> Result<reqwest::Response> {
    JupyterClient::new(jupyter_url, token)?
        .upload(local_path, remote_path)
        .await
}
