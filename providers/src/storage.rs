//! Content-addressed storage upload client.
//!
//! Uploads a built site directory to the storage node's add endpoint as one
//! multipart request, one part per file with its path relative to the
//! directory root. The node wraps the files in a directory and answers with
//! newline-delimited JSON, one entry per added object; the wrapping root is
//! the entry with the empty name, and its identifier is what gets published.
//!
//! The returned identifier is parsed strictly: a malformed identifier aborts
//! the deployment before any write, because a bad pointer would be locked in
//! forever.

use std::path::Path;

use serde::Deserialize;
use url::Url;

use lockstone_types::{ContentId, DeployError};

use crate::ContentStore;
use crate::retry::{RetryConfig, RetryOutcome, send_with_retry};

pub struct StorageClient {
    http: reqwest::Client,
    endpoint: Url,
    retry: RetryConfig,
}

/// One NDJSON entry from the add endpoint.
#[derive(Debug, Deserialize)]
struct AddedEntry {
    #[serde(default, alias = "Name")]
    name: String,
    #[serde(alias = "Hash")]
    hash: String,
    #[serde(default, alias = "Size")]
    size: serde_json::Value,
}

impl AddedEntry {
    /// Size arrives as a string from some node versions and as a number from
    /// others.
    fn size_bytes(&self) -> u64 {
        match &self.size {
            serde_json::Value::Number(n) => n.as_u64().unwrap_or(0),
            serde_json::Value::String(s) => s.parse().unwrap_or(0),
            _ => 0,
        }
    }
}

impl StorageClient {
    pub fn new(http: reqwest::Client, endpoint: Url, retry: RetryConfig) -> Self {
        Self {
            http,
            endpoint,
            retry,
        }
    }

    fn storage_err(detail: impl Into<String>) -> DeployError {
        DeployError::Storage {
            detail: detail.into(),
            source: None,
        }
    }

    /// Collect the directory's files as `(relative_path, bytes)` pairs.
    async fn collect_files(dir: &Path) -> Result<Vec<(String, Vec<u8>)>, DeployError> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| DeployError::Storage {
                detail: format!("failed to walk {}", dir.display()),
                source: Some(Box::new(e)),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(dir)
                .map_err(|e| DeployError::Storage {
                    detail: format!("path outside upload root: {}", entry.path().display()),
                    source: Some(Box::new(e)),
                })?
                .to_string_lossy()
                .replace('\\', "/");
            let bytes =
                tokio::fs::read(entry.path())
                    .await
                    .map_err(|e| DeployError::Storage {
                        detail: format!("failed to read {}", entry.path().display()),
                        source: Some(Box::new(e)),
                    })?;
            files.push((relative, bytes));
        }
        if files.is_empty() {
            return Err(Self::storage_err(format!(
                "{} contains no files to upload",
                dir.display()
            )));
        }
        Ok(files)
    }

    fn build_form(files: &[(String, Vec<u8>)]) -> reqwest::multipart::Form {
        let mut form = reqwest::multipart::Form::new();
        for (relative, bytes) in files {
            let part = reqwest::multipart::Part::bytes(bytes.clone())
                .file_name(relative.clone())
                .mime_str("application/octet-stream")
                .unwrap_or_else(|_| {
                    reqwest::multipart::Part::bytes(bytes.clone()).file_name(relative.clone())
                });
            form = form.part("file", part);
        }
        form
    }

    /// The wrapping directory root from an NDJSON add response.
    fn parse_root(body: &str) -> Result<AddedEntry, DeployError> {
        let mut root = None;
        for line in body.lines().filter(|line| !line.trim().is_empty()) {
            let entry: AddedEntry = serde_json::from_str(line)
                .map_err(|e| Self::storage_err(format!("malformed add response line: {e}")))?;
            if entry.name.is_empty() {
                root = Some(entry);
            }
        }
        root.ok_or_else(|| Self::storage_err("add response did not include a directory root"))
    }
}

impl ContentStore for StorageClient {
    async fn upload_dir(&self, dir: &Path) -> Result<(ContentId, u64), DeployError> {
        let url = self
            .endpoint
            .join("api/v0/add")
            .map_err(|e| DeployError::Config(format!("storage endpoint: {e}")))?;
        let mut url = url;
        url.query_pairs_mut()
            .append_pair("wrap-with-directory", "true")
            .append_pair("cid-version", "1");

        let files = Self::collect_files(dir).await?;
        let total: usize = files.iter().map(|(_, bytes)| bytes.len()).sum();
        tracing::info!(
            files = files.len(),
            bytes = total,
            dir = %dir.display(),
            "uploading site artifact"
        );

        // Multipart bodies are not replayable without rebuilding the form,
        // so the builder closure reassembles it per attempt.
        let outcome = send_with_retry(
            || {
                self.http
                    .post(url.clone())
                    .multipart(Self::build_form(&files))
            },
            None,
            &self.retry,
        )
        .await;

        let response = match outcome {
            RetryOutcome::Success(response) => response,
            RetryOutcome::HttpError(response) => {
                let status = response.status();
                let body = crate::read_capped_error_body(response).await;
                return Err(Self::storage_err(format!("HTTP {status}: {body}")));
            }
            RetryOutcome::ConnectionError { attempts, source } => {
                return Err(DeployError::Storage {
                    detail: format!("upload failed after {attempts} attempts"),
                    source: Some(Box::new(source)),
                });
            }
            RetryOutcome::NonRetryable(e) => {
                return Err(DeployError::Storage {
                    detail: "upload failed".to_string(),
                    source: Some(Box::new(e)),
                });
            }
        };

        let body = response
            .text()
            .await
            .map_err(|e| Self::storage_err(format!("reading add response: {e}")))?;
        let root = Self::parse_root(&body)?;

        // Fail loudly on a malformed identifier - never publish a pointer
        // that resolves to the wrong or no content.
        let content_id = ContentId::parse(&root.hash)?;
        Ok((content_id, root.size_bytes()))
    }
}
