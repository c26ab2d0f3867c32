//! Settings fetch from a resolved registry endpoint.
//!
//! The endpoint handed out by a metadata source is either a network
//! registry (`http://` / `https://`) or a local filesystem path — the
//! file-based source deliberately returns its settings-file path as the
//! endpoint when no user data exists. Both roads lead through the same
//! document parser and assembler, so the agent-id validity gate applies to
//! fetched settings too.

use std::path::Path;
use std::time::Duration;

use crate::document;
use crate::error::KeelError;
use crate::settings::{self, Settings};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

fn is_http(endpoint: &str) -> bool {
    endpoint.starts_with("http://") || endpoint.starts_with("https://")
}

/// Fetch and assemble settings from `endpoint`.
pub async fn fetch_settings(endpoint: &str) -> Result<Settings, KeelError> {
    if is_http(endpoint) {
        fetch_remote(endpoint).await
    } else {
        read_local(Path::new(endpoint)).await
    }
}

async fn fetch_remote(endpoint: &str) -> Result<Settings, KeelError> {
    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| KeelError::Registry {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

    let resp = client
        .get(endpoint)
        .send()
        .await
        .map_err(|e| KeelError::Registry {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

    if !resp.status().is_success() {
        return Err(KeelError::Registry {
            endpoint: endpoint.to_string(),
            message: format!("unexpected status {}", resp.status()),
        });
    }

    let body = resp.text().await.map_err(|e| KeelError::Registry {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })?;

    tracing::debug!(%endpoint, bytes = body.len(), "fetched settings document");
    let user_data = document::parse_user_data(body.as_bytes(), endpoint)?;
    settings::assemble(&user_data)
}

async fn read_local(path: &Path) -> Result<Settings, KeelError> {
    let location = path.display().to_string();
    let raw = tokio::fs::read(path)
        .await
        .map_err(|e| KeelError::DocumentUnreadable {
            document: "settings",
            location: location.clone(),
            source: e,
        })?;
    let user_data = document::parse_user_data(&raw, &location)?;
    settings::assemble(&user_data)
}
