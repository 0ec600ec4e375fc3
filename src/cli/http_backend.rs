use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Serialize;

use crate::models::{Bookmark, QueryRequest, QueryResult};

/// HTTP client backend that delegates queries and writes to a running
/// `markdir` daemon.
pub struct HttpStoreBackend {
    client: Client,
    base_url: String,
}

impl HttpStoreBackend {
    /// Create a new HTTP backend targeting the given base URL
    /// (e.g. "http://127.0.0.1:7878").
    pub fn new<S: Into<String>>(base_url: S) -> Result<Self> {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, base_url })
    }

    /// Run a query via `POST /v1/query`.
    pub fn query(&self, request: &QueryRequest) -> Result<QueryResult> {
        self.post_json("/v1/query", request)
    }

    /// Add or update a bookmark via `POST /v1/bookmark`, returning the
    /// stored record.
    pub fn add(&self, bookmark: &Bookmark) -> Result<Bookmark> {
        self.post_json("/v1/bookmark", bookmark)
    }

    fn post_json<T, R>(&self, path: &str, body: &T) -> Result<R>
    where
        T: Serialize,
        R: serde::de::DeserializeOwned,
    {
        let url = self.url_for(path);
        tracing::debug!(%url, "delegating to server");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .with_context(|| format!("failed to send request to {url}"))?;

        let status = response.status();
        if !status.is_success() {
            // Surface the server's `{"error": ...}` message when present.
            let message = response
                .json::<serde_json::Value>()
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or_else(|| status.to_string());
            anyhow::bail!("server returned {status} for {url}: {message}");
        }

        response
            .json::<R>()
            .context("failed to decode JSON response from server")
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
