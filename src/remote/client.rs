//! HTTP client for the user directory
//!
//! Talks JSON to a jsonplaceholder-style endpoint: `GET /users/1` for the
//! seed user and `GET /users?email=...` for the uniqueness check.

use super::traits::RemoteLookup;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default user directory
pub const DEFAULT_BASE_URL: &str = "https://jsonplaceholder.typicode.com";

/// Id of the user whose details seed the form
const SEED_USER_ID: u64 = 1;

/// A user record as returned by the directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedUser {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    pub email: String,
}

/// Client for the user directory
pub struct HttpLookupClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLookupClient {
    /// Create a client; every request is bounded by `timeout`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("Request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("HTTP error: {}", status));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| anyhow!("Failed to decode response: {}", e))
    }
}

#[async_trait]
impl RemoteLookup for HttpLookupClient {
    async fn fetch_seed_user(&self) -> Result<SeedUser> {
        let url = self.url(&format!("users/{SEED_USER_ID}"));
        tracing::debug!(%url, "fetching seed user");
        self.get_json(self.client.get(&url))
            .await
            .with_context(|| format!("Failed to fetch seed user from {url}"))
    }

    async fn find_users_by_email(&self, email: &str) -> Result<Vec<SeedUser>> {
        let url = self.url("users");
        tracing::debug!(%url, email, "checking email availability");
        self.get_json(self.client.get(&url).query(&[("email", email)]))
            .await
            .with_context(|| format!("Failed to look up users by email at {url}"))
    }
}
