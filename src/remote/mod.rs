// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Client boundary towards the AppOptics REST API.

pub mod http;

use crate::constants::remote::NOT_FOUND_MARKER;
use crate::types::remote::{Alert, AlertDefinition, Chart, RemoteService, Space};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use url::Url;

pub use http::{HttpClient, HttpClientFactory};

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("{path} not found")]
    NotFound { path: String },

    #[error("request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("response for {path} carried no id")]
    MissingId { path: &'static str },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }

    /// Classify a non-success response.
    ///
    /// Only the API's own `"Not Found"` marker means "object absent"; a bare 404
    /// (wrong base URL, proxy) stays a regular error.
    pub fn from_response(path: &str, status: u16, body: String) -> Self {
        if has_not_found_marker(&body) {
            RemoteError::NotFound {
                path: path.to_string(),
            }
        } else {
            RemoteError::Api { status, body }
        }
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: ErrorDetails,
}

#[derive(Deserialize, Default)]
struct ErrorDetails {
    #[serde(default)]
    request: Vec<serde_json::Value>,
}

fn has_not_found_marker(body: &str) -> bool {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|r| {
            r.errors
                .request
                .iter()
                .any(|m| m.as_str() == Some(NOT_FOUND_MARKER))
        })
        .unwrap_or(false)
}

pub type Result<T> = std::result::Result<T, RemoteError>;

/// Where to reach the API and with which token
#[derive(Clone)]
pub struct RemoteConfig {
    pub base_url: Url,
    pub token: String,
}

impl RemoteConfig {
    pub fn new(mut base_url: Url, token: impl Into<String>) -> Self {
        // `Url::join` drops the last path segment unless the base ends in a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            token: token.into(),
        }
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .finish()
    }
}

/// CRUD operations per remote entity.
#[async_trait]
pub trait AppOpticsApi: Send + Sync {
    async fn create_space(&self, name: &str) -> Result<Space>;
    async fn retrieve_space(&self, id: i64) -> Result<Space>;
    async fn update_space(&self, id: i64, name: &str) -> Result<()>;
    async fn delete_space(&self, id: i64) -> Result<()>;

    async fn list_charts(&self, space_id: i64) -> Result<Vec<Chart>>;
    async fn create_chart(&self, space_id: i64, chart: &Chart) -> Result<Chart>;
    async fn delete_chart(&self, space_id: i64, chart_id: i64) -> Result<()>;

    async fn create_service(&self, service: &RemoteService) -> Result<RemoteService>;
    async fn retrieve_service(&self, id: i64) -> Result<RemoteService>;
    async fn update_service(&self, id: i64, service: &RemoteService) -> Result<()>;
    async fn delete_service(&self, id: i64) -> Result<()>;

    async fn create_alert(&self, alert: &AlertDefinition) -> Result<Alert>;
    async fn retrieve_alert(&self, id: i64) -> Result<Alert>;
    async fn update_alert(&self, id: i64, alert: &AlertDefinition) -> Result<()>;
    async fn delete_alert(&self, id: i64) -> Result<()>;
    async fn associate_service(&self, alert_id: i64, service_id: i64) -> Result<()>;
    async fn disassociate_service(&self, alert_id: i64, service_id: i64) -> Result<()>;
}

/// Builds a client per reconcile pass from that resource's credentials.
pub trait ClientFactory: Send + Sync {
    type Client: AppOpticsApi;

    fn client(&self, config: RemoteConfig) -> Self::Client;
}
