// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::remote::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use anyhow::{bail, Context, Result};
use std::env;
use std::time::Duration;
use url::Url;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace to watch, `None` watches all namespaces
    pub namespace: Option<String>,
    /// Minimum time between two reconciles of the same resource, also the resync period
    pub resync_interval: Duration,
    /// Number of concurrent reconcile workers
    pub workers: usize,
    pub appoptics_url: Url,
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let namespace = var("NAMESPACE").filter(|ns| ns != "*");

        let resync_secs: u64 = var("RESYNC_SECS")
            .context("RESYNC_SECS environment variable not set")?
            .parse()
            .context("RESYNC_SECS must be a positive integer")?;
        if resync_secs == 0 {
            bail!("RESYNC_SECS must be greater than zero");
        }

        let workers: usize = match var("WORKERS") {
            Some(w) => w.parse().context("WORKERS must be a positive integer")?,
            None => 1,
        };
        if workers == 0 {
            bail!("WORKERS must be greater than zero");
        }

        let appoptics_url = var("APPOPTICS_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let appoptics_url = Url::parse(&appoptics_url)
            .with_context(|| format!("APPOPTICS_URL '{}' is not a valid URL", appoptics_url))?;

        let timeout_secs: u64 = match var("REQUEST_TIMEOUT_SECS") {
            Some(t) => t
                .parse()
                .context("REQUEST_TIMEOUT_SECS must be a positive integer")?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Config {
            namespace,
            resync_interval: Duration::from_secs(resync_secs),
            workers,
            appoptics_url,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
