// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking

use crate::constants::crd::{GROUP, POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS, VERSION};
use crate::error::Result;
use crate::types::{AppOpticsAlert, AppOpticsDashboard, AppOpticsService};
use kube::{discovery::Discovery, Client, Resource};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Kinds that must be served before the watches can start
pub fn required_kinds() -> Vec<String> {
    vec![
        AppOpticsDashboard::kind(&()).to_string(),
        AppOpticsService::kind(&()).to_string(),
        AppOpticsAlert::kind(&()).to_string(),
    ]
}

/// Wait until the AppOptics CRDs are served by the API server.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_crds(client: &Client) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match missing_kinds(client).await {
            Ok(missing) if missing.is_empty() => {
                info!("AppOptics CRDs ({}/{}) are available", GROUP, VERSION);
                return Ok(());
            }
            Ok(missing) => {
                info!(
                    "CRDs for {} not yet available, waiting {} seconds...",
                    missing.join(", "),
                    interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for AppOptics CRDs: {}, retrying in {} seconds...",
                    e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;

        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

async fn missing_kinds(client: &Client) -> Result<Vec<String>> {
    let discovery = Discovery::new(client.clone())
        .filter(&[GROUP])
        .run()
        .await?;

    let served: Vec<String> = discovery
        .groups()
        .filter(|group| group.name() == GROUP)
        .flat_map(|group| group.recommended_resources())
        .filter(|(ar, _)| ar.version == VERSION)
        .map(|(ar, _)| ar.kind)
        .collect();

    Ok(unserved(&served))
}

fn unserved(served: &[String]) -> Vec<String> {
    required_kinds()
        .into_iter()
        .filter(|kind| !served.contains(kind))
        .collect()
}
