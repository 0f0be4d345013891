// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Dashboards: a space plus the charts in it.

use super::{byte_hash, hash, parse, KindSync};
use crate::error::Result;
use crate::remote::{self, AppOpticsApi, RemoteError};
use crate::types::remote::{Chart, DashboardDocument};
use crate::types::{ResourceKind, ResourceSpec, ResourceStatus};
use async_trait::async_trait;
use tracing::{debug, info, warn};

pub(super) struct Spaces<'a, C> {
    client: &'a C,
}

impl<'a, C: AppOpticsApi> Spaces<'a, C> {
    pub(super) fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Returns the space id and whether the space was (re)created
    async fn ensure_space(&self, name: &str, id: i64) -> Result<(i64, bool)> {
        if id != 0 {
            match self.client.retrieve_space(id).await {
                Ok(space) => {
                    if space.name != name {
                        info!("Renaming space {} from '{}' to '{}'", id, space.name, name);
                        self.client.update_space(id, name).await?;
                    }
                    return Ok((id, false));
                }
                Err(e) if e.is_not_found() => {
                    warn!("Space {} no longer exists in AppOptics, creating it again", id);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let space = self.client.create_space(name).await?;
        let id = space.id.ok_or(RemoteError::MissingId { path: "spaces" })?;
        info!("Created space '{}' with id {}", name, id);
        Ok((id, true))
    }

    /// Delete every chart in the space, then create the desired ones in order
    async fn replace_charts(&self, space_id: i64, existing: &[Chart], desired: &[Chart]) -> Result<()> {
        for chart in existing {
            if let Some(chart_id) = chart.id {
                self.client.delete_chart(space_id, chart_id).await?;
            }
        }
        for chart in desired {
            let mut chart = chart.clone();
            chart.id = None;
            self.client.create_chart(space_id, &chart).await?;
        }
        debug!(
            "Replaced {} charts with {} in space {}",
            existing.len(),
            desired.len(),
            space_id
        );
        Ok(())
    }
}

#[async_trait]
impl<C: AppOpticsApi> KindSync for Spaces<'_, C> {
    async fn sync(
        &self,
        spec: &ResourceSpec,
        mut status: ResourceStatus,
        spec_changed: bool,
    ) -> Result<ResourceStatus> {
        let dashboard: DashboardDocument = parse(ResourceKind::Dashboard, &spec.data)?;

        let (space_id, created) = self.ensure_space(&dashboard.name, status.id).await?;
        status.id = space_id;

        let charts = self.client.list_charts(space_id).await?;
        let drifted = !status.hashes.remote_matches(&hash(&charts)?);
        if created || spec_changed || drifted {
            if drifted && !created {
                debug!("Charts of space {} differ from the last recorded state", space_id);
            }
            self.replace_charts(space_id, &charts, &dashboard.charts)
                .await?;
            let charts = self.client.list_charts(space_id).await?;
            status.hashes.appoptics = byte_hash(&charts)?;
        }

        Ok(status)
    }

    async fn remove(&self, id: i64) -> remote::Result<()> {
        self.client.delete_space(id).await
    }
}
