// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Alerts and their notification service associations.

use super::{byte_hash, parse, KindSync, ServiceLookup};
use crate::error::Result;
use crate::remote::{self, AppOpticsApi};
use crate::types::remote::AlertDefinition;
use crate::types::{ResourceKind, ResourceSpec, ResourceStatus};
use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

pub(super) struct Alerts<'a, C> {
    client: &'a C,
    services: &'a dyn ServiceLookup,
}

impl<'a, C: AppOpticsApi> Alerts<'a, C> {
    pub(super) fn new(client: &'a C, services: &'a dyn ServiceLookup) -> Self {
        Self { client, services }
    }

    /// Remote ids of the named services that exist remotely
    fn resolve(&self, names: &[String]) -> BTreeSet<i64> {
        names
            .iter()
            .filter_map(|name| {
                let id = self.services.remote_id(name);
                if id.is_none() {
                    debug!("Service '{}' has no remote id yet, not attaching it", name);
                }
                id
            })
            .collect()
    }

    async fn create(
        &self,
        definition: &AlertDefinition,
        desired: &BTreeSet<i64>,
        mut status: ResourceStatus,
    ) -> Result<ResourceStatus> {
        let created = self.client.create_alert(definition).await?;
        for service_id in desired {
            self.client.associate_service(created.id, *service_id).await?;
        }
        let alert = self.client.retrieve_alert(created.id).await?;

        status.id = alert.id;
        status.updated_at = alert.updated_at.unwrap_or_default();
        status.hashes.appoptics = byte_hash(&alert)?;
        info!("Created alert '{}' with id {}", alert.name, alert.id);
        Ok(status)
    }

    /// Make the associated services of an alert equal to `desired`
    async fn reassociate(
        &self,
        alert_id: i64,
        current: &BTreeSet<i64>,
        desired: &BTreeSet<i64>,
    ) -> Result<()> {
        for service_id in current.difference(desired) {
            self.client.disassociate_service(alert_id, *service_id).await?;
        }
        for service_id in desired.difference(current) {
            self.client.associate_service(alert_id, *service_id).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<C: AppOpticsApi> KindSync for Alerts<'_, C> {
    async fn sync(
        &self,
        spec: &ResourceSpec,
        mut status: ResourceStatus,
        spec_changed: bool,
    ) -> Result<ResourceStatus> {
        let mut definition: AlertDefinition = parse(ResourceKind::Alert, &spec.data)?;
        definition.id = None;
        let desired = self.resolve(&definition.take_service_names());

        if status.id == 0 {
            return self.create(&definition, &desired, status).await;
        }

        let current = match self.client.retrieve_alert(status.id).await {
            Ok(current) => current,
            Err(e) if e.is_not_found() => {
                warn!(
                    "Alert {} no longer exists in AppOptics, creating it again",
                    status.id
                );
                return self.create(&definition, &desired, status).await;
            }
            Err(e) => return Err(e.into()),
        };

        let associated = current.service_ids();
        let remote_changed = current.updated_at.unwrap_or_default() != status.updated_at;
        if !(remote_changed || spec_changed || associated != desired) {
            return Ok(status);
        }
        debug!(
            remote_changed,
            spec_changed,
            "Updating alert {}",
            status.id
        );

        definition.id = Some(status.id);
        self.client.update_alert(status.id, &definition).await?;
        self.reassociate(status.id, &associated, &desired).await?;

        let updated = self.client.retrieve_alert(status.id).await?;
        status.updated_at = updated.updated_at.unwrap_or_default();
        status.hashes.appoptics = byte_hash(&updated)?;
        info!("Updated alert '{}' ({})", updated.name, status.id);
        Ok(status)
    }

    async fn remove(&self, id: i64) -> remote::Result<()> {
        self.client.delete_alert(id).await
    }
}
