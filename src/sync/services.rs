// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use super::{byte_hash, parse, KindSync};
use crate::error::Result;
use crate::remote::{self, AppOpticsApi, RemoteError};
use crate::types::remote::RemoteService;
use crate::types::{ResourceKind, ResourceSpec, ResourceStatus};
use async_trait::async_trait;
use tracing::{info, warn};

/// Notification services, compared field by field rather than by hash
pub(super) struct Services<'a, C> {
    client: &'a C,
}

impl<'a, C: AppOpticsApi> Services<'a, C> {
    pub(super) fn new(client: &'a C) -> Self {
        Self { client }
    }

    async fn create(&self, desired: &RemoteService, mut status: ResourceStatus) -> Result<ResourceStatus> {
        let created = self.client.create_service(desired).await?;
        status.id = created.id.ok_or(RemoteError::MissingId { path: "services" })?;
        status.hashes.appoptics = byte_hash(&created)?;
        info!("Created service '{}' with id {}", desired.title, status.id);
        Ok(status)
    }
}

#[async_trait]
impl<C: AppOpticsApi> KindSync for Services<'_, C> {
    async fn sync(
        &self,
        spec: &ResourceSpec,
        mut status: ResourceStatus,
        _spec_changed: bool,
    ) -> Result<ResourceStatus> {
        let mut desired: RemoteService = parse(ResourceKind::Service, &spec.data)?;
        desired.id = None;

        if status.id == 0 {
            return self.create(&desired, status).await;
        }

        let current = match self.client.retrieve_service(status.id).await {
            Ok(current) => current,
            Err(e) if e.is_not_found() => {
                warn!(
                    "Service {} no longer exists in AppOptics, creating it again",
                    status.id
                );
                return self.create(&desired, status).await;
            }
            Err(e) => return Err(e.into()),
        };

        if !desired.same_definition(&current) {
            self.client.update_service(status.id, &desired).await?;
            let updated = self.client.retrieve_service(status.id).await?;
            status.hashes.appoptics = byte_hash(&updated)?;
            info!("Updated service '{}' ({})", desired.title, status.id);
        }
        Ok(status)
    }

    async fn remove(&self, id: i64) -> remote::Result<()> {
        self.client.delete_service(id).await
    }
}
