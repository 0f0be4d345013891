// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconciler - turns one queue key into a persisted state transition of one resource.

use crate::constants::reasons::{DELETED, ERR_UPDATE_STATUS, INVALID_SPEC, SUCCESS_UPDATE, SYNC_FAILED};
use crate::constants::TOKEN_KEY;
use crate::dispatcher::{Reconcile, ReconcileKey};
use crate::error::{OperatorError, Result};
use crate::kubernetes::{ApiWriter, Cached, Caches, ResourceEvent, SecretReader};
use crate::remote::{AppOpticsApi, ClientFactory, RemoteConfig};
use crate::sync::Synchronizer;
use crate::types::{
    AppOpticsAlert, AppOpticsDashboard, AppOpticsService, ResourceKind, ResourceStatus,
};
use async_trait::async_trait;
use chrono::Utc;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

pub struct Reconciler<W, F> {
    caches: Caches,
    writer: Arc<W>,
    clients: F,
    base_url: Url,
    resync_interval: Duration,
}

impl<W, F> Reconciler<W, F>
where
    W: ApiWriter + SecretReader,
    F: ClientFactory,
{
    pub fn new(
        caches: Caches,
        writer: Arc<W>,
        clients: F,
        base_url: Url,
        resync_interval: Duration,
    ) -> Self {
        Self {
            caches,
            writer,
            clients,
            base_url,
            resync_interval,
        }
    }

    /// Read the API token from the resource's secret
    async fn token(&self, namespace: &str, secret: &str) -> Result<String> {
        let data = self.writer.secret_data(namespace, secret).await?;
        data.get(TOKEN_KEY)
            .map(|token| String::from_utf8_lossy(&token.0).trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| OperatorError::MissingToken {
                namespace: namespace.to_string(),
                secret: secret.to_string(),
                key: TOKEN_KEY,
            })
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn reconcile_kind<K: Cached>(&self, key: &ReconcileKey) -> Result<()> {
        let Some(cached) = self.caches.get::<K>(&key.namespace, &key.name) else {
            debug!("Not in cache, assuming it was deleted");
            return Ok(());
        };

        let now = Utc::now();
        let mut status = cached.status().cloned().unwrap_or_default();
        if status.synced_within(self.resync_interval, now) {
            debug!("Synced less than {:?} ago, skipping", self.resync_interval);
            return Ok(());
        }
        if cached.is_deleting() && !cached.has_finalizer() {
            debug!("Being deleted and no remote cleanup is owed");
            return Ok(());
        }
        status.stamp(now);

        let spec = cached.spec_fields();
        let token = self.token(&key.namespace, &spec.secret).await?;
        let synchronizer = Synchronizer::new(
            self.clients
                .client(RemoteConfig::new(self.base_url.clone(), token)),
        );
        let obj = (*cached).clone();

        if obj.is_deleting() {
            return self.finalize(obj, &status, &synchronizer).await;
        }

        let mut obj = obj;
        obj.add_finalizer();
        let services = self.caches.services_in(&key.namespace);
        let synced = match synchronizer.sync(K::KIND, &spec, status, &services).await {
            Ok(synced) => synced,
            Err(e) => {
                let reason = match &e {
                    OperatorError::InvalidSpec { .. } => INVALID_SPEC,
                    _ => SYNC_FAILED,
                };
                self.writer
                    .record(&obj, ResourceEvent::warning(reason, e.to_string()))
                    .await;
                return Err(e);
            }
        };

        match self.persist(&obj, synced).await {
            Ok(stored) => {
                self.writer
                    .record(
                        &stored,
                        ResourceEvent::normal(
                            SUCCESS_UPDATE,
                            format!("Updated resource {}", stored.name_any()),
                        ),
                    )
                    .await;
                Ok(())
            }
            Err(e) => {
                self.writer
                    .record(&obj, ResourceEvent::warning(ERR_UPDATE_STATUS, e.to_string()))
                    .await;
                Err(e)
            }
        }
    }

    /// Write finalizers, then the status on top of the version that write returned
    async fn persist<K: Cached>(&self, obj: &K, status: ResourceStatus) -> Result<K> {
        let mut stored = self.writer.replace(obj).await?;
        stored.set_status(status);
        self.writer.replace_status(&stored).await
    }

    /// Remove the remote object, then release the finalizer
    async fn finalize<K: Cached, C: AppOpticsApi>(
        &self,
        mut obj: K,
        status: &ResourceStatus,
        synchronizer: &Synchronizer<C>,
    ) -> Result<()> {
        if let Err(e) = synchronizer.remove(K::KIND, status.id).await {
            self.writer
                .record(&obj, ResourceEvent::warning(SYNC_FAILED, e.to_string()))
                .await;
            return Err(e);
        }

        obj.remove_finalizer();
        let stored = self.writer.replace(&obj).await?;
        info!("Released finalizer of {} '{}'", K::KIND, stored.name_any());
        self.writer
            .record(
                &stored,
                ResourceEvent::normal(
                    DELETED,
                    format!("Removed {} {} from AppOptics", K::KIND, status.id),
                ),
            )
            .await;
        Ok(())
    }
}

#[async_trait]
impl<W, F> Reconcile for Reconciler<W, F>
where
    W: ApiWriter + SecretReader,
    F: ClientFactory,
{
    async fn reconcile(&self, key: &ReconcileKey) -> Result<()> {
        match key.kind {
            ResourceKind::Dashboard => self.reconcile_kind::<AppOpticsDashboard>(key).await,
            ResourceKind::Service => self.reconcile_kind::<AppOpticsService>(key).await,
            ResourceKind::Alert => self.reconcile_kind::<AppOpticsAlert>(key).await,
        }
    }
}
