// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Idempotent synchronization of managed resources with AppOptics.
//!
//! Each kind implements [`KindSync`]; [`Synchronizer`] picks the implementation for a
//! [`ResourceKind`] and takes care of the spec hash shared by all of them.

mod alerts;
mod services;
mod spaces;

use crate::error::{OperatorError, Result};
use crate::remote::{self, AppOpticsApi};
use crate::types::{ResourceKind, ResourceSpec, ResourceStatus};
use alerts::Alerts;
use async_trait::async_trait;
use k8s_openapi::ByteString;
use serde::de::DeserializeOwned;
use serde::Serialize;
use services::Services;
use sha2::{Digest, Sha256};
use spaces::Spaces;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Sha256 over the JSON serialization of `value`.
///
/// Object keys are emitted in sorted order, so equal values always hash equally.
pub fn hash<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let bytes = serde_json::to_vec(value)?;
    Ok(Sha256::digest(&bytes).to_vec())
}

pub(crate) fn byte_hash<T: Serialize + ?Sized>(value: &T) -> Result<Option<ByteString>> {
    Ok(Some(ByteString(hash(value)?)))
}

/// Parse a `data` document, YAML or JSON
pub(crate) fn parse<T: DeserializeOwned>(kind: ResourceKind, data: &str) -> Result<T> {
    serde_yaml::from_str(data).map_err(|e| OperatorError::InvalidSpec {
        kind,
        reason: e.to_string(),
    })
}

/// Resolves a Service resource name to its remote id.
pub trait ServiceLookup: Send + Sync {
    /// `None` when the resource is unknown or was never created remotely
    fn remote_id(&self, name: &str) -> Option<i64>;
}

impl ServiceLookup for BTreeMap<String, i64> {
    fn remote_id(&self, name: &str) -> Option<i64> {
        self.get(name).copied().filter(|id| *id != 0)
    }
}

/// Sync and removal of one remote object kind.
#[async_trait]
pub trait KindSync: Send + Sync {
    /// Bring the remote object in line with `spec` and return the updated status.
    ///
    /// `spec_changed` tells whether `spec` differs from the last one applied.
    async fn sync(
        &self,
        spec: &ResourceSpec,
        status: ResourceStatus,
        spec_changed: bool,
    ) -> Result<ResourceStatus>;

    async fn remove(&self, id: i64) -> remote::Result<()>;
}

pub struct Synchronizer<C> {
    client: C,
}

impl<C: AppOpticsApi> Synchronizer<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    fn for_kind<'a>(
        &'a self,
        kind: ResourceKind,
        services: &'a dyn ServiceLookup,
    ) -> Box<dyn KindSync + 'a> {
        match kind {
            ResourceKind::Dashboard => Box::new(Spaces::new(&self.client)),
            ResourceKind::Service => Box::new(Services::new(&self.client)),
            ResourceKind::Alert => Box::new(Alerts::new(&self.client, services)),
        }
    }

    /// Sync one resource. The spec hash is only recorded once the remote side accepted it.
    #[instrument(skip_all, fields(kind = %kind, remote_id = status.id))]
    pub async fn sync(
        &self,
        kind: ResourceKind,
        spec: &ResourceSpec,
        status: ResourceStatus,
        services: &dyn ServiceLookup,
    ) -> Result<ResourceStatus> {
        let spec_hash = hash(spec)?;
        let spec_changed = !status.hashes.spec_matches(&spec_hash);
        debug!(spec_changed, "Syncing");

        let mut status = self
            .for_kind(kind, services)
            .sync(spec, status, spec_changed)
            .await?;
        status.hashes.spec = Some(ByteString(spec_hash));
        Ok(status)
    }

    /// Delete the remote object; an id of 0 or an already deleted object is fine.
    #[instrument(skip(self))]
    pub async fn remove(&self, kind: ResourceKind, id: i64) -> Result<()> {
        if id == 0 {
            debug!("Nothing to remove, {} was never created remotely", kind);
            return Ok(());
        }
        let no_services: BTreeMap<String, i64> = BTreeMap::new();
        let result = self.for_kind(kind, &no_services).remove(id).await;
        match result {
            Ok(()) => {
                info!("Removed {} {} from AppOptics", kind, id);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                info!("{} {} was already gone from AppOptics", kind, id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
