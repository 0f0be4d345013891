// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Everything the reconciler writes to (or reads beside the caches from) the cluster.

use crate::constants::OPERATOR_NAME;
use crate::error::Result;
use crate::types::ManagedResource;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::PostParams;
use kube_runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Api, Client, ResourceExt};
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

/// An event to attach to a managed resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEvent {
    pub type_: EventType,
    pub reason: &'static str,
    pub note: String,
}

impl ResourceEvent {
    pub fn normal(reason: &'static str, note: impl Into<String>) -> Self {
        Self {
            type_: EventType::Normal,
            reason,
            note: note.into(),
        }
    }

    pub fn warning(reason: &'static str, note: impl Into<String>) -> Self {
        Self {
            type_: EventType::Warning,
            reason,
            note: note.into(),
        }
    }
}

/// Full-object writes of managed resources.
#[async_trait]
pub trait ApiWriter: Send + Sync {
    /// Replace the object (metadata and spec), returning the stored version
    async fn replace<K: ManagedResource>(&self, obj: &K) -> Result<K>;

    /// Replace the status subresource, returning the stored version
    async fn replace_status<K: ManagedResource>(&self, obj: &K) -> Result<K>;

    /// Attach an event to the object; failures are logged, never returned
    async fn record<K: ManagedResource>(&self, obj: &K, event: ResourceEvent);
}

#[async_trait]
pub trait SecretReader: Send + Sync {
    async fn secret_data(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, ByteString>>;
}

/// [`ApiWriter`] and [`SecretReader`] backed by the Kubernetes API
pub struct KubeApi {
    client: Client,
    recorder: Recorder,
}

impl KubeApi {
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: OPERATOR_NAME.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        let recorder = Recorder::new(client.clone(), reporter);
        Self { client, recorder }
    }

    fn api<K: ManagedResource>(&self, obj: &K) -> Api<K> {
        Api::namespaced(self.client.clone(), &obj.namespace().unwrap_or_default())
    }
}

#[async_trait]
impl ApiWriter for KubeApi {
    #[instrument(skip(self, obj), fields(name = %obj.name_any()))]
    async fn replace<K: ManagedResource>(&self, obj: &K) -> Result<K> {
        let updated = self
            .api(obj)
            .replace(&obj.name_any(), &PostParams::default(), obj)
            .await?;
        debug!(
            "Replaced object, resourceVersion {:?}",
            updated.resource_version()
        );
        Ok(updated)
    }

    #[instrument(skip(self, obj), fields(name = %obj.name_any()))]
    async fn replace_status<K: ManagedResource>(&self, obj: &K) -> Result<K> {
        let data = serde_json::to_vec(obj)?;
        let updated = self
            .api(obj)
            .replace_status(&obj.name_any(), &PostParams::default(), data)
            .await?;
        Ok(updated)
    }

    async fn record<K: ManagedResource>(&self, obj: &K, event: ResourceEvent) {
        let kube_event = Event {
            type_: event.type_,
            reason: event.reason.to_string(),
            note: Some(event.note),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&kube_event, &obj.object_ref(&())).await {
            warn!(
                "Failed to publish {} event for {}: {}",
                event.reason,
                obj.name_any(),
                e
            );
        }
    }
}

#[async_trait]
impl SecretReader for KubeApi {
    async fn secret_data(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, ByteString>> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = secrets.get(name).await?;
        Ok(secret.data.unwrap_or_default())
    }
}
