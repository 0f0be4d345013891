// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The three AppOptics custom resources and the status they share.

use crate::constants::FINALIZER;
use chrono::{DateTime, FixedOffset, Utc};
use k8s_openapi::{ByteString, NamespaceResourceScope};
use kube::{CustomResource, Resource, ResourceExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// The kind of a managed resource, used to route a queue key to its cache and synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Dashboard,
    Service,
    Alert,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Dashboard,
        ResourceKind::Service,
        ResourceKind::Alert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Dashboard => "Dashboard",
            ResourceKind::Service => "Service",
            ResourceKind::Alert => "Alert",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown resource kind '{}'", s))
    }
}

/// The spec fields every managed resource carries.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ResourceSpec {
    pub namespace: String,
    /// YAML or JSON document describing the remote object
    pub data: String,
    /// Name of the Secret holding the API token
    pub secret: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    /// Remote identifier, 0 while the remote object is not known to exist
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: i64,
    #[serde(rename = "Hashes", default)]
    pub hashes: Hashes,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub updated_at: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
pub struct Hashes {
    /// Hash of the last spec applied remotely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub spec: Option<ByteString>,
    /// Hash of the remote object as last observed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub appoptics: Option<ByteString>,
}

impl Hashes {
    pub fn spec_matches(&self, hash: &[u8]) -> bool {
        self.spec.as_ref().is_some_and(|h| h.0 == hash)
    }

    pub fn remote_matches(&self, hash: &[u8]) -> bool {
        self.appoptics.as_ref().is_some_and(|h| h.0 == hash)
    }
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

impl ResourceStatus {
    /// Parse `lastUpdated`, ignoring values not in RFC 2822 format
    pub fn last_updated_at(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.last_updated.as_deref()?;
        match DateTime::parse_from_rfc2822(raw) {
            Ok(t) => Some(t),
            Err(e) => {
                warn!("lastUpdated '{}' is not in RFC 2822 format: {}", raw, e);
                None
            }
        }
    }

    /// Whether the last reconcile happened less than `interval` before `now`
    pub fn synced_within(&self, interval: Duration, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_updated_at() else {
            return false;
        };
        let elapsed = now.signed_duration_since(last);
        // A timestamp in the future counts as recent.
        elapsed
            .to_std()
            .map(|elapsed| elapsed < interval)
            .unwrap_or(true)
    }

    pub fn stamp(&mut self, now: DateTime<Utc>) {
        self.last_updated = Some(now.to_rfc2822());
    }
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "appoptics.io", version = "v1", kind = "AppOpticsDashboard")]
#[kube(namespaced, shortname = "aodashboard")]
#[kube(status = "ResourceStatus")]
pub struct DashboardSpec {
    #[serde(default)]
    pub namespace: String,
    pub data: String,
    pub secret: String,
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "appoptics.io", version = "v1", kind = "AppOpticsService")]
#[kube(namespaced, shortname = "aoservice")]
#[kube(status = "ResourceStatus")]
pub struct ServiceSpec {
    #[serde(default)]
    pub namespace: String,
    pub data: String,
    pub secret: String,
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "appoptics.io", version = "v1", kind = "AppOpticsAlert")]
#[kube(namespaced, shortname = "aoalert")]
#[kube(status = "ResourceStatus")]
pub struct AlertSpec {
    #[serde(default)]
    pub namespace: String,
    pub data: String,
    pub secret: String,
}

/// Access to what the reconciler needs from any of the three kinds.
pub trait ManagedResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    const KIND: ResourceKind;

    fn spec_fields(&self) -> ResourceSpec;
    fn status(&self) -> Option<&ResourceStatus>;
    fn set_status(&mut self, status: ResourceStatus);

    fn has_finalizer(&self) -> bool {
        self.finalizers().iter().any(|f| f == FINALIZER)
    }

    /// Returns true when the finalizer was added
    fn add_finalizer(&mut self) -> bool {
        if self.has_finalizer() {
            return false;
        }
        self.finalizers_mut().push(FINALIZER.to_string());
        true
    }

    /// Returns true when the finalizer was present
    fn remove_finalizer(&mut self) -> bool {
        let finalizers = self.finalizers_mut();
        let before = finalizers.len();
        finalizers.retain(|f| f != FINALIZER);
        finalizers.len() != before
    }

    fn is_deleting(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }
}

macro_rules! impl_managed_resource {
    ($resource:ty, $kind:expr) => {
        impl ManagedResource for $resource {
            const KIND: ResourceKind = $kind;

            fn spec_fields(&self) -> ResourceSpec {
                ResourceSpec {
                    namespace: self.spec.namespace.clone(),
                    data: self.spec.data.clone(),
                    secret: self.spec.secret.clone(),
                }
            }

            fn status(&self) -> Option<&ResourceStatus> {
                self.status.as_ref()
            }

            fn set_status(&mut self, status: ResourceStatus) {
                self.status = Some(status);
            }
        }
    };
}

impl_managed_resource!(AppOpticsDashboard, ResourceKind::Dashboard);
impl_managed_resource!(AppOpticsService, ResourceKind::Service);
impl_managed_resource!(AppOpticsAlert, ResourceKind::Alert);
