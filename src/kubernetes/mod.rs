// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes plumbing: CRD discovery, watches and caches, and writes back to the API.

pub mod crd;
pub mod watch;
pub mod writer;

pub use crd::wait_for_crds;
pub use watch::{resync, Cached, Caches, NamespacedServices, WatchSource};
pub use writer::{ApiWriter, KubeApi, ResourceEvent, SecretReader};
