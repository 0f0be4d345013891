// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resource definitions and remote object shapes.

pub mod remote;
pub mod resource;

pub use resource::{
    AppOpticsAlert, AppOpticsDashboard, AppOpticsService, Hashes, ManagedResource, ResourceKind,
    ResourceSpec, ResourceStatus,
};
