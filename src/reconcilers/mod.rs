// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconciliation of the managed AppOptics resources.

pub mod resource;

pub use resource::Reconciler;
