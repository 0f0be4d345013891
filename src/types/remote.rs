// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Objects as the AppOptics API sends and receives them, and the documents
//! embedded in a resource's `data` field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// A space, the remote side of a dashboard
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Space {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
}

/// A chart inside a space.
///
/// Only the fields the operator touches are typed, everything else
/// (streams, thresholds, min/max, ...) is carried through untouched.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Chart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// The `data` document of a dashboard: a space plus the charts it must contain, in order
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct DashboardDocument {
    pub name: String,
    #[serde(default)]
    pub charts: Vec<Chart>,
}

/// A notification service
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RemoteService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "type", default)]
    pub service_type: String,
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default)]
    pub title: String,
}

impl RemoteService {
    /// Compares the fields a user controls, ignoring the identifier
    pub fn same_definition(&self, other: &RemoteService) -> bool {
        self.service_type == other.service_type
            && self.title == other.title
            && self.settings == other.settings
    }
}

/// An alert definition as sent on create and update.
///
/// Notification services are never part of the body, they are attached through
/// the association endpoints.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct AlertDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rearm_seconds: Option<i64>,
}

impl AlertDefinition {
    /// Removes `attributes.services` and returns the service names it listed.
    ///
    /// Non-string entries are skipped.
    pub fn take_service_names(&mut self) -> Vec<String> {
        match self.attributes.remove("services") {
            Some(Value::Array(names)) => names
                .into_iter()
                .filter_map(|n| match n {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            Some(Value::String(name)) => vec![name],
            _ => Vec::new(),
        }
    }
}

/// An alert as returned by the API
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Alert {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Value>,
    #[serde(default)]
    pub services: Vec<RemoteService>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rearm_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Alert {
    pub fn service_ids(&self) -> BTreeSet<i64> {
        self.services.iter().filter_map(|s| s.id).collect()
    }
}
