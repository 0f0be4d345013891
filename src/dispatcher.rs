// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Worker loops draining the work queue into the reconciler.

use crate::error::{OperatorError, Result};
use crate::queue::WorkQueue;
use crate::types::{ManagedResource, ResourceKind};
use async_trait::async_trait;
use kube::ResourceExt;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Queue key of one managed resource: `namespace/Kind/name`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReconcileKey {
    pub namespace: String,
    pub kind: ResourceKind,
    pub name: String,
}

impl ReconcileKey {
    pub fn for_object<K: ManagedResource>(obj: &K) -> Self {
        Self {
            namespace: obj.namespace().unwrap_or_default(),
            kind: K::KIND,
            name: obj.name_any(),
        }
    }
}

impl fmt::Display for ReconcileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.kind, self.name)
    }
}

impl FromStr for ReconcileKey {
    type Err = OperatorError;

    fn from_str(key: &str) -> Result<Self> {
        let invalid = || OperatorError::InvalidKey(key.to_string());
        let mut parts = key.split('/');
        let (Some(namespace), Some(kind), Some(name), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        if namespace.is_empty() || name.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            namespace: namespace.to_string(),
            kind: kind.parse().map_err(|_| invalid())?,
            name: name.to_string(),
        })
    }
}

/// One reconcile pass for one key.
#[async_trait]
pub trait Reconcile: Send + Sync {
    async fn reconcile(&self, key: &ReconcileKey) -> Result<()>;
}

/// What happened to a key after one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Synced,
    Requeued,
    Dropped,
}

pub struct Dispatcher<R> {
    queue: Arc<WorkQueue<String>>,
    reconciler: Arc<R>,
    workers: usize,
}

impl<R: Reconcile + 'static> Dispatcher<R> {
    pub fn new(queue: Arc<WorkQueue<String>>, reconciler: Arc<R>, workers: usize) -> Self {
        Self {
            queue,
            reconciler,
            workers: workers.max(1),
        }
    }

    /// Run the workers until `shutdown` resolves, then let in-flight passes finish
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            let queue = self.queue.clone();
            let reconciler = self.reconciler.clone();
            workers.spawn(async move { worker(id, queue, reconciler).await });
        }
        info!("Started {} workers", self.workers);

        shutdown.await;
        info!("Shutting down workers");
        self.queue.shut_down();

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!("Worker terminated abnormally: {}", e);
            }
        }
        info!("All workers stopped");
    }
}

async fn worker<R: Reconcile>(id: usize, queue: Arc<WorkQueue<String>>, reconciler: Arc<R>) {
    debug!(worker = id, "Worker started");
    while let Some(key) = queue.get().await {
        process(&queue, reconciler.as_ref(), &key).await;
        queue.done(&key);
    }
    debug!(worker = id, "Worker stopped");
}

/// Reconcile one key and apply the retry policy to the result
pub async fn process<R: Reconcile + ?Sized>(
    queue: &Arc<WorkQueue<String>>,
    reconciler: &R,
    key: &String,
) -> Outcome {
    let parsed = match key.parse::<ReconcileKey>() {
        Ok(parsed) => parsed,
        Err(e) => {
            queue.forget(key);
            error!("{}", e);
            return Outcome::Dropped;
        }
    };

    match reconciler.reconcile(&parsed).await {
        Ok(()) => {
            queue.forget(key);
            info!("Successfully synced '{}'", key);
            Outcome::Synced
        }
        Err(e) if !e.is_retryable() => {
            queue.forget(key);
            warn!("error syncing '{}': {}, not retrying until it changes", key, e);
            Outcome::Dropped
        }
        Err(e) => {
            queue.add_rate_limited(key.clone());
            error!("error syncing '{}': {}, requeuing", key, e);
            Outcome::Requeued
        }
    }
}
