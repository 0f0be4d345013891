// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Watch streams feeding the work queue, and the read caches they maintain.

use crate::dispatcher::ReconcileKey;
use crate::queue::WorkQueue;
use crate::sync::ServiceLookup;
use crate::types::{AppOpticsAlert, AppOpticsDashboard, AppOpticsService, ManagedResource};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use kube::{Api, Client};
use kube_runtime::reflector::{self, ObjectRef, Store};
use kube_runtime::watcher::{watcher, Config as WatcherConfig};
use kube_runtime::WatchStreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Read-only caches of the three managed kinds
#[derive(Clone)]
pub struct Caches {
    pub dashboards: Store<AppOpticsDashboard>,
    pub services: Store<AppOpticsService>,
    pub alerts: Store<AppOpticsAlert>,
}

/// A managed kind with a cache in [`Caches`]
pub trait Cached: ManagedResource {
    fn store(caches: &Caches) -> &Store<Self>;
}

impl Cached for AppOpticsDashboard {
    fn store(caches: &Caches) -> &Store<Self> {
        &caches.dashboards
    }
}

impl Cached for AppOpticsService {
    fn store(caches: &Caches) -> &Store<Self> {
        &caches.services
    }
}

impl Cached for AppOpticsAlert {
    fn store(caches: &Caches) -> &Store<Self> {
        &caches.alerts
    }
}

impl Caches {
    pub fn get<K: Cached>(&self, namespace: &str, name: &str) -> Option<Arc<K>> {
        K::store(self).get(&ObjectRef::new(name).within(namespace))
    }

    /// Wait until every watch delivered its initial listing
    pub async fn wait_until_ready(&self) -> anyhow::Result<()> {
        self.dashboards.wait_until_ready().await?;
        self.services.wait_until_ready().await?;
        self.alerts.wait_until_ready().await?;
        Ok(())
    }

    /// Queue keys of every cached object
    pub fn keys(&self) -> Vec<String> {
        fn keys_of<K: ManagedResource>(store: &Store<K>) -> impl Iterator<Item = String> + '_ {
            store
                .state()
                .into_iter()
                .map(|obj| ReconcileKey::for_object(obj.as_ref()).to_string())
        }
        keys_of(&self.dashboards)
            .chain(keys_of(&self.services))
            .chain(keys_of(&self.alerts))
            .collect()
    }

    /// Service lookup scoped to one namespace
    pub fn services_in<'a>(&'a self, namespace: &'a str) -> NamespacedServices<'a> {
        NamespacedServices {
            store: &self.services,
            namespace,
        }
    }
}

/// Resolves Service resource names within one namespace through the cache
pub struct NamespacedServices<'a> {
    store: &'a Store<AppOpticsService>,
    namespace: &'a str,
}

impl ServiceLookup for NamespacedServices<'_> {
    fn remote_id(&self, name: &str) -> Option<i64> {
        self.store
            .get(&ObjectRef::new(name).within(self.namespace))
            .and_then(|service| service.status.as_ref().map(|status| status.id))
            .filter(|id| *id != 0)
    }
}

/// Watches the managed kinds in one namespace, or cluster-wide.
pub struct WatchSource {
    client: Client,
    namespace: Option<String>,
}

impl WatchSource {
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        Self { client, namespace }
    }

    fn api<K: ManagedResource>(&self) -> Api<K> {
        match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    /// Start the watches. Every applied object is enqueued.
    ///
    /// The caches only fill while the returned future is polled.
    pub fn start(&self, queue: Arc<WorkQueue<String>>) -> (Caches, BoxFuture<'static, ()>) {
        let (dashboards, watch_dashboards) = self.watch::<AppOpticsDashboard>(queue.clone());
        let (services, watch_services) = self.watch::<AppOpticsService>(queue.clone());
        let (alerts, watch_alerts) = self.watch::<AppOpticsAlert>(queue);

        let driver = async move {
            futures::join!(watch_dashboards, watch_services, watch_alerts);
        }
        .boxed();

        (
            Caches {
                dashboards,
                services,
                alerts,
            },
            driver,
        )
    }

    fn watch<K: ManagedResource>(
        &self,
        queue: Arc<WorkQueue<String>>,
    ) -> (Store<K>, BoxFuture<'static, ()>) {
        let (reader, writer) = reflector::store();
        let mut stream = watcher(self.api::<K>(), WatcherConfig::default())
            .default_backoff()
            .reflect(writer)
            .applied_objects()
            .boxed();

        let driver = async move {
            info!("Watching {} resources", K::KIND);
            while let Some(event) = stream.next().await {
                match event {
                    Ok(obj) => {
                        let key = ReconcileKey::for_object(&obj).to_string();
                        debug!("Enqueueing '{}'", key);
                        queue.add(key);
                    }
                    Err(e) => warn!("{} watch failed: {}", K::KIND, e),
                }
            }
        }
        .boxed();

        (reader, driver)
    }
}

/// Re-enqueue every cached object each `period` until the queue shuts down
pub async fn resync(caches: Caches, queue: Arc<WorkQueue<String>>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately; the watches just enqueued everything.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if queue.is_shutting_down() {
            break;
        }
        let keys = caches.keys();
        debug!("Resync of {} resources", keys.len());
        for key in keys {
            queue.add(key);
        }
    }
}
