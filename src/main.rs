// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use kube::{Client, CustomResourceExt};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use appoptics_operator::config::Config;
use appoptics_operator::dispatcher::Dispatcher;
use appoptics_operator::kubernetes::{resync, wait_for_crds, KubeApi, WatchSource};
use appoptics_operator::queue::{ExponentialBackoff, WorkQueue};
use appoptics_operator::reconcilers::Reconciler;
use appoptics_operator::remote::HttpClientFactory;
use appoptics_operator::types::{AppOpticsAlert, AppOpticsDashboard, AppOpticsService};

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args().nth(1).as_deref() == Some("crdgen") {
        return print_crds();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting AppOptics operator");

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: namespace={}, resync={:?}, workers={}",
        config.namespace.as_deref().unwrap_or("*"),
        config.resync_interval,
        config.workers
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    info!("Waiting for AppOptics CRDs to become available...");
    wait_for_crds(&client).await?;

    let clients = HttpClientFactory::new(config.request_timeout)
        .context("Failed to build the AppOptics HTTP client")?;
    let queue = Arc::new(WorkQueue::new(ExponentialBackoff::default()));

    let (caches, watches) = WatchSource::new(client.clone(), config.namespace.clone())
        .start(queue.clone());
    let watches = tokio::spawn(watches);

    info!("Waiting for caches to sync...");
    caches.wait_until_ready().await?;
    tokio::spawn(resync(caches.clone(), queue.clone(), config.resync_interval));

    let reconciler = Reconciler::new(
        caches,
        Arc::new(KubeApi::new(client)),
        clients,
        config.appoptics_url.clone(),
        config.resync_interval,
    );
    Dispatcher::new(queue, Arc::new(reconciler), config.workers)
        .run(shutdown_signal())
        .await;

    watches.abort();
    info!("AppOptics operator stopped");
    Ok(())
}

fn print_crds() -> Result<()> {
    for crd in [
        AppOpticsDashboard::crd(),
        AppOpticsService::crd(),
        AppOpticsAlert::crd(),
    ] {
        print!("---\n{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
