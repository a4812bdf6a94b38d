// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `bakctl`, the central backup controller.

use bakd_controller::watcher::SseSpecStream;
use bakd_controller::{env, ClusterState, HttpDaemonClient, Watcher};
use bakd_storage::RecordStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = match RecordStore::new(env::data_dir()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(error = %e, "fail to initialize record store");
            std::process::exit(1);
        }
    };

    let client = Arc::new(HttpDaemonClient::new(env::daemon_port()));
    let state = ClusterState::shared();
    let watcher = Arc::new(Watcher::new(
        SseSpecStream::new(env::discovery_url()),
        client,
        state,
        env::advertise_url(),
    ));

    // The RPC transport mounts api::RecordApi::new(&store) and the
    // fan-out handlers on /api/v2 here.
    tracing::info!(discovery = %env::discovery_url(), "controller starting");

    let watch = {
        let watcher = Arc::clone(&watcher);
        tokio::spawn(async move { watcher.run().await })
    };
    let liveness = {
        let watcher = Arc::clone(&watcher);
        tokio::spawn(async move { watcher.run_liveness().await })
    };

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("got exit signal"),
        Err(e) => tracing::error!(error = %e, "fail to listen for signals"),
    }

    watch.abort();
    liveness.abort();
    store.release();
    tracing::info!("exit");
}
