// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `bakd`, the per-node backup daemon.

use bakd_core::SystemClock;
use bakd_daemon::backup::{register_tasks, BackupContext, NsenterExec};
use bakd_daemon::engine::{Engine, HttpPoster, NotifySinks};
use bakd_daemon::{env, DaemonContext};
use bakd_storage::{FsDriver, Meta, MetaError};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match env::log_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "bakd.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

#[tokio::main]
async fn main() {
    let _log_guard = init_tracing();
    let clock = SystemClock;
    let node_ip = env::node_ip();

    tracing::info!(%node_ip, root = %env::driver_root().display(), "initializing storage driver");
    let driver: Arc<dyn bakd_storage::Driver> = match FsDriver::new(env::driver_root()).await {
        Ok(d) => Arc::new(d),
        Err(e) => {
            tracing::error!(error = %e, "fail to initialize storage driver");
            std::process::exit(1);
        }
    };

    let meta = Arc::new(Meta::new(Arc::clone(&driver), node_ip.clone()));
    match meta.load_from_backend().await {
        Ok(()) => {}
        Err(e @ MetaError::Corrupt { .. }) => {
            // Unrecoverable without operator intervention.
            tracing::error!(error = %e, "corrupt meta file, repair it by hand");
            std::process::exit(1);
        }
        Err(e) => tracing::warn!(error = %e, "fail to load meta data"),
    }

    let notify = NotifySinks::new(Arc::new(HttpPoster::new()));
    let engine = Engine::new(clock, Arc::clone(&notify));
    let backup_ctx =
        BackupContext::new(driver, meta, Arc::new(NsenterExec), node_ip.clone(), clock);
    if let Err(e) = register_tasks(&engine, Arc::clone(&backup_ctx)) {
        tracing::error!(error = %e, "fail to register backup tasks");
        std::process::exit(1);
    }

    tracing::info!("starting scheduler");
    engine.start();
    let ticker = engine.spawn_ticker();

    let ctx = Arc::new(DaemonContext::new(engine, backup_ctx, notify, clock));
    // The RPC transport mounts api::Api::new(ctx) on /api/v1 here.
    let api = bakd_daemon::api::Api::new(Arc::clone(&ctx));
    tracing::info!(jobs = api.count(), "daemon ready");

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("got exit signal"),
        Err(e) => tracing::error!(error = %e, "fail to listen for signals"),
    }

    tracing::info!("stop scheduler");
    ctx.engine.stop();
    ticker.abort();

    tracing::info!("release backup data");
    // Taking the stop-lock lets an in-flight meta sync finish.
    let _stop = ctx.backup.meta.stop_lock().lock_owned().await;

    while ctx.engine.running_count() > 0 {
        tracing::debug!(running = ctx.engine.running_count(), "tasks still running, wait");
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    tracing::info!("exit");
}
