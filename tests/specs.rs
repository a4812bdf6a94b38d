// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level scenarios wiring controller, daemon, and storage
//! together through their public surfaces.

use async_trait::async_trait;
use bakd_controller::api::RecordApi;
use bakd_controller::client::fake::FakeDaemonClient;
use bakd_controller::{AppController, ClusterState, Watcher};
use bakd_core::{FakeClock, JobRecord, RecordState};
use bakd_daemon::api::Api;
use bakd_daemon::backup::{register_tasks, BackupContext, NsenterExec};
use bakd_daemon::engine::{Engine, NotifyError, NotifySinks, RecordPoster};
use bakd_daemon::DaemonContext;
use bakd_storage::{Driver, FsDriver, Meta, RecordStore};
use bakd_wire::JobsUpdate;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const NODE: &str = "10.0.0.1";

/// Record sink capturing everything a daemon would POST.
#[derive(Default)]
struct CapturePoster {
    records: Mutex<Vec<JobRecord>>,
}

impl CapturePoster {
    fn terminal_for(&self, rid: &str) -> Option<JobRecord> {
        self.records.lock().iter().find(|r| r.rid == rid && r.state.is_terminal()).cloned()
    }
}

#[async_trait]
impl RecordPoster for CapturePoster {
    async fn post(&self, _addr: &str, record: &JobRecord) -> Result<(), NotifyError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

struct Daemon {
    dir: TempDir,
    ctx: Arc<DaemonContext<FakeClock>>,
    api: Api<FakeClock>,
    clock: FakeClock,
    poster: Arc<CapturePoster>,
}

async fn daemon() -> Daemon {
    let dir = TempDir::new().unwrap();
    let driver: Arc<dyn Driver> = Arc::new(FsDriver::new(dir.path().join("mount")).await.unwrap());
    let meta = Arc::new(Meta::new(Arc::clone(&driver), NODE));
    let clock = FakeClock::new();
    let poster = Arc::new(CapturePoster::default());
    let notify = NotifySinks::new(Arc::clone(&poster) as Arc<dyn RecordPoster>);
    notify.add("http://controller/api/v2/system/notify");
    let engine = Engine::new(clock.clone(), Arc::clone(&notify));
    let backup = BackupContext::new(driver, meta, Arc::new(NsenterExec), NODE, clock.clone());
    register_tasks(&engine, Arc::clone(&backup)).unwrap();
    engine.start();
    let ctx = Arc::new(DaemonContext::new(engine, backup, notify, clock.clone()));
    let api = Api::new(Arc::clone(&ctx));
    Daemon { dir, ctx, api, clock, poster }
}

async fn wait_terminal(poster: &CapturePoster, rid: &str) -> JobRecord {
    for _ in 0..2000 {
        if let Some(record) = poster.terminal_for(rid) {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no terminal record for {rid}");
}

fn seed_tree(dir: &TempDir) -> std::path::PathBuf {
    let src = dir.path().join("volumes/vol");
    std::fs::create_dir_all(src.join("nested")).unwrap();
    std::fs::write(src.join("alpha.txt"), "alpha").unwrap();
    std::fs::write(src.join("nested/beta.txt"), "beta").unwrap();
    src
}

#[tokio::test]
async fn scheduled_backup_produces_a_success_record() {
    let daemon = daemon().await;
    let src = seed_tree(&daemon.dir);

    let job = json!([{
        "id": "",
        "spec": "* * * * * *",
        "action": "backup",
        "args": {"path": src.to_string_lossy(), "archive": "spec-vol", "app": "a"},
        "type": "cron",
        "sleep": false,
    }]);
    let update = JobsUpdate { data: serde_json::from_value(job).unwrap(), version: "v1".into() };
    assert!(daemon.api.set_jobs(update).await.unwrap());
    assert_eq!(daemon.api.count(), 1);

    daemon.clock.advance(chrono::Duration::seconds(1));
    assert_eq!(daemon.ctx.engine.tick(), 1);

    let rid = loop {
        let records = daemon.poster.records.lock().clone();
        if let Some(first) = records.first() {
            break first.rid.clone();
        }
        drop(records);
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    let terminal = wait_terminal(&daemon.poster, &rid).await;
    assert_eq!(terminal.state, RecordState::Success);
    assert!(terminal.result.as_ref().unwrap()["size"].as_u64().unwrap() > 0);

    // The archive landed in the node's namespace.
    assert_eq!(daemon.api.backups(&[]).len(), 1);
}

#[tokio::test]
async fn backup_then_recover_restores_contents_and_mtimes() {
    let daemon = daemon().await;
    let src = seed_tree(&daemon.dir);
    let before = std::fs::metadata(src.join("alpha.txt")).unwrap().modified().unwrap();

    let args = serde_json::from_value(json!({
        "path": src.to_string_lossy(),
        "archive": "spec-vol",
        "app": "a",
    }))
    .unwrap();
    let rid = daemon.ctx.engine.raw_once("backup", args).unwrap();
    let record = wait_terminal(&daemon.poster, &rid).await;
    assert_eq!(record.state, RecordState::Success, "backup failed: {}", record.reason);
    let file = record.result.unwrap()["file"].as_str().unwrap().to_string();

    // Wreck the tree.
    std::fs::write(src.join("alpha.txt"), "garbage").unwrap();
    std::fs::remove_file(src.join("nested/beta.txt")).unwrap();

    let args = serde_json::from_value(json!({"backup": file})).unwrap();
    let rid = daemon.ctx.engine.raw_once("backup_recover", args).unwrap();
    let record = wait_terminal(&daemon.poster, &rid).await;
    assert_eq!(record.state, RecordState::Success, "recover failed: {}", record.reason);

    assert_eq!(std::fs::read_to_string(src.join("alpha.txt")).unwrap(), "alpha");
    assert_eq!(std::fs::read_to_string(src.join("nested/beta.txt")).unwrap(), "beta");

    // Modification times survive the round trip at one-second precision.
    let after = std::fs::metadata(src.join("alpha.txt")).unwrap().modified().unwrap();
    let drift = after.duration_since(before).unwrap_or_else(|e| e.duration());
    assert!(drift <= Duration::from_secs(1), "mtime drifted {:?}", drift);
}

#[tokio::test]
async fn sleeping_job_skips_fires_until_woken() {
    let daemon = daemon().await;
    let src = seed_tree(&daemon.dir);

    let job = json!([{
        "id": "",
        "spec": "* * * * * *",
        "action": "backup",
        "args": {"path": src.to_string_lossy(), "archive": "spec-vol", "app": "a"},
    }]);
    let update = JobsUpdate { data: serde_json::from_value(job).unwrap(), version: "v1".into() };
    daemon.api.set_jobs(update).await.unwrap();
    let id = daemon.api.jobs(&Default::default())[0].job.id.clone();

    daemon.api.job_action(&id, "sleep").unwrap();
    daemon.clock.advance(chrono::Duration::seconds(2));
    daemon.ctx.engine.tick();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(daemon.poster.records.lock().is_empty(), "sleeping job fired");

    daemon.api.job_action(&id, "wakeup").unwrap();
    daemon.clock.advance(chrono::Duration::seconds(2));
    daemon.ctx.engine.tick();
    let rid = loop {
        if let Some(r) = daemon.poster.records.lock().first() {
            break r.rid.clone();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    wait_terminal(&daemon.poster, &rid).await;
}

#[tokio::test]
async fn controller_snapshot_flows_into_a_daemon_job_table() {
    let daemon = daemon().await;

    // Controller side: ingest one annotated pod.
    let state = ClusterState::shared();
    let client = Arc::new(FakeDaemonClient::new());
    let watcher = Watcher::new(
        bakd_controller::watcher::fake::FakeSpecStream::new(),
        Arc::clone(&client),
        Arc::clone(&state),
        "http://controller:9002/api/v2/system/notify",
    );
    let payload = json!({
        "a.web.web": [{
            "instanceNo": 1,
            "annotation": json!({"backup": [{
                "procname": "a.web.web",
                "expire": "7d",
                "schedule": "0 * * * *",
                "volume": "/v",
                "mode": "full",
            }]}).to_string(),
            "containers": [{"id": "cid-1", "nodeIp": NODE}],
        }]
    })
    .to_string();
    let dirty = watcher.ingest(payload.as_bytes()).unwrap();
    assert_eq!(dirty, vec![NODE.to_string()]);
    watcher.broadcast(&dirty).await;

    // The pushed list feeds the daemon's replace-jobs operation.
    let (jobs, version) = client.pushed_jobs(NODE).unwrap();
    assert_eq!(jobs.len(), 2, "backup plus synthetic expiry");
    daemon.api.set_jobs(JobsUpdate { data: jobs.clone(), version: version.clone() }).await.unwrap();
    assert_eq!(daemon.api.count(), 2);

    // Same version again is a no-op.
    assert!(!daemon.api.set_jobs(JobsUpdate { data: jobs, version }).await.unwrap());

    // Fan-out can route to the job's owner straight from the id.
    let ctl = AppController::new("a", state, client);
    let entries = ctl.get_cron_jobs(&Default::default()).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(bakd_core::parse_ip_from_id(&entries[0].job.id).unwrap(), NODE);
}

#[tokio::test]
async fn daemon_records_land_in_the_controller_store() {
    let daemon = daemon().await;
    let src = seed_tree(&daemon.dir);

    let args = serde_json::from_value(json!({
        "path": src.to_string_lossy(),
        "archive": "spec-vol",
        "app": "a",
    }))
    .unwrap();
    let rid = daemon.ctx.engine.raw_once("backup", args).unwrap();
    let terminal = wait_terminal(&daemon.poster, &rid).await;

    let dir = TempDir::new().unwrap();
    let store = RecordStore::new(dir.path().join("records")).unwrap();
    let api = RecordApi::new(&store);
    for record in daemon.poster.records.lock().iter() {
        api.notify(record).unwrap();
    }

    let (year, month) = {
        use chrono::Datelike;
        (terminal.start.year(), terminal.start.month())
    };
    let stored = api.records("a", 10, month, year).unwrap();
    assert_eq!(stored.len(), 1, "running then terminal collapse onto one rid");
    assert_eq!(stored[0].state, RecordState::Success);
    assert_eq!(api.record_by_id("a", &rid).unwrap().rid, rid);
}
