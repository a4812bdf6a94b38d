// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::fake::FakeSpecStream;
use super::*;
use crate::client::fake::FakeDaemonClient;
use crate::state::ClusterState;
use bakd_wire::DebugInfo;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const ADVERTISE: &str = "http://controller:9002/api/v2/system/notify";

fn snapshot_payload(node_ip: &str, schedule: &str) -> Vec<u8> {
    json!({
        "a.web.web": [{
            "instanceNo": 1,
            "annotation": json!({"backup": [{
                "procname": "a.web.web",
                "expire": "7d",
                "schedule": schedule,
                "volume": "/v",
                "mode": "full",
            }]}).to_string(),
            "containers": [{"id": "cid-1", "nodeIp": node_ip}],
        }]
    })
    .to_string()
    .into_bytes()
}

struct Fixture {
    stream: Arc<FakeSpecStream>,
    client: Arc<FakeDaemonClient>,
    watcher: Arc<Watcher<Arc<FakeSpecStream>, FakeDaemonClient>>,
}

fn fixture() -> Fixture {
    let stream = FakeSpecStream::new();
    let client = Arc::new(FakeDaemonClient::new());
    let watcher = Arc::new(
        Watcher::new(Arc::clone(&stream), Arc::clone(&client), ClusterState::shared(), ADVERTISE)
            .with_intervals(Duration::from_secs(3), Duration::from_secs(30)),
    );
    Fixture { stream, client, watcher }
}

async fn eventually(check: impl Fn() -> bool) {
    for _ in 0..2000 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never became true");
}

#[tokio::test(start_paused = true)]
async fn snapshot_broadcasts_two_jobs_to_the_owning_node() {
    let fx = fixture();
    let watcher = Arc::clone(&fx.watcher);
    let run = tokio::spawn(async move { watcher.run().await });

    fx.stream.emit(WatchEvent { event: "update".into(), data: snapshot_payload("10.0.0.1", "0 * * * *") }).await;
    eventually(|| fx.client.pushed_jobs("10.0.0.1").is_some()).await;

    let (jobs, version) = fx.client.pushed_jobs("10.0.0.1").unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].action, "backup");
    assert_eq!(jobs[1].action, "backup_expire");
    assert_eq!(jobs[1].spec, "* * * * *");
    assert_eq!(version.len(), 32, "version is an md5 hex digest");
    assert_eq!(fx.client.notify_addr("10.0.0.1").unwrap(), ADVERTISE);

    run.abort();
}

#[tokio::test(start_paused = true)]
async fn heartbeats_and_empty_payloads_are_ignored() {
    let fx = fixture();
    let watcher = Arc::clone(&fx.watcher);
    let run = tokio::spawn(async move { watcher.run().await });

    fx.stream.emit(WatchEvent { event: "heartbeat".into(), data: b"x".to_vec() }).await;
    fx.stream.emit(WatchEvent { event: "update".into(), data: Vec::new() }).await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(fx.client.pushed_nodes().is_empty());

    run.abort();
}

#[tokio::test(start_paused = true)]
async fn unchanged_snapshot_is_not_rebroadcast() {
    let fx = fixture();
    let watcher = Arc::clone(&fx.watcher);
    let run = tokio::spawn(async move { watcher.run().await });

    fx.stream.emit(WatchEvent { event: "update".into(), data: snapshot_payload("10.0.0.1", "0 * * * *") }).await;
    eventually(|| fx.client.pushed_jobs("10.0.0.1").is_some()).await;

    fx.client.clear_pushed();
    fx.stream.emit(WatchEvent { event: "update".into(), data: snapshot_payload("10.0.0.1", "0 * * * *") }).await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(fx.client.pushed_nodes().is_empty(), "clean node must not be re-pushed");

    fx.stream.emit(WatchEvent { event: "update".into(), data: snapshot_payload("10.0.0.1", "30 * * * *") }).await;
    eventually(|| fx.client.pushed_jobs("10.0.0.1").is_some()).await;

    run.abort();
}

#[tokio::test(start_paused = true)]
async fn decode_failure_reconnects_and_keeps_going() {
    let fx = fixture();
    let watcher = Arc::clone(&fx.watcher);
    let run = tokio::spawn(async move { watcher.run().await });

    fx.stream.emit(WatchEvent { event: "update".into(), data: b"{garbage".to_vec() }).await;
    // After the reconnect delay the watcher opens a fresh connection.
    tokio::time::sleep(Duration::from_secs(5)).await;
    fx.stream.emit(WatchEvent { event: "update".into(), data: snapshot_payload("10.0.0.1", "0 * * * *") }).await;
    eventually(|| fx.client.pushed_jobs("10.0.0.1").is_some()).await;

    run.abort();
}

#[tokio::test(start_paused = true)]
async fn per_node_broadcast_failures_do_not_stop_the_cycle() {
    let fx = fixture();
    fx.client.fail_node("10.0.0.1");
    let watcher = Arc::clone(&fx.watcher);
    let run = tokio::spawn(async move { watcher.run().await });

    let payload = json!({
        "a.web.web": [
            {
                "instanceNo": 1,
                "annotation": json!({"backup": [{"procname": "a.web.web", "expire": "7d", "schedule": "0 * * * *", "volume": "/v"}]}).to_string(),
                "containers": [{"id": "c1", "nodeIp": "10.0.0.1"}],
            },
            {
                "instanceNo": 2,
                "annotation": json!({"backup": [{"procname": "a.web.web", "expire": "7d", "schedule": "0 * * * *", "volume": "/v"}]}).to_string(),
                "containers": [{"id": "c2", "nodeIp": "10.0.0.2"}],
            }
        ]
    })
    .to_string()
    .into_bytes();

    fx.stream.emit(WatchEvent { event: "update".into(), data: payload }).await;
    eventually(|| fx.client.pushed_jobs("10.0.0.2").is_some()).await;
    assert!(fx.client.pushed_jobs("10.0.0.1").is_none());

    run.abort();
}

#[tokio::test(start_paused = true)]
async fn liveness_rebroadcasts_zero_value_daemons() {
    let fx = fixture();
    // Seed the state without going through the stream.
    fx.watcher.ingest(&snapshot_payload("10.0.0.1", "0 * * * *")).unwrap();
    fx.client.set_debug(
        "10.0.0.1",
        DebugInfo {
            start_time: chrono::Utc::now(),
            update_time: "0001-01-01T00:00:00Z".into(),
            crond_status: "started".into(),
            running_tasks: 0,
            job_count: 0,
        },
    );

    let watcher = Arc::clone(&fx.watcher);
    let liveness = tokio::spawn(async move { watcher.run_liveness().await });
    eventually(|| fx.client.pushed_jobs("10.0.0.1").is_some()).await;

    // A healthy daemon is left alone.
    fx.client.clear_pushed();
    fx.client.set_debug(
        "10.0.0.1",
        DebugInfo {
            start_time: chrono::Utc::now(),
            update_time: "2024-06-01T12:00:00Z".into(),
            crond_status: "started".into(),
            running_tasks: 0,
            job_count: 2,
        },
    );
    tokio::time::sleep(Duration::from_secs(90)).await;
    assert!(fx.client.pushed_jobs("10.0.0.1").is_none());

    liveness.abort();
}

#[test]
fn sse_frames_accumulate_until_blank_line() {
    let mut frame = super::SseFrame::default();
    assert!(frame.feed(b"event: update\n").is_none());
    assert!(frame.feed(b"data: {\"a\":1}\n").is_none());
    let event = frame.feed(b"\n").unwrap();
    assert_eq!(event.event, "update");
    assert_eq!(event.data, b"{\"a\":1}");

    // Heartbeats with no data still frame correctly.
    frame.feed(b"event: heartbeat\r\n");
    let event = frame.feed(b"\r\n").unwrap();
    assert!(event.is_noop());

    // Leading blank lines produce nothing.
    assert!(frame.feed(b"\n").is_none());
}
