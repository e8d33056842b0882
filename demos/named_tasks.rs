//! Boot a cluster from a named-task map with weighted core allocation.
//!
//! Run with: `cargo run --example named_tasks`

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use poolvisor::{
    Cluster, ClusterConfig, Environment, LogWriter, ProcessSpawner, Subscribe, TaskEntry,
};

/// Writes a small executable worker script and returns its path.
fn demo_script(name: &str, body: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("poolvisor-demo-{name}.sh"));
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write demo script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod demo script");
    }
    path
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    tracing_subscriber::fmt().init();

    let app = demo_script("app", "echo app serving; sleep 5");
    let agent = demo_script("agent", "echo agent heartbeat; sleep 1");

    let mut cfg = ClusterConfig::default();
    cfg.max_threads = 4;
    cfg.environment = Environment::Prod;

    // "app" takes three quarters of the budget, "agent" the rest; the
    // watched entry is re-admitted whenever one of its workers exits.
    cfg.tasks
        .insert("app".to_string(), TaskEntry::new(app, 3));
    cfg.tasks
        .insert("agent".to_string(), TaskEntry::new(agent, 1).watched());

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let cluster = Cluster::builder(cfg).with_subscribers(subs).build();
    let handle = cluster.run(Arc::new(ProcessSpawner));

    tokio::time::sleep(Duration::from_secs(4)).await;

    let mut events = cluster.bus.subscribe();
    handle.close();
    while let Ok(ev) = events.recv().await {
        if ev.kind == poolvisor::EventKind::ClusterExit {
            break;
        }
    }
}
