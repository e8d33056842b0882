//! Fan a burst of shell jobs over a two-worker pool.
//!
//! Run with: `cargo run --example pool`

use std::sync::Arc;
use std::time::Duration;

use poolvisor::{
    Callback, Cluster, ClusterConfig, Environment, LogWriter, ProcessSpawner, Subscribe,
};

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut cfg = ClusterConfig::default();
    cfg.max_threads = 2;
    cfg.inspection_cycle = Duration::from_millis(500);
    cfg.environment = Environment::Prod;

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let cluster = Cluster::builder(cfg).with_subscribers(subs).build();
    let handle = cluster.run(Arc::new(ProcessSpawner));

    let print_result: Callback = Arc::new(|fault, payload| {
        if let Some(p) = payload {
            println!("result: {p}");
        }
        if let Some(f) = fault {
            eprintln!("fault: {f}");
        }
    });

    // Four jobs over two workers: two run now, two wait in the queue.
    for n in 1..=4 {
        handle.setup_worker(
            "/bin/sh",
            Some(print_result.clone()),
            vec!["-c".to_string(), format!("sleep 1; echo job-{n} done")],
        );
    }

    tokio::time::sleep(Duration::from_secs(4)).await;

    let mut events = cluster.bus.subscribe();
    handle.close();
    while let Ok(ev) = events.recv().await {
        if ev.kind == poolvisor::EventKind::ClusterExit {
            break;
        }
    }
    println!(
        "served for {}",
        cluster.cluster_duration().unwrap_or_default()
    );
}
