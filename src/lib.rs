//! # poolvisor
//!
//! **Poolvisor** is a process-local worker-pool manager for Rust.
//!
//! It admits units of work — each bound to an executable target, a result
//! callback, and arguments — runs them on a bounded set of isolated
//! execution units, and reclaims capacity from workers that stop making
//! progress.
//!
//! ## Architecture
//! ```text
//!     caller ──► ClusterHandle::setup_worker / close
//!                         │
//!                         ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Cluster control loop (single flow, owns all mutable state)       │
//! │  - file-existence cache (probe each distinct path at most once)   │
//! │  - active worker set (size ≤ max_threads at all times)            │
//! │  - task queue: primary FIFO + starved set                         │
//! │  - inspection sweep: age workers, reap the stalled, promote       │
//! │    starving jobs                                                  │
//! └──────┬─────────────────┬─────────────────┬───────────────┬────────┘
//!        ▼                 ▼                 ▼               │
//!   ┌──────────┐     ┌──────────┐      ┌──────────┐         │
//!   │   unit   │     │   unit   │      │   unit   │         │
//!   │ (Spawn)  │     │ (Spawn)  │      │ (Spawn)  │         │
//!   └────┬─────┘     └────┬─────┘      └────┬─────┘         │
//!        │ Online         │ Message         │ Exit          ▼
//!        └────────────────┴─────────────────┴──────► signal channel
//!                                                           │
//!   Bus ◄── Events (online/fault/exit/queued/starved/...) ──┘
//!    │
//!    └──► SubscriberSet ──► LogWriter / custom Subscribe impls
//! ```
//!
//! ## Lifecycle
//! ```text
//! setup_worker(target, callback, args)
//!   ├─► unreadable target ─► AdmissionRejected event, nothing else
//!   ├─► capacity free     ─► spawn unit, handle active on Online
//!   └─► pool full         ─► queue (FIFO); starves after N ticks
//!
//! worker Exit ─► remove handle ─► exactly one revival attempt
//!                                 (starved set first, then FIFO front)
//!
//! inspection tick (while workers active)
//!   ├─► idle counter ++ per online worker (reset by any Message)
//!   ├─► 4 idle ticks ─► cooperative terminate, observed via Exit
//!   └─► queued jobs age; threshold crossers join the starved set
//!
//! close()
//!   ├─► admissions become no-ops, queues discarded
//!   ├─► every worker asked to terminate
//!   └─► active set drains ─► ClusterExit event (once, with duration)
//! ```
//!
//! ## Features
//! | Area           | Description                                         | Key types                              |
//! |----------------|-----------------------------------------------------|----------------------------------------|
//! | **Admission**  | Bounded dispatch with queued overflow.              | [`Cluster`], [`ClusterHandle`]         |
//! | **Fairness**   | Starved jobs dispatch before fresh arrivals.        | [`ClusterConfig::starvation_threshold`]|
//! | **Recycling**  | Stalled workers are reaped and their slot revived.  | [`ClusterConfig::inspection_cycle`]    |
//! | **Faults**     | Prod isolates worker faults; elsewhere they are fatal. | [`Environment`], [`FaultAction`]    |
//! | **Units**      | Pluggable execution backend; processes by default.  | [`Spawn`], [`ProcessSpawner`]          |
//! | **Observability** | Typed events, fan-out subscribers, tracing sink. | [`Event`], [`Subscribe`], [`LogWriter`]|
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use poolvisor::{Cluster, ClusterConfig, Environment, LogWriter, ProcessSpawner, Subscribe};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let mut cfg = ClusterConfig::default();
//!     cfg.max_threads = 4;
//!     cfg.environment = Environment::Prod;
//!
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
//!     let cluster = Cluster::builder(cfg).with_subscribers(subs).build();
//!     let handle = cluster.run(Arc::new(ProcessSpawner));
//!
//!     handle.setup_worker(
//!         "/usr/local/bin/crunch",
//!         None,
//!         vec!["--shard".to_string(), "1".to_string()],
//!     );
//!
//!     // ... later: stop admissions and drain the pool.
//!     handle.close();
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod policy;
mod probe;
mod spawn;
mod subscribers;

// ---- Public re-exports ----

pub use config::{ClusterConfig, Environment, TaskEntry};
pub use core::{Callback, Cluster, ClusterBuilder, ClusterHandle, WorkerId};
pub use error::{ClusterError, SpawnError, ThreadFault};
pub use events::{Bus, Event, EventKind};
pub use policy::{FaultAction, on_worker_fault};
pub use probe::{FsProbe, Probe};
pub use spawn::{ProcessSpawner, Signal, SignalSender, Spawn};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
