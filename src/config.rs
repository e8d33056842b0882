//! # Cluster configuration.
//!
//! [`ClusterConfig`] defines the pool's behavior: thread budget, inspection
//! cadence, starvation threshold, environment mode, and the optional map of
//! named tasks booted with the cluster.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use poolvisor::{ClusterConfig, Environment};
//!
//! let mut cfg = ClusterConfig::default();
//! cfg.max_threads = 4;
//! cfg.inspection_cycle = Duration::from_millis(250);
//! cfg.environment = Environment::Prod;
//!
//! assert_eq!(cfg.max_threads, 4);
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Deployment environment, gating the worker-fault policy.
///
/// In [`Environment::Prod`] a worker fault is logged and isolated to that
/// worker; in any other environment it is treated as fatal for the owning
/// process. See [`on_worker_fault`](crate::on_worker_fault).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    /// Production: worker faults are logged and isolated.
    Prod,
    /// Any non-production environment (e.g. `"dev"`, `"staging"`).
    Other(String),
}

impl Environment {
    /// Parses an environment name; `"prod"` maps to [`Environment::Prod`],
    /// everything else to [`Environment::Other`].
    pub fn parse(name: &str) -> Self {
        match name {
            "prod" => Environment::Prod,
            other => Environment::Other(other.to_string()),
        }
    }

    /// True for [`Environment::Prod`].
    pub fn is_prod(&self) -> bool {
        matches!(self, Environment::Prod)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Other("dev".to_string())
    }
}

/// A named task booted with the cluster.
///
/// `cores` is a relative weight, not an absolute count: each entry's worker
/// allocation is derived from it against the global thread budget (see
/// [`ClusterConfig::tasks`]).
#[derive(Clone, Debug)]
pub struct TaskEntry {
    /// Executable target run by this task's workers.
    pub file: PathBuf,
    /// Requested core weight (0 is treated as 1).
    pub cores: usize,
    /// Re-admit a replacement worker whenever one of this task's workers
    /// exits while the cluster is open.
    pub watch: bool,
}

impl TaskEntry {
    /// Creates an entry with `watch` disabled.
    pub fn new(file: impl Into<PathBuf>, cores: usize) -> Self {
        Self {
            file: file.into(),
            cores,
            watch: false,
        }
    }

    /// Enables keep-alive re-admission for this entry.
    pub fn watched(mut self) -> Self {
        self.watch = true;
        self
    }
}

/// Global configuration for the cluster.
///
/// Immutable after construction; the control loop reads it, never writes it.
#[derive(Clone, Debug)]
pub struct ClusterConfig {
    /// Maximum number of concurrently active workers (clamped to >= 1).
    pub max_threads: usize,
    /// Period of the inspection sweep that ages workers and queued jobs.
    pub inspection_cycle: Duration,
    /// Number of inspection ticks after which a queued job is promoted into
    /// the starved set.
    pub starvation_threshold: u32,
    /// Deployment environment; gates the worker-fault policy.
    pub environment: Environment,
    /// Directory for log files, consumed by the embedding program's logging
    /// transport. The core only carries it.
    pub log_dir: Option<PathBuf>,
    /// Named tasks admitted when the cluster boots, keyed by task name.
    pub tasks: BTreeMap<String, TaskEntry>,
    /// Capacity of the submission channel behind `setup_worker`.
    pub submit_capacity: usize,
    /// Capacity of the event bus channel.
    pub bus_capacity: usize,
}

impl Default for ClusterConfig {
    /// Provides a default configuration:
    /// - `max_threads` = host logical core count
    /// - `inspection_cycle = 500ms`
    /// - `starvation_threshold = 3`
    /// - `environment = Other("dev")`
    /// - no log directory, no named tasks
    fn default() -> Self {
        Self {
            max_threads: num_cpus::get(),
            inspection_cycle: Duration::from_millis(500),
            starvation_threshold: 3,
            environment: Environment::default(),
            log_dir: None,
            tasks: BTreeMap::new(),
            submit_capacity: 1024,
            bus_capacity: 1024,
        }
    }
}

impl ClusterConfig {
    /// Thread budget clamped to a minimum of 1.
    pub fn max_threads_clamped(&self) -> usize {
        self.max_threads.max(1)
    }

    /// Bus capacity clamped to a minimum of 1.
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}
