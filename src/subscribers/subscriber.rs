//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for plugging custom event handlers
//! into the cluster (logging, metrics, alerting).
//!
//! Each subscriber gets:
//! - a **dedicated worker task** (runs independently of the control loop),
//! - a **per-subscriber bounded queue** (capacity via
//!   [`Subscribe::queue_capacity`]),
//! - **panic isolation** (a panicking subscriber is logged, never crashes
//!   the pool).
//!
//! ## Rules
//! - A slow subscriber only affects its own queue.
//! - Queue overflow drops the event for this subscriber only; others are
//!   unaffected.
//! - Events are processed sequentially (FIFO) per subscriber.

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for cluster observability.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from a dedicated worker task, not from the control loop.
    /// Events are delivered in FIFO order per subscriber.
    async fn on_event(&self, event: &Event);

    /// Returns the subscriber name used in logs.
    ///
    /// Prefer short, descriptive names (e.g., "log", "metrics").
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this subscriber.
    ///
    /// When the queue is full the new event is dropped for this subscriber
    /// only. The runtime clamps capacity to a minimum of 1. Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
