//! Cluster events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the control loop.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] — event classification and payload metadata
//! - [`Bus`] — thin wrapper over `tokio::sync::broadcast`
//!
//! The only publisher is the cluster control loop; consumers are the
//! subscriber listener (fanning out to the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet)) and any direct
//! [`Bus::subscribe`] receiver.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
