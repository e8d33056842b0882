//! # Event subscribers for the cluster.
//!
//! Provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out, and the
//! built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! control loop ── publish(Event) ──► Bus ──► subscriber listener
//!                                                 │
//!                                          SubscriberSet::emit
//!                                   ┌─────────────┼─────────────┐
//!                                   ▼             ▼             ▼
//!                              [queue S1]    [queue S2]    [queue SN]
//!                                   ▼             ▼             ▼
//!                              worker S1     worker S2     worker SN
//!                                   ▼             ▼             ▼
//!                              on_event()    on_event()    on_event()
//! ```

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
