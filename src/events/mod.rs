//! Engine events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted while a resolution runs.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `ProbeExecution` (attempt events), `PollingEngine`
//!   (terminal events, cleanup), `AsyncHandle` (timeouts), `SubscriberSet`
//!   workers (overflow/panic).
//! - **Consumers**: `SubscriberSet` listener and any `Bus::subscribe()` receiver.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
