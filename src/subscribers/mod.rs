//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the built-in [`LogWriter`] (feature `logging`).
//!
//! ## Architecture
//! ```text
//! ProbeExecution / PollingEngine / AsyncHandle ── publish(Event) ──► Bus
//!                                                                    │
//!                                                      SubscriberSet listener
//!                                                                    │
//!                                                   ┌────────────────┼──────────┐
//!                                                   ▼                ▼          ▼
//!                                               LogWriter         Metrics    Custom
//! ```

#[cfg(feature = "logging")]
mod log;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
