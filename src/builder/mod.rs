//! # Staged builder.
//!
//! [`WaitResult`] factories start a configuration that goes through
//! [`ActionStage`] → [`PredicateStage`] → [`RetryStage`] → [`IntervalStage`] →
//! [`ReadyStage`], which finally builds a [`PollingEngine`](crate::PollingEngine)
//! or an [`AsyncHandle`](crate::AsyncHandle).

mod stages;
mod wait_result;

pub use stages::{ActionStage, IntervalStage, PredicateStage, ReadyStage, RetryStage};
pub use wait_result::WaitResult;
