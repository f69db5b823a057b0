//! # Example: cancel_wait
//!
//! Starts a resolution that would run for minutes, then cancels it. The
//! in-flight wait is interrupted right away, the cleanup hook runs once and
//! the pending resolution reports cancellation.
//!
//! ## Flow
//! ```text
//! AsyncHandle::start() ──► worker: attempt 1 → rejected → wait 10s ...
//!        │
//!        └─ 300ms later: Pending::cancel()
//!                          ├─► wait interrupted
//!                          ├─► cleanup hook
//!                          └─► Err(PollError::Canceled)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example cancel_wait
//! ```

use std::time::{Duration, Instant};

use pollvisor::{BoxError, Executor, PollError, WaitResult};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let handle = WaitResult::of_fn("queue-depth", |_ctx| async {
        println!("[probe] checking queue depth");
        Ok::<u32, BoxError>(42)
    })
    .expecting(|depth| *depth == 0)
    .repeat_count(30)
    .every(Duration::from_secs(10))
    .on_finish(|| println!("[cleanup] released"))
    .using(Executor::current())
    .with_timeout(Duration::from_secs(600));

    let pending = handle.start();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let started = Instant::now();
    pending.cancel();
    match pending.await {
        Err(PollError::Canceled) => println!("cancelled within {:?}", started.elapsed()),
        other => println!("unexpected outcome: {other:?}"),
    }
    Ok(())
}
