//! # Example: flaky_service
//!
//! Polls a service that refuses connections twice before reporting `UP`,
//! waiting with exponential backoff between attempts and printing every
//! engine event through a custom subscriber.
//!
//! ## Flow
//! ```text
//! PollingEngine::resolve_async()
//!   ├─► publish(AttemptStarting, attempt=1)
//!   ├─► probe → Err("connection refused")
//!   ├─► publish(AttemptFailed)        (ignored: ignore_exception(false))
//!   ├─► publish(WaitScheduled{delay=50ms})
//!   ├─► attempt=2 → Err, WaitScheduled{delay=100ms}
//!   ├─► attempt=3 → Ok("UP") accepted
//!   ├─► publish(AttemptAccepted)
//!   └─► publish(CleanupRan)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example flaky_service
//! ```

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use pollvisor::{
    BackoffPolicy, BoxError, Bus, Event, Executor, JitterPolicy, RetryPolicy, Subscribe,
    SubscriberSet, WaitResult,
};

static ATTEMPTS: AtomicU32 = AtomicU32::new(0);

struct Printer;

#[async_trait]
impl Subscribe for Printer {
    async fn on_event(&self, ev: &Event) {
        println!(
            "[{:?}] probe={:?} attempt={:?} delay_ms={:?} reason={:?}",
            ev.kind, ev.probe, ev.attempt, ev.delay_ms, ev.reason
        );
    }

    fn name(&self) -> &'static str {
        "printer"
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Event bus with a printing subscriber
    let bus = Bus::new(64);
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Printer)];
    let set = SubscriberSet::new(subs, bus.clone(), &Executor::current())?;

    // 2. Exponential waits: 50ms, 100ms, 200ms, ... capped at 1s
    let backoff = BackoffPolicy {
        first: Duration::from_millis(50),
        max: Duration::from_secs(1),
        factor: 2.0,
        jitter: JitterPolicy::None,
    };

    // 3. The flaky service
    let status = WaitResult::of_fn("status-endpoint", |_ctx| async {
        let n = ATTEMPTS.fetch_add(1, Ordering::Relaxed) + 1;
        if n < 3 {
            Err::<&'static str, BoxError>("connection refused".into())
        } else {
            Ok("UP")
        }
    })
    .ignore_exception(false)
    .expecting_equals_to("UP")
    .repeat(RetryPolicy::with_backoff(5, backoff))
    .with_bus(bus)
    .on_finish(|| println!("[cleanup] closing client"))
    .using(Executor::current())
    .resolved_value()
    .await?;

    println!("service is {status} after {} attempts", ATTEMPTS.load(Ordering::Relaxed));

    // 4. Let the subscriber drain its queue
    tokio::time::sleep(Duration::from_millis(50)).await;
    set.shutdown().await;
    Ok(())
}
