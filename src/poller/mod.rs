use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

pub const STATUS_INTERVAL: Duration = Duration::from_secs(5);
pub const POSITIONS_INTERVAL: Duration = Duration::from_secs(5);
pub const BALANCE_INTERVAL: Duration = Duration::from_secs(10);
pub const LOGS_INTERVAL: Duration = Duration::from_secs(10);
pub const HEALTH_INTERVAL: Duration = Duration::from_secs(600);

struct PollerShared {
    active: AtomicBool,
    ticks: AtomicU64,
}

/// Handed to the result handler of every call; lets the receiver check that the poller
/// that issued the call is still alive at the moment the result is applied.
#[derive(Clone)]
pub struct PollTicket {
    tick: u64,
    shared: Arc<PollerShared>,
}

impl PollTicket {
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn is_live(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }
}

/// Repeatedly runs one fetch on a fixed period until stopped.
///
/// The first call fires on activation. Every call runs in its own task, so a slow call
/// never delays the next tick and calls may overlap. Errors are just values to the
/// poller: the period never changes. Stopping (or dropping) the poller prevents further
/// ticks; calls already in flight finish, but their results are dropped instead of
/// reaching the handler.
pub struct Poller {
    name: String,
    shared: Arc<PollerShared>,
    task: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn spawn<T, F, Fut, H, HFut>(
        name: impl Into<String>,
        interval: Duration,
        fetch: F,
        on_result: H,
    ) -> Self
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        H: Fn(PollTicket, T) -> HFut + Send + Sync + 'static,
        HFut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let interval = interval.max(Duration::from_millis(1));
        let shared = Arc::new(PollerShared {
            active: AtomicBool::new(true),
            ticks: AtomicU64::new(0),
        });

        let on_result = Arc::new(on_result);
        let task_shared = Arc::clone(&shared);
        let task_name = name.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if !task_shared.active.load(Ordering::Acquire) {
                    break;
                }

                let tick = task_shared.ticks.fetch_add(1, Ordering::AcqRel) + 1;
                let ticket = PollTicket {
                    tick,
                    shared: Arc::clone(&task_shared),
                };
                let call = fetch();
                let on_result = Arc::clone(&on_result);
                let call_name = task_name.clone();

                tokio::spawn(async move {
                    let value = call.await;
                    if !ticket.is_live() {
                        debug!("[{}] tick {} resolved after stop, discarded", call_name, tick);
                        return;
                    }
                    on_result(ticket, value).await;
                });
            }
        });

        info!("[{}] polling every {:?}", name, interval);

        Self {
            name,
            shared,
            task: Some(task),
        }
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    pub fn ticks_issued(&self) -> u64 {
        self.shared.ticks.load(Ordering::Acquire)
    }

    /// Stops scheduling immediately. In-flight calls are not aborted.
    pub fn stop(&mut self) {
        let was_active = self.shared.active.swap(false, Ordering::AcqRel);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if was_active {
            info!("[{}] stopped after {} ticks", self.name, self.ticks_issued());
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio::time::{sleep, Instant};

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_immediate_then_fixed_period() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let start = Instant::now();

        let recorded = Arc::clone(&calls);
        let poller = Poller::spawn(
            "status",
            Duration::from_secs(5),
            move || {
                let recorded = Arc::clone(&recorded);
                async move {
                    recorded.lock().unwrap().push(start.elapsed());
                }
            },
            |_, _| async {},
        );

        sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert!(calls.lock().unwrap()[0] < Duration::from_millis(10));

        sleep(Duration::from_millis(14_995)).await;
        let times = calls.lock().unwrap().clone();
        assert_eq!(times.len(), 4);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(5));
        }
        assert_eq!(poller.ticks_issued(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_change_the_period() {
        let calls = counter();
        let failures = counter();

        let issued = Arc::clone(&calls);
        let seen = Arc::clone(&failures);
        let _poller = Poller::spawn(
            "balance",
            Duration::from_secs(10),
            move || {
                let issued = Arc::clone(&issued);
                async move {
                    issued.fetch_add(1, Ordering::SeqCst);
                    Err::<(), &str>("backend down")
                }
            },
            move |_, result: Result<(), &'static str>| {
                let seen = Arc::clone(&seen);
                async move {
                    if result.is_err() {
                        seen.fetch_add(1, Ordering::SeqCst);
                    }
                }
            },
        );

        sleep(Duration::from_millis(30_500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(failures.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_calls_overlap_and_apply_in_arrival_order() {
        let applied = Arc::new(Mutex::new(Vec::new()));
        let issued = counter();

        let issue = Arc::clone(&issued);
        let sink = Arc::clone(&applied);
        let _poller = Poller::spawn(
            "positions",
            Duration::from_secs(5),
            move || {
                let n = issue.fetch_add(1, Ordering::SeqCst);
                async move {
                    // first call is slowest, so it lands after the second one
                    let delay = if n == 0 { 8 } else { 1 };
                    sleep(Duration::from_secs(delay)).await;
                    n
                }
            },
            move |_, n| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().unwrap().push(n);
                }
            },
        );

        sleep(Duration::from_millis(8_500)).await;
        assert_eq!(issued.load(Ordering::SeqCst), 2);
        assert_eq!(*applied.lock().unwrap(), vec![1, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_ticks_and_discards_in_flight() {
        let issued = counter();
        let applied = counter();

        let issue = Arc::clone(&issued);
        let apply = Arc::clone(&applied);
        let mut poller = Poller::spawn(
            "status",
            Duration::from_secs(5),
            move || {
                let issue = Arc::clone(&issue);
                async move {
                    issue.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_secs(3)).await;
                }
            },
            move |_, _| {
                let apply = Arc::clone(&apply);
                async move {
                    apply.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        sleep(Duration::from_secs(1)).await;
        assert_eq!(issued.load(Ordering::SeqCst), 1);
        poller.stop();
        assert!(!poller.is_active());

        sleep(Duration::from_secs(30)).await;
        assert_eq!(issued.load(Ordering::SeqCst), 1);
        assert_eq!(applied.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let issued = counter();
        let issue = Arc::clone(&issued);

        let poller = Poller::spawn(
            "logs",
            Duration::from_secs(10),
            move || {
                let issue = Arc::clone(&issue);
                async move {
                    issue.fetch_add(1, Ordering::SeqCst);
                }
            },
            |_, _| async {},
        );

        sleep(Duration::from_millis(10)).await;
        drop(poller);
        sleep(Duration::from_secs(60)).await;
        assert_eq!(issued.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticket_reports_tick_number() {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ticks);

        let _poller = Poller::spawn(
            "health",
            Duration::from_secs(600),
            || async {},
            move |ticket, _| {
                let sink = Arc::clone(&sink);
                async move {
                    assert!(ticket.is_live());
                    sink.lock().unwrap().push(ticket.tick());
                }
            },
        );

        sleep(Duration::from_secs(1_201)).await;
        assert_eq!(*ticks.lock().unwrap(), vec![1, 2, 3]);
    }
}
