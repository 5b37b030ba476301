//! The polling loop.
//!
//! One task owns the interval timer. Each tick starts at most one fetch; a
//! tick that arrives while a fetch is still outstanding is dropped. Fetch
//! results and expired marker timers are joined back into the same loop, so
//! state is only ever mutated from one place at a time.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::state::{Deferred, SyncState};
use crate::db::models::Match;
use crate::feed::{FetchError, MatchFeed};

/// How long transient markers live.
#[derive(Debug, Clone, Copy)]
pub struct EngineTimings {
    pub arrival_highlight: Duration,
    pub departure_delay: Duration,
}

impl Default for EngineTimings {
    fn default() -> Self {
        EngineTimings {
            arrival_highlight: Duration::from_millis(1000),
            departure_delay: Duration::from_millis(1000),
        }
    }
}

struct Worker {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct SyncEngine {
    feed: Arc<dyn MatchFeed>,
    state: Arc<RwLock<SyncState>>,
    timings: EngineTimings,
    worker: Option<Worker>,
}

impl SyncEngine {
    pub fn new(feed: Arc<dyn MatchFeed>, state: SyncState, timings: EngineTimings) -> Self {
        SyncEngine {
            feed,
            state: Arc::new(RwLock::new(state)),
            timings,
            worker: None,
        }
    }

    /// Shared handle for readers and presentation mutators.
    pub fn state(&self) -> Arc<RwLock<SyncState>> {
        Arc::clone(&self.state)
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.task.is_finished())
    }

    /// Begin polling. The first fetch starts immediately.
    pub fn start(&mut self, poll_interval: Duration) {
        if self.is_running() {
            warn!("Sync engine already running, ignoring start");
            return;
        }
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_loop(
            Arc::clone(&self.feed),
            Arc::clone(&self.state),
            self.timings,
            poll_interval,
            shutdown_rx,
        ));
        self.worker = Some(Worker { shutdown, task });
    }

    /// Stop polling and wait for the loop to exit. Outstanding marker timers
    /// and any in-flight fetch are dropped with it.
    pub async fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = worker.shutdown.send(());
        if let Err(e) = worker.task.await {
            error!("Sync loop ended abnormally: {}", e);
        }
    }
}

async fn run_loop(
    feed: Arc<dyn MatchFeed>,
    state: Arc<RwLock<SyncState>>,
    timings: EngineTimings,
    poll_interval: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    info!(
        "Sync engine started (feed={}, interval={:?})",
        feed.name(),
        poll_interval
    );

    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // At most one entry: the guard against overlapping fetches.
    let mut fetches: JoinSet<Result<Vec<Match>, FetchError>> = JoinSet::new();
    let mut timers: JoinSet<Deferred> = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut shutdown => break,

            _ = interval.tick() => {
                if !fetches.is_empty() {
                    debug!("Previous fetch still in flight, skipping tick");
                    continue;
                }
                let feed = Arc::clone(&feed);
                fetches.spawn(async move { feed.fetch_snapshot().await });
            }

            Some(joined) = fetches.join_next() => {
                let result = joined.unwrap_or_else(|e| {
                    Err(FetchError::Network(format!("fetch task failed: {}", e)))
                });
                let deferred = state.write().await.apply_fetch(result);
                for d in deferred {
                    schedule(&mut timers, d, &timings);
                }
            }

            Some(joined) = timers.join_next() => {
                match joined {
                    Ok(d) => state.write().await.run_deferred(d),
                    Err(e) => error!("Marker timer failed: {}", e),
                }
            }
        }
    }

    // Dropping the timer set cancels the markers' expiry, so settle them now.
    drop(timers);
    state.write().await.flush_deferred();
    info!("Sync engine stopped");
}

fn schedule(timers: &mut JoinSet<Deferred>, deferred: Deferred, timings: &EngineTimings) {
    let delay = match deferred {
        Deferred::ClearArrived(_) => timings.arrival_highlight,
        Deferred::CommitDeparture { .. } => timings.departure_delay,
    };
    timers.spawn(async move {
        tokio::time::sleep(delay).await;
        deferred
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::sample;
    use crate::sync::favourites::tests::RecordingStore;
    use crate::sync::favourites::FavouritesStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::sleep;

    type Scripted = Result<Vec<Match>, FetchError>;

    /// Feed that replays canned responses, repeating the last one forever.
    struct ScriptedFeed {
        script: Mutex<VecDeque<Scripted>>,
        latency: Duration,
        calls: AtomicUsize,
    }

    impl ScriptedFeed {
        fn new(script: Vec<Scripted>, latency: Duration) -> Arc<Self> {
            Arc::new(ScriptedFeed {
                script: Mutex::new(script.into()),
                latency,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MatchFeed for ScriptedFeed {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch_snapshot(&self) -> Result<Vec<Match>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = {
                let mut script = self.script.lock().unwrap();
                if script.len() > 1 {
                    script.pop_front()
                } else {
                    script.front().cloned()
                }
            };
            sleep(self.latency).await;
            next.unwrap_or_else(|| Ok(vec![]))
        }
    }

    fn engine(feed: Arc<ScriptedFeed>) -> SyncEngine {
        let favourites = FavouritesStore::load(Arc::new(RecordingStore::default()));
        SyncEngine::new(feed, SyncState::new(favourites, 1), EngineTimings::default())
    }

    const POLL: Duration = Duration::from_secs(10);

    async fn shown_ids(engine: &SyncEngine) -> Vec<String> {
        let state = engine.state();
        let guard = state.read().await;
        let mut ids: Vec<String> = guard.snapshot().iter().map(|m| m.id.clone()).collect();
        ids.sort();
        ids
    }

    #[tokio::test(start_paused = true)]
    async fn arrived_marker_expires_after_highlight() {
        let feed = ScriptedFeed::new(
            vec![
                Ok(vec![sample("1", "2024-01-01T00:00:00Z")]),
                Ok(vec![
                    sample("1", "2024-01-01T00:00:00Z"),
                    sample("2", "2024-01-01T01:00:00Z"),
                ]),
            ],
            Duration::ZERO,
        );
        let mut engine = engine(feed.clone());
        engine.start(POLL);

        sleep(Duration::from_millis(1500)).await;
        assert!(engine.state().read().await.arrived().is_empty());

        sleep(Duration::from_millis(9000)).await; // t = 10.5s
        {
            let state = engine.state();
            let guard = state.read().await;
            assert!(guard.arrived().contains("2"));
            assert!(!guard.arrived().contains("1"));
        }

        sleep(Duration::from_millis(1000)).await; // t = 11.5s
        assert!(engine.state().read().await.arrived().is_empty());
        assert_eq!(shown_ids(&engine).await, vec!["1", "2"]);
        engine.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn departing_match_lingers_for_the_delay() {
        let feed = ScriptedFeed::new(
            vec![
                Ok(vec![sample("1", ""), sample("2", "")]),
                Ok(vec![sample("1", "")]),
            ],
            Duration::ZERO,
        );
        let mut engine = engine(feed);
        engine.start(POLL);

        sleep(Duration::from_millis(10_500)).await;
        {
            let state = engine.state();
            let guard = state.read().await;
            assert!(guard.departing().contains("2"));
        }
        assert_eq!(shown_ids(&engine).await, vec!["1", "2"]);

        sleep(Duration::from_millis(1000)).await;
        assert!(engine.state().read().await.departing().is_empty());
        assert_eq!(shown_ids(&engine).await, vec!["1"]);
        engine.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_ticks_are_skipped() {
        let feed = ScriptedFeed::new(vec![Ok(vec![sample("1", "")])], Duration::from_secs(25));
        let mut engine = engine(feed.clone());
        engine.start(POLL);

        // Ticks at 10s and 20s land while the first fetch (0s..25s) runs.
        sleep(Duration::from_secs(29)).await;
        assert_eq!(feed.calls(), 1);
        sleep(Duration::from_secs(6)).await;
        assert_eq!(feed.calls(), 2);
        engine.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failures_keep_the_loop_alive() {
        let feed = ScriptedFeed::new(
            vec![
                Ok(vec![sample("1", "")]),
                Err(FetchError::Network("connection refused".into())),
                Ok(vec![]),
                Ok(vec![sample("1", "")]),
            ],
            Duration::ZERO,
        );
        let mut engine = engine(feed);
        engine.start(POLL);

        sleep(Duration::from_millis(10_100)).await;
        {
            let state = engine.state();
            let guard = state.read().await;
            assert_eq!(guard.last_error(), Some("network error: connection refused"));
        }
        assert_eq!(shown_ids(&engine).await, vec!["1"]);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(
            engine.state().read().await.last_error(),
            Some(crate::sync::state::EMPTY_FEED_WARNING)
        );
        assert_eq!(shown_ids(&engine).await, vec!["1"]);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(engine.state().read().await.last_error(), None);
        assert!(engine.is_running());
        engine.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_polling() {
        let feed = ScriptedFeed::new(vec![Ok(vec![sample("1", "")])], Duration::ZERO);
        let mut engine = engine(feed.clone());
        engine.start(POLL);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(feed.calls(), 1);

        engine.stop().await;
        assert!(!engine.is_running());
        sleep(Duration::from_secs(60)).await;
        assert_eq!(feed.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_does_not_strand_departing_markers() {
        let feed = ScriptedFeed::new(
            vec![
                Ok(vec![sample("1", ""), sample("2", "")]),
                Ok(vec![sample("1", "")]),
            ],
            Duration::ZERO,
        );
        let mut engine = engine(feed);
        engine.start(POLL);

        sleep(Duration::from_millis(10_500)).await;
        assert!(engine.state().read().await.departing().contains("2"));

        engine.stop().await;
        {
            let state = engine.state();
            let guard = state.read().await;
            assert!(guard.departing().is_empty());
            assert!(guard.arrived().is_empty());
        }
        assert_eq!(shown_ids(&engine).await, vec!["1"]);

        engine.start(POLL);
        sleep(Duration::from_secs(60)).await;
        assert!(engine.state().read().await.departing().is_empty());
        assert_eq!(shown_ids(&engine).await, vec!["1"]);
        engine.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_is_a_no_op() {
        let feed = ScriptedFeed::new(vec![Ok(vec![sample("1", "")])], Duration::ZERO);
        let mut engine = engine(feed.clone());
        engine.start(POLL);
        engine.start(POLL);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(feed.calls(), 1);
        engine.stop().await;
    }
}
