//! Feed synchronizer.
//!
//! [`SyncMachine`] is the pure state machine: it owns the record window,
//! the highlight cursor and the derived overlay, and tells its driver what
//! to do next. [`SyncHandle::spawn`] runs it on a tokio task that owns the
//! tick timer and the single in-flight fetch, and publishes a
//! [`DashboardSnapshot`] after every transition.
//!
//! ```text
//! Idle -> Loading -(ok)-> Displaying -(exhausted tick)-> Refetching -(ok|err)-> Displaying
//!            \-(err)-> Failed [-(retry_after)-> Loading]
//! ```

use std::future::pending;
use std::num::NonZeroUsize;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, info, warn};

use crate::client::FeedSource;
use crate::cursor::HighlightCursor;
use crate::errors::FeedError;
use crate::overlay::{OverlayGeometry, project};
use crate::window::{DEFAULT_PAGE_SIZE, RecordWindow};

/// Highlight tick interval of the reference dashboard.
pub const DEFAULT_TICK_SECS: u64 = 8;

/// Synchronizer lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Loading,
    Displaying,
    Refetching,
    Failed,
}

impl SyncState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Displaying => "displaying",
            Self::Refetching => "refetching",
            Self::Failed => "failed",
        }
    }

    /// Whether a fetch is outstanding in this state.
    #[must_use]
    pub const fn is_fetching(self) -> bool {
        matches!(self, Self::Loading | Self::Refetching)
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the driver must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    None,
    /// Start a fetch; the machine is now Loading or Refetching
    Fetch,
    /// First window installed; (re)arm the tick timer
    ArmTicker,
}

/// Synchronizer settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub page_size: NonZeroUsize,
    pub tick_interval: Duration,
    /// Re-enter Loading this long after a failed initial load
    pub retry_after: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            tick_interval: Duration::from_secs(DEFAULT_TICK_SECS),
            retry_after: None,
        }
    }
}

/// Consistent view of window, cursor and overlay at one instant.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub state: SyncState,
    pub window: RecordWindow,
    pub cursor: usize,
    pub overlay: Arc<OverlayGeometry>,
    /// Bumped on every window replacement
    pub generation: u64,
    /// Last refetch failed; the window is the previous one
    pub stale: bool,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for DashboardSnapshot {
    fn default() -> Self {
        SyncMachine::new().snapshot()
    }
}

/// Pure synchronizer state. No I/O, no timers.
#[derive(Debug)]
pub struct SyncMachine {
    state: SyncState,
    window: RecordWindow,
    cursor: HighlightCursor,
    overlay: Arc<OverlayGeometry>,
    generation: u64,
    stale: bool,
    last_error: Option<String>,
}

impl Default for SyncMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMachine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SyncState::Idle,
            window: RecordWindow::empty(),
            cursor: HighlightCursor::new(),
            overlay: Arc::new(OverlayGeometry::default()),
            generation: 0,
            stale: false,
            last_error: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state
    }

    #[must_use]
    pub fn window(&self) -> &RecordWindow {
        &self.window
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor.position()
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Begin (or retry) the initial load.
    pub fn start(&mut self) -> Directive {
        match self.state {
            SyncState::Idle | SyncState::Failed => {
                self.transition(SyncState::Loading);
                Directive::Fetch
            }
            _ => Directive::None,
        }
    }

    /// Handle one timer tick.
    pub fn on_tick(&mut self) -> Directive {
        match self.state {
            SyncState::Displaying if self.stale => {
                self.transition(SyncState::Refetching);
                Directive::Fetch
            }
            SyncState::Displaying => {
                let step = self.cursor.advance(&self.window);
                if step.exhausted {
                    debug!("window exhausted at row {}", step.position);
                    self.transition(SyncState::Refetching);
                    Directive::Fetch
                } else {
                    Directive::None
                }
            }
            SyncState::Loading | SyncState::Refetching => {
                debug!("tick coalesced: fetch in flight");
                Directive::None
            }
            SyncState::Idle | SyncState::Failed => Directive::None,
        }
    }

    /// Apply the outcome of the outstanding fetch.
    pub fn on_fetch(&mut self, outcome: Result<RecordWindow, FeedError>) -> Directive {
        match (self.state, outcome) {
            (SyncState::Loading, Ok(window)) => {
                self.install(window);
                self.transition(SyncState::Displaying);
                Directive::ArmTicker
            }
            (SyncState::Loading, Err(e)) => {
                self.record_failure(&e);
                self.transition(SyncState::Failed);
                Directive::None
            }
            (SyncState::Refetching, Ok(window)) => {
                self.install(window);
                self.transition(SyncState::Displaying);
                Directive::None
            }
            (SyncState::Refetching, Err(e)) => {
                self.record_failure(&e);
                self.cursor.reset();
                self.stale = true;
                self.transition(SyncState::Displaying);
                Directive::None
            }
            (state, _) => {
                warn!("discarding fetch result received in state {}", state);
                Directive::None
            }
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            state: self.state,
            window: self.window.clone(),
            cursor: self.cursor.position(),
            overlay: Arc::clone(&self.overlay),
            generation: self.generation,
            stale: self.stale,
            last_error: self.last_error.clone(),
            updated_at: Utc::now(),
        }
    }

    /// Replace window, overlay and cursor together.
    fn install(&mut self, window: RecordWindow) {
        self.overlay = Arc::new(project(&window));
        self.window = window;
        self.cursor.reset();
        self.generation += 1;
        self.stale = false;
        self.last_error = None;
        info!(
            "installed window #{} with {} records",
            self.generation,
            self.window.len()
        );
    }

    fn record_failure(&mut self, error: &FeedError) {
        warn!(
            kind = error.kind().as_str(),
            "feed fetch failed, keeping {} records: {}",
            self.window.len(),
            error
        );
        self.last_error = Some(error.to_string());
    }

    fn transition(&mut self, next: SyncState) {
        debug!("sync state {} -> {}", self.state, next);
        self.state = next;
    }
}

/// Owner of a running synchronizer task.
///
/// Dropping the handle aborts the task; [`SyncHandle::shutdown`] stops it
/// and waits. Either way the tick timer and any in-flight fetch are
/// cancelled, so no late result is published.
#[derive(Debug)]
pub struct SyncHandle {
    snapshots: watch::Receiver<DashboardSnapshot>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    /// Start synchronizing `source` on the current tokio runtime.
    pub fn spawn<S: FeedSource>(source: S, config: SyncConfig) -> Self {
        let machine = SyncMachine::new();
        let (snapshots_tx, snapshots) = watch::channel(machine.snapshot());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let driver = Driver {
            source: Arc::new(source),
            config,
            machine,
            snapshots: snapshots_tx,
            ticker: None,
            in_flight: None,
            retry: None,
        };
        let task = tokio::spawn(driver.run(shutdown_rx));

        Self {
            snapshots,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// A receiver that sees every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshots.clone()
    }

    /// The latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Stop the synchronizer and wait for its task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("synchronizer task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

type FetchTask = JoinHandle<Result<RecordWindow, FeedError>>;

/// Task-side state: the machine plus the resources it schedules.
struct Driver<S> {
    source: Arc<S>,
    config: SyncConfig,
    machine: SyncMachine,
    snapshots: watch::Sender<DashboardSnapshot>,
    ticker: Option<Interval>,
    in_flight: Option<FetchTask>,
    retry: Option<Pin<Box<Sleep>>>,
}

impl<S: FeedSource> Driver<S> {
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let directive = self.machine.start();
        self.publish();
        self.apply(directive);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break,

                outcome = next_fetch(&mut self.in_flight) => {
                    self.in_flight = None;
                    let directive = self.machine.on_fetch(outcome);
                    self.publish();
                    self.apply(directive);

                    if self.machine.state() == SyncState::Failed {
                        if let Some(delay) = self.config.retry_after {
                            info!("retrying initial load in {:?}", delay);
                            self.retry = Some(Box::pin(time::sleep(delay)));
                        }
                    }
                }

                () = next_retry(&mut self.retry) => {
                    self.retry = None;
                    let directive = self.machine.start();
                    self.publish();
                    self.apply(directive);
                }

                _ = next_tick(&mut self.ticker) => {
                    let directive = self.machine.on_tick();
                    self.publish();
                    self.apply(directive);
                }
            }
        }

        debug!("synchronizer stopped in state {}", self.machine.state());
    }

    fn apply(&mut self, directive: Directive) {
        match directive {
            Directive::None => {}
            Directive::Fetch => {
                debug_assert!(self.in_flight.is_none(), "second fetch while one is in flight");
                let source = Arc::clone(&self.source);
                let page_size = self.config.page_size;
                self.in_flight = Some(tokio::spawn(async move { source.fetch(page_size).await }));
            }
            Directive::ArmTicker => {
                let period = self.config.tick_interval;
                let mut ticker = time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.ticker = Some(ticker);
            }
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.machine.snapshot());
    }
}

impl<S> Drop for Driver<S> {
    fn drop(&mut self) {
        // Dropping a JoinHandle detaches the task; the fetch must not outlive us.
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }
}

async fn next_fetch(slot: &mut Option<FetchTask>) -> Result<RecordWindow, FeedError> {
    match slot {
        Some(task) => task.await?,
        None => pending().await,
    }
}

async fn next_tick(slot: &mut Option<Interval>) -> Instant {
    match slot {
        Some(ticker) => ticker.tick().await,
        None => pending().await,
    }
}

async fn next_retry(slot: &mut Option<Pin<Box<Sleep>>>) {
    match slot {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::models::{SeismicRecord, fixtures};

    const TICK: Duration = Duration::from_secs(DEFAULT_TICK_SECS);

    /// Lands just after a tick so its effects have been processed.
    const SETTLE: Duration = Duration::from_millis(100);

    fn window(range: std::ops::Range<u32>) -> RecordWindow {
        RecordWindow::from_feed(fixtures::records(range), DEFAULT_PAGE_SIZE)
    }

    fn failure() -> FeedError {
        FeedError::Status {
            status: 503,
            message: "unavailable".into(),
        }
    }

    struct Step {
        delay: Duration,
        outcome: Result<Vec<SeismicRecord>, u16>,
    }

    /// Feed double that replays a fixed script and counts calls.
    #[derive(Clone, Default)]
    struct ScriptedSource {
        script: Arc<Mutex<VecDeque<Step>>>,
        calls: Arc<AtomicUsize>,
        completed: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn ok(self, range: std::ops::Range<u32>) -> Self {
            self.push(Duration::ZERO, Ok(fixtures::records(range)))
        }

        fn ok_after(self, delay: Duration, range: std::ops::Range<u32>) -> Self {
            self.push(delay, Ok(fixtures::records(range)))
        }

        fn fail(self, status: u16) -> Self {
            self.push(Duration::ZERO, Err(status))
        }

        fn push(self, delay: Duration, outcome: Result<Vec<SeismicRecord>, u16>) -> Self {
            self.script
                .lock()
                .unwrap()
                .push_back(Step { delay, outcome });
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn completed(&self) -> usize {
            self.completed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FeedSource for ScriptedSource {
        async fn fetch(&self, page_size: NonZeroUsize) -> Result<RecordWindow, FeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.script.lock().unwrap().pop_front();
            let Some(step) = step else {
                return Err(FeedError::Status {
                    status: 599,
                    message: "script exhausted".into(),
                });
            };
            if !step.delay.is_zero() {
                time::sleep(step.delay).await;
            }
            self.completed.fetch_add(1, Ordering::SeqCst);
            step.outcome
                .map(|rows| RecordWindow::from_feed(rows, page_size))
                .map_err(|status| FeedError::Status {
                    status,
                    message: "scripted failure".into(),
                })
        }
    }

    async fn displaying(handle: &SyncHandle) -> DashboardSnapshot {
        let mut rx = handle.subscribe();
        let snapshot = rx
            .wait_for(|s| s.state == SyncState::Displaying)
            .await
            .unwrap()
            .clone();
        snapshot
    }

    // ---- pure machine ----

    #[test]
    fn test_machine_initial_load() {
        let mut machine = SyncMachine::new();
        assert_eq!(machine.state(), SyncState::Idle);

        assert_eq!(machine.start(), Directive::Fetch);
        assert_eq!(machine.state(), SyncState::Loading);

        assert_eq!(machine.on_fetch(Ok(window(0..3))), Directive::ArmTicker);
        assert_eq!(machine.state(), SyncState::Displaying);
        assert_eq!(machine.window().len(), 3);
        assert_eq!(machine.cursor(), 0);

        let snapshot = machine.snapshot();
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.overlay.len(), 3);
    }

    #[test]
    fn test_machine_initial_failure_keeps_empty_window() {
        let mut machine = SyncMachine::new();
        machine.start();

        assert_eq!(machine.on_fetch(Err(failure())), Directive::None);
        assert_eq!(machine.state(), SyncState::Failed);
        assert!(machine.window().is_empty());

        // No ticker was armed, and stray ticks do nothing.
        assert_eq!(machine.on_tick(), Directive::None);
        assert_eq!(machine.state(), SyncState::Failed);

        let snapshot = machine.snapshot();
        assert!(snapshot.overlay.is_empty());
        assert!(snapshot.last_error.is_some());
    }

    #[test]
    fn test_machine_exhaustion_triggers_single_fetch() {
        let mut machine = SyncMachine::new();
        machine.start();
        machine.on_fetch(Ok(window(0..3)));

        assert_eq!(machine.on_tick(), Directive::None);
        assert_eq!(machine.cursor(), 1);

        assert_eq!(machine.on_tick(), Directive::Fetch);
        assert_eq!(machine.state(), SyncState::Refetching);
        assert_eq!(machine.cursor(), 2);

        // Ticks while the refetch is outstanding are coalesced.
        for _ in 0..3 {
            assert_eq!(machine.on_tick(), Directive::None);
        }
        assert_eq!(machine.cursor(), 2);
    }

    #[test]
    fn test_machine_refetch_success_replaces_window() {
        let mut machine = SyncMachine::new();
        machine.start();
        machine.on_fetch(Ok(window(0..3)));
        machine.on_tick();
        machine.on_tick();

        let fresh = window(100..110);
        assert_eq!(machine.on_fetch(Ok(fresh.clone())), Directive::None);
        assert_eq!(machine.state(), SyncState::Displaying);
        assert_eq!(machine.cursor(), 0);
        assert_eq!(machine.window(), &fresh);
        assert_eq!(machine.snapshot().generation, 2);
        assert_eq!(*machine.snapshot().overlay, project(&fresh));
    }

    #[test]
    fn test_machine_refetch_failure_keeps_window_and_resets_cursor() {
        let mut machine = SyncMachine::new();
        machine.start();
        let original = window(0..3);
        machine.on_fetch(Ok(original.clone()));
        machine.on_tick();
        machine.on_tick();

        machine.on_fetch(Err(failure()));
        assert_eq!(machine.state(), SyncState::Displaying);
        assert_eq!(machine.cursor(), 0);
        assert_eq!(machine.window(), &original);
        assert!(machine.is_stale());

        // Next tick retries instead of walking the stale window.
        assert_eq!(machine.on_tick(), Directive::Fetch);
        assert_eq!(machine.cursor(), 0);
        assert_eq!(machine.state(), SyncState::Refetching);
    }

    #[test]
    fn test_machine_discards_unexpected_result() {
        let mut machine = SyncMachine::new();
        assert_eq!(machine.on_fetch(Ok(window(0..3))), Directive::None);
        assert_eq!(machine.state(), SyncState::Idle);
        assert!(machine.window().is_empty());
    }

    #[test]
    fn test_machine_start_only_from_idle_or_failed() {
        let mut machine = SyncMachine::new();
        machine.start();
        assert_eq!(machine.start(), Directive::None);

        machine.on_fetch(Err(failure()));
        assert_eq!(machine.start(), Directive::Fetch);
        assert_eq!(machine.state(), SyncState::Loading);
    }

    // ---- driver on virtual time ----

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_three_records() {
        let source = ScriptedSource::default().ok(0..3).ok(10..12);
        let handle = SyncHandle::spawn(source.clone(), SyncConfig::default());

        let first = displaying(&handle).await;
        assert_eq!(first.window.len(), 3);
        assert_eq!(first.cursor, 0);
        assert_eq!(first.generation, 1);

        time::sleep(TICK + SETTLE).await;
        let after_one = handle.snapshot();
        assert_eq!(after_one.cursor, 1);
        assert_eq!(source.calls(), 1);

        // With three rows the second tick exhausts the window.
        time::sleep(TICK).await;
        let after_two = handle.snapshot();
        assert_eq!(source.calls(), 2);
        assert_eq!(after_two.state, SyncState::Displaying);
        assert_eq!(after_two.generation, 2);
        assert_eq!(after_two.cursor, 0);
        assert_eq!(after_two.window.len(), 2);
        assert_eq!(after_two.overlay.len(), 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_tick_for_several_lengths() {
        for (len, expected) in [(2u32, Some(1usize)), (3, Some(2)), (19, Some(18)), (1, None)] {
            let source = ScriptedSource::default().ok(0..len).ok(0..len);
            let handle = SyncHandle::spawn(source.clone(), SyncConfig::default());
            displaying(&handle).await;
            time::sleep(SETTLE).await;

            let mut refetched_at = None;
            for tick in 1..=25 {
                time::sleep(TICK).await;
                if source.calls() == 2 {
                    refetched_at = Some(tick);
                    break;
                }
            }
            assert_eq!(refetched_at, expected, "len={len}");
            handle.shutdown().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_failure_arms_nothing() {
        let source = ScriptedSource::default().fail(500).ok(0..3);
        let handle = SyncHandle::spawn(source.clone(), SyncConfig::default());

        let mut rx = handle.subscribe();
        rx.wait_for(|s| s.state == SyncState::Failed).await.unwrap();

        time::sleep(TICK * 10).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.state, SyncState::Failed);
        assert!(snapshot.window.is_empty());
        assert!(snapshot.overlay.is_empty());
        assert_eq!(snapshot.cursor, 0);
        assert_eq!(source.calls(), 1);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_failure_with_retry() {
        let source = ScriptedSource::default().fail(500).ok(0..4);
        let config = SyncConfig {
            retry_after: Some(Duration::from_secs(30)),
            ..SyncConfig::default()
        };
        let handle = SyncHandle::spawn(source.clone(), config);

        let snapshot = displaying(&handle).await;
        assert_eq!(snapshot.window.len(), 4);
        assert_eq!(source.calls(), 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_mid_session_failure_retains_window_then_retries() {
        let source = ScriptedSource::default().ok(0..3).fail(502).ok(50..55);
        let handle = SyncHandle::spawn(source.clone(), SyncConfig::default());
        let first = displaying(&handle).await;

        time::sleep(TICK * 2 + SETTLE).await;
        let failed = handle.snapshot();
        assert_eq!(source.calls(), 2);
        assert_eq!(failed.state, SyncState::Displaying);
        assert_eq!(failed.cursor, 0);
        assert_eq!(failed.window, first.window);
        assert_eq!(failed.generation, 1);
        assert!(failed.stale);
        assert!(failed.last_error.is_some());

        // Next tick re-attempts the fetch rather than advancing.
        time::sleep(TICK).await;
        let recovered = handle.snapshot();
        assert_eq!(source.calls(), 3);
        assert_eq!(recovered.window.len(), 5);
        assert_eq!(recovered.cursor, 0);
        assert_eq!(recovered.generation, 2);
        assert!(!recovered.stale);
        assert!(recovered.last_error.is_none());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_coalesced_while_refetching() {
        let slow = Duration::from_secs(20);
        let source = ScriptedSource::default()
            .ok(0..2)
            .ok_after(slow, 10..12)
            .ok(20..22);
        let handle = SyncHandle::spawn(source.clone(), SyncConfig::default());
        displaying(&handle).await;

        // Tick 1 exhausts; the refetch takes 20s and spans two more ticks.
        time::sleep(TICK + SETTLE).await;
        assert_eq!(handle.snapshot().state, SyncState::Refetching);
        assert_eq!(handle.snapshot().cursor, 1);

        time::sleep(TICK * 2).await;
        let pending = handle.snapshot();
        assert_eq!(pending.state, SyncState::Refetching);
        assert_eq!(pending.generation, 1);
        assert_eq!(source.calls(), 2);

        // Refetch lands at 28s.
        time::sleep(Duration::from_secs(5)).await;
        let landed = handle.snapshot();
        assert_eq!(landed.state, SyncState::Displaying);
        assert_eq!(landed.generation, 2);
        assert_eq!(landed.cursor, 0);
        assert_eq!(source.calls(), 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_discards_in_flight_fetch() {
        let source = ScriptedSource::default()
            .ok(0..2)
            .ok_after(Duration::from_secs(20), 10..15);
        let handle = SyncHandle::spawn(source.clone(), SyncConfig::default());
        displaying(&handle).await;

        time::sleep(TICK + SETTLE).await;
        assert_eq!(handle.snapshot().state, SyncState::Refetching);

        let mut rx = handle.subscribe();
        let _ = rx.borrow_and_update();
        handle.shutdown().await;

        time::sleep(TICK * 5).await;
        assert!(rx.changed().await.is_err(), "no snapshot after teardown");
        let last = rx.borrow().clone();
        assert_eq!(last.window.len(), 2);
        assert_eq!(last.generation, 1);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timer() {
        let source = ScriptedSource::default().ok(0..2).ok(0..2).ok(0..2);
        let handle = SyncHandle::spawn(source.clone(), SyncConfig::default());
        displaying(&handle).await;
        let mut rx = handle.subscribe();

        drop(handle);
        time::sleep(TICK * 5).await;

        while rx.changed().await.is_ok() {}
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_in_flight_fetch() {
        let source = ScriptedSource::default()
            .ok(0..2)
            .ok_after(Duration::from_secs(20), 0..2);
        let handle = SyncHandle::spawn(source.clone(), SyncConfig::default());
        displaying(&handle).await;

        time::sleep(TICK + SETTLE).await;
        assert_eq!(handle.snapshot().state, SyncState::Refetching);
        assert_eq!(source.calls(), 2);

        drop(handle);
        time::sleep(Duration::from_secs(30)).await;

        assert_eq!(source.completed(), 1, "refetch ran to completion after drop");
    }
}
