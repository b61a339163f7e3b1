//! Fixed-rate tick scheduler.
//!
//! [`GameTicker`] fires on a fixed clock and runs every registered
//! [`TickSystem`] once per tick, sequentially, in ascending priority order.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --start--> Running <--pause/resume--> Paused
//!                    |                          |
//!                    +----------stop------------+--> Stopped (terminal)
//! ```
//!
//! The loop lives on its own thread driving a single-threaded tokio runtime:
//! it waits on the tick interval, the pause channel and the shutdown signal.
//! A paused loop blocks on the pause channel until resumed or stopped.
//!
//! ## Timing
//!
//! - `deltaTime` passed to systems is the real wall-clock gap since the
//!   previous tick. There are no catch-up ticks; a gap larger than twice the
//!   nominal tick is counted as a skipped tick.
//! - Total tick time feeds a 9:1 smoothed average and a running maximum.
//!   Ticks slower than half the nominal duration are logged as slow; ticks
//!   slower than twice the nominal duration are logged as critical overruns.
//!
//! ## Fault isolation
//!
//! A system that returns an error or panics is logged and its error counter
//! is bumped. The remaining systems still run and the loop keeps ticking.
//!
//! Systems must not register new systems from inside `update`; registration
//! waits for the running tick to finish. Reading stats through a
//! [`TickerHandle`] is safe from inside `update`.

use crate::config::TickerConfig;
use crate::error::{SystemError, TickerError};
use crate::monitor::{PerfLevel, PerformanceMonitor, SystemMetrics};
use serde::Serialize;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// A unit of game logic driven by the scheduler.
pub trait TickSystem: Send {
    /// Advance by `delta_time`, the real time since the previous tick.
    fn update(&mut self, delta_time: Duration) -> Result<(), SystemError>;

    fn name(&self) -> &str;

    /// Lower values run earlier within a tick.
    fn priority(&self) -> i32;
}

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TickerState {
    /// Constructed, never started.
    Idle,
    Running,
    Paused,
    /// Terminal.
    Stopped,
}

/// Snapshot returned by [`GameTicker::stats`] and [`TickerHandle::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct TickerStats {
    pub target_tps: u32,
    /// Ticks executed divided by wall time since start.
    pub actual_tps: f64,
    pub tick_count: u64,
    pub uptime_seconds: f64,
    pub average_tick_time: Duration,
    pub max_observed_tick: Duration,
    pub skipped_ticks: u64,
    /// Ticks whose total time exceeded the critical maximum.
    pub overrun_ticks: u64,
    pub is_running: bool,
    pub is_paused: bool,
    pub systems_count: usize,
    pub systems: Vec<SystemMetrics>,
}

impl TickerStats {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A system plus the name and priority captured at registration.
struct RegisteredSystem {
    name: String,
    priority: i32,
    system: Box<dyn TickSystem>,
}

struct TickTiming {
    tick_count: u64,
    start_time: Instant,
    last_tick_time: Instant,
    average_tick_time: Duration,
    max_observed_tick: Duration,
    skipped_ticks: u64,
    overrun_ticks: u64,
}

/// State shared between the public handle and the loop thread.
struct Shared {
    target_tps: u32,
    tick_duration: Duration,
    max_tick_time: Duration,
    warning_threshold: Duration,
    systems: Mutex<Vec<RegisteredSystem>>,
    /// (name, priority) in execution order; readable while a tick runs.
    order: RwLock<Vec<(String, i32)>>,
    monitor: RwLock<PerformanceMonitor>,
    timing: Mutex<TickTiming>,
    state: Mutex<TickerState>,
}

struct LoopHandle {
    shutdown: watch::Sender<bool>,
    pause: mpsc::UnboundedSender<bool>,
    thread: JoinHandle<()>,
}

/// Fixed-rate game loop.
pub struct GameTicker {
    shared: Arc<Shared>,
    handle: Mutex<Option<LoopHandle>>,
}

/// Read-only view of a ticker's statistics that systems can hold.
#[derive(Clone)]
pub struct TickerHandle {
    shared: Arc<Shared>,
}

impl TickerHandle {
    pub fn stats(&self) -> TickerStats {
        self.shared.stats()
    }

    pub fn tick_count(&self) -> u64 {
        lock(&self.shared.timing).tick_count
    }

    pub fn target_tps(&self) -> u32 {
        self.shared.target_tps
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(rw: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rw.read().unwrap_or_else(PoisonError::into_inner)
}

impl Default for GameTicker {
    fn default() -> Self {
        Self::new(&TickerConfig::default())
    }
}

impl GameTicker {
    pub fn new(config: &TickerConfig) -> Self {
        let now = Instant::now();
        let shared = Shared {
            target_tps: config.effective_tps(),
            tick_duration: config.tick_duration(),
            max_tick_time: config.max_tick_time(),
            warning_threshold: config.warning_threshold(),
            systems: Mutex::new(Vec::new()),
            order: RwLock::new(Vec::new()),
            monitor: RwLock::new(PerformanceMonitor::new(
                config.metrics_window,
                config.system_warning_threshold(),
            )),
            timing: Mutex::new(TickTiming {
                tick_count: 0,
                start_time: now,
                last_tick_time: now,
                average_tick_time: Duration::ZERO,
                max_observed_tick: Duration::ZERO,
                skipped_ticks: 0,
                overrun_ticks: 0,
            }),
            state: Mutex::new(TickerState::Idle),
        };

        Self {
            shared: Arc::new(shared),
            handle: Mutex::new(None),
        }
    }

    pub fn tick_duration(&self) -> Duration {
        self.shared.tick_duration
    }

    /// A cloneable stats reader sharing this ticker's state.
    pub fn handle(&self) -> TickerHandle {
        TickerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Add a system and keep the list sorted by ascending priority.
    /// Systems with equal priority run in registration order.
    pub fn register_system(&self, system: Box<dyn TickSystem>) {
        let name = system.name().to_string();
        let priority = system.priority();

        {
            let mut systems = lock(&self.shared.systems);
            systems.push(RegisteredSystem {
                name: name.clone(),
                priority,
                system,
            });
            let mut i = systems.len() - 1;
            while i > 0 && systems[i].priority < systems[i - 1].priority {
                systems.swap(i, i - 1);
                i -= 1;
            }

            let mut order = self.shared.order.write().unwrap_or_else(PoisonError::into_inner);
            *order = systems
                .iter()
                .map(|s| (s.name.clone(), s.priority))
                .collect();
        }

        let mut monitor = self.shared.monitor.write().unwrap_or_else(PoisonError::into_inner);
        if monitor.metrics(&name).is_some() {
            warn!(system = %name, "system name already registered; metrics are shared");
        }
        monitor.register(&name);

        info!(system = %name, priority, "registered tick system");
    }

    /// Launch the tick loop on a dedicated thread.
    ///
    /// Starting a running ticker is a no-op; starting a stopped one fails.
    #[instrument(skip(self), fields(tps = self.shared.target_tps))]
    pub fn start(&self) -> Result<(), TickerError> {
        let mut state = lock(&self.shared.state);
        match *state {
            TickerState::Running | TickerState::Paused => return Ok(()),
            TickerState::Stopped => return Err(TickerError::AlreadyStopped),
            TickerState::Idle => {}
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(TickerError::Runtime)?;

        {
            let now = Instant::now();
            let mut timing = lock(&self.shared.timing);
            timing.start_time = now;
            timing.last_tick_time = now;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (pause_tx, pause_rx) = mpsc::unbounded_channel();
        let shared = Arc::clone(&self.shared);

        let thread = thread::Builder::new()
            .name("game-ticker".to_string())
            .spawn(move || runtime.block_on(run_loop(shared, pause_rx, shutdown_rx)))
            .map_err(TickerError::Spawn)?;

        *lock(&self.handle) = Some(LoopHandle {
            shutdown: shutdown_tx,
            pause: pause_tx,
            thread,
        });
        *state = TickerState::Running;

        info!(
            tick_duration = ?self.shared.tick_duration,
            "game loop started"
        );
        Ok(())
    }

    /// Cancel the loop permanently. Waits for an in-flight tick to finish
    /// unless called from the loop thread itself.
    pub fn stop(&self) {
        {
            let mut state = lock(&self.shared.state);
            if !matches!(*state, TickerState::Running | TickerState::Paused) {
                return;
            }
            *state = TickerState::Stopped;
        }

        let handle = lock(&self.handle).take();
        info!(ticks = self.tick_count(), "stopping game loop");

        if let Some(handle) = handle {
            shutdown_loop(handle);
        }
    }

    /// Suspend ticking. Only meaningful while running.
    pub fn pause(&self) {
        let mut state = lock(&self.shared.state);
        if *state != TickerState::Running {
            return;
        }
        *state = TickerState::Paused;
        self.send_pause(true);
        info!("game loop paused");
    }

    /// Resume a paused loop.
    pub fn resume(&self) {
        let mut state = lock(&self.shared.state);
        if *state != TickerState::Paused {
            return;
        }
        *state = TickerState::Running;
        self.send_pause(false);
        info!("game loop resumed");
    }

    fn send_pause(&self, paused: bool) {
        if let Some(handle) = lock(&self.handle).as_ref() {
            if handle.pause.send(paused).is_err() {
                warn!(paused, "tick loop is gone; pause signal dropped");
            }
        }
    }

    pub fn state(&self) -> TickerState {
        *lock(&self.shared.state)
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state(), TickerState::Running | TickerState::Paused)
    }

    pub fn is_paused(&self) -> bool {
        self.state() == TickerState::Paused
    }

    /// Run one tick synchronously as if the timer fired at `tick_time`.
    ///
    /// Used for headless stepping and tests; the background loop calls the
    /// same code path.
    pub fn execute_tick(&self, tick_time: Instant) {
        self.shared.execute_tick(tick_time);
    }

    pub fn tick_count(&self) -> u64 {
        lock(&self.shared.timing).tick_count
    }

    /// System names in execution order.
    pub fn system_names(&self) -> Vec<String> {
        read(&self.shared.order)
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn system_metrics(&self, name: &str) -> Option<SystemMetrics> {
        read(&self.shared.monitor).metrics(name).cloned()
    }

    pub fn stats(&self) -> TickerStats {
        self.shared.stats()
    }

    /// Dump loop and per-system statistics to the log.
    pub fn log_detailed_stats(&self) {
        let stats = self.stats();
        info!(
            target_tps = stats.target_tps,
            actual_tps = format_args!("{:.2}", stats.actual_tps),
            ticks = stats.tick_count,
            uptime_s = format_args!("{:.1}", stats.uptime_seconds),
            "game loop statistics"
        );
        info!(
            average = ?stats.average_tick_time,
            max = ?stats.max_observed_tick,
            skipped = stats.skipped_ticks,
            overruns = stats.overrun_ticks,
            "tick timing"
        );
        for m in &stats.systems {
            info!(
                system = %m.name,
                average = ?m.average_time,
                max = ?m.max_time,
                executions = m.total_executions,
                errors = m.errors,
                "system timing"
            );
        }
    }
}

impl Drop for GameTicker {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.handle).take() {
            shutdown_loop(handle);
        }
    }
}

fn shutdown_loop(handle: LoopHandle) {
    // The receiver may already be gone if the loop exited on its own.
    let _ = handle.shutdown.send(true);
    if handle.thread.thread().id() == thread::current().id() {
        return;
    }
    if handle.thread.join().is_err() {
        error!("tick loop thread panicked");
    }
}

impl Shared {
    fn stats(&self) -> TickerStats {
        let (tick_count, uptime, average, max, skipped, overrun) = {
            let timing = lock(&self.timing);
            (
                timing.tick_count,
                timing.start_time.elapsed(),
                timing.average_tick_time,
                timing.max_observed_tick,
                timing.skipped_ticks,
                timing.overrun_ticks,
            )
        };
        let state = *lock(&self.state);
        let systems_count = read(&self.order).len();
        let systems = read(&self.monitor).snapshot();

        let uptime_seconds = uptime.as_secs_f64();
        let actual_tps = if uptime_seconds > 0.0 {
            tick_count as f64 / uptime_seconds
        } else {
            0.0
        };

        TickerStats {
            target_tps: self.target_tps,
            actual_tps,
            tick_count,
            uptime_seconds,
            average_tick_time: average,
            max_observed_tick: max,
            skipped_ticks: skipped,
            overrun_ticks: overrun,
            is_running: matches!(state, TickerState::Running | TickerState::Paused),
            is_paused: state == TickerState::Paused,
            systems_count,
            systems,
        }
    }

    fn execute_tick(&self, tick_time: Instant) {
        let tick_start = Instant::now();

        let delta_time = {
            let mut timing = lock(&self.timing);
            let delta = tick_time.saturating_duration_since(timing.last_tick_time);
            if delta > self.tick_duration * 2 {
                warn!(
                    gap = ?delta,
                    expected = ?self.tick_duration,
                    "large gap between ticks"
                );
                timing.skipped_ticks += 1;
            }
            timing.tick_count += 1;
            timing.last_tick_time = tick_time;
            delta
        };

        self.execute_all_systems(delta_time);

        let total = tick_start.elapsed();
        self.update_tick_metrics(total);
        self.check_performance(total);
    }

    fn execute_all_systems(&self, delta_time: Duration) {
        let mut systems = lock(&self.systems);
        for entry in systems.iter_mut() {
            self.execute_system(entry, delta_time);
        }
    }

    fn execute_system(&self, entry: &mut RegisteredSystem, delta_time: Duration) {
        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| entry.system.update(delta_time)));
        let elapsed = started.elapsed();

        let mut monitor = self.monitor.write().unwrap_or_else(PoisonError::into_inner);
        match outcome {
            Ok(Ok(())) => {
                monitor.record_execution(&entry.name, elapsed);
                match monitor.classify(elapsed) {
                    PerfLevel::Critical => error!(
                        system = %entry.name,
                        elapsed = ?elapsed,
                        "system is running very slowly"
                    ),
                    PerfLevel::Warning => warn!(
                        system = %entry.name,
                        elapsed = ?elapsed,
                        "system is running slowly"
                    ),
                    PerfLevel::Normal => {}
                }
            }
            Ok(Err(err)) => {
                monitor.record_execution(&entry.name, elapsed);
                monitor.record_error(&entry.name);
                error!(system = %entry.name, error = %err, "system update failed");
            }
            Err(payload) => {
                monitor.record_error(&entry.name);
                error!(
                    system = %entry.name,
                    panic = %panic_message(payload.as_ref()),
                    "system panicked during update"
                );
            }
        }
    }

    fn update_tick_metrics(&self, tick_time: Duration) {
        let mut timing = lock(&self.timing);
        timing.max_observed_tick = timing.max_observed_tick.max(tick_time);
        timing.average_tick_time = if timing.average_tick_time.is_zero() {
            tick_time
        } else {
            (timing.average_tick_time * 9 + tick_time) / 10
        };
        if tick_time > self.max_tick_time {
            timing.overrun_ticks += 1;
        }
    }

    fn check_performance(&self, tick_time: Duration) {
        if tick_time > self.max_tick_time {
            error!(
                tick_time = ?tick_time,
                max = ?self.max_tick_time,
                target = ?self.tick_duration,
                "tick exceeded maximum duration"
            );
        } else if tick_time > self.warning_threshold {
            warn!(
                tick_time = ?tick_time,
                target = ?self.tick_duration,
                "slow tick"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[instrument(name = "tick_loop", skip_all)]
async fn run_loop(
    shared: Arc<Shared>,
    mut pause_rx: mpsc::UnboundedReceiver<bool>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let period = shared.tick_duration;
    let mut interval = time::interval_at(time::Instant::now() + period, period);
    // A late timer fires once; no burst of catch-up ticks.
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            Some(paused) = pause_rx.recv() => {
                if paused && !wait_for_resume(&mut pause_rx, &mut shutdown_rx).await {
                    break;
                }
            }
            fired = interval.tick() => shared.execute_tick(fired.into_std()),
        }
    }

    debug!("tick loop exited");
}

/// Block until resumed (`true`) or cancelled (`false`).
async fn wait_for_resume(
    pause_rx: &mut mpsc::UnboundedReceiver<bool>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> bool {
    debug!("tick loop waiting for resume");
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => return false,
            signal = pause_rx.recv() => match signal {
                Some(false) => return true,
                Some(true) => continue,
                None => return false,
            },
        }
    }
}
