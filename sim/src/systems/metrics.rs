//! Periodic loop health summary.
//!
//! Runs last in the tick. The first update always reports; later updates
//! report once per interval. A report whose measured TPS is below 90% of the
//! target also logs a warning.

use crate::error::SystemError;
use crate::players::PlayerRegistry;
use crate::ticker::{TickSystem, TickerHandle, TickerStats};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub const METRICS_PRIORITY: i32 = 200;

/// Fraction of the target TPS below which the loop is considered degraded.
pub const LOW_TPS_FRACTION: f64 = 0.9;

pub fn is_low_tps(actual_tps: f64, target_tps: u32) -> bool {
    actual_tps < f64::from(target_tps) * LOW_TPS_FRACTION
}

pub struct MetricsSystem {
    ticker: TickerHandle,
    players: Arc<PlayerRegistry>,
    interval: Duration,
    last_report: Option<Instant>,
    reports: u64,
    low_tps_alerts: u64,
}

impl MetricsSystem {
    pub fn new(ticker: TickerHandle, players: Arc<PlayerRegistry>, interval: Duration) -> Self {
        Self {
            ticker,
            players,
            interval,
            last_report: None,
            reports: 0,
            low_tps_alerts: 0,
        }
    }

    pub fn reports(&self) -> u64 {
        self.reports
    }

    pub fn low_tps_alerts(&self) -> u64 {
        self.low_tps_alerts
    }

    /// Log a summary if the interval has elapsed at `now`.
    pub fn report_if_due(&mut self, now: Instant) -> Option<TickerStats> {
        if let Some(last) = self.last_report {
            if now.saturating_duration_since(last) < self.interval {
                return None;
            }
        }
        self.last_report = Some(now);
        self.reports += 1;

        let stats = self.ticker.stats();
        info!(
            actual_tps = format_args!("{:.1}", stats.actual_tps),
            target_tps = stats.target_tps,
            players = self.players.len(),
            ticks = stats.tick_count,
            average_tick = ?stats.average_tick_time,
            "game metrics"
        );
        if is_low_tps(stats.actual_tps, stats.target_tps) {
            self.low_tps_alerts += 1;
            warn!(
                actual_tps = format_args!("{:.1}", stats.actual_tps),
                target_tps = stats.target_tps,
                "tick rate below target"
            );
        }
        Some(stats)
    }
}

impl TickSystem for MetricsSystem {
    fn update(&mut self, _delta_time: Duration) -> Result<(), SystemError> {
        self.report_if_due(Instant::now());
        Ok(())
    }

    fn name(&self) -> &str {
        "MetricsSystem"
    }

    fn priority(&self) -> i32 {
        METRICS_PRIORITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TickerConfig;
    use crate::ticker::GameTicker;
    use std::thread;

    fn system(ticker: &GameTicker, interval: Duration) -> MetricsSystem {
        MetricsSystem::new(ticker.handle(), Arc::new(PlayerRegistry::default()), interval)
    }

    #[test]
    fn test_low_tps_threshold() {
        assert!(is_low_tps(17.9, 20));
        assert!(!is_low_tps(18.0, 20));
        assert!(!is_low_tps(25.0, 20));
        assert!(is_low_tps(0.0, 1));
    }

    #[test]
    fn test_first_update_reports_then_waits_for_interval() {
        let ticker = GameTicker::new(&TickerConfig::with_tps(20));
        let mut metrics = system(&ticker, Duration::from_secs(3600));

        let now = Instant::now();
        let first = metrics.report_if_due(now).unwrap();
        assert_eq!(first.target_tps, 20);
        assert!(metrics.report_if_due(now + Duration::from_secs(60)).is_none());
        assert!(metrics.report_if_due(now + Duration::from_secs(3600)).is_some());
        assert_eq!(metrics.reports(), 2);
    }

    #[test]
    fn test_reports_every_tick_with_zero_interval() {
        let ticker = GameTicker::new(&TickerConfig::with_tps(20));
        let mut metrics = system(&ticker, Duration::ZERO);

        let now = Instant::now();
        ticker.execute_tick(now);
        ticker.execute_tick(now + Duration::from_millis(50));
        let stats = metrics.report_if_due(Instant::now()).unwrap();
        assert_eq!(stats.tick_count, 2);
        metrics.update(Duration::from_millis(50)).unwrap();
        assert_eq!(metrics.reports(), 2);
    }

    #[test]
    fn test_slow_loop_raises_low_tps_alert() {
        let ticker = GameTicker::new(&TickerConfig::with_tps(20));
        ticker.register_system(Box::new(system(&ticker, Duration::ZERO)));
        let mut watcher = system(&ticker, Duration::ZERO);

        // One tick after 200ms of uptime is 5 TPS against a target of 20.
        thread::sleep(Duration::from_millis(200));
        ticker.execute_tick(Instant::now());

        let stats = watcher.report_if_due(Instant::now()).unwrap();
        assert_eq!(stats.tick_count, 1);
        assert!(stats.actual_tps < 18.0);
        assert_eq!(watcher.low_tps_alerts(), 1);

        let own = ticker.system_metrics("MetricsSystem").unwrap();
        assert_eq!(own.total_executions, 1);
        assert_eq!(own.errors, 0);
    }

    #[test]
    fn test_fast_loop_stays_quiet() {
        let ticker = GameTicker::new(&TickerConfig::with_tps(20));
        let mut metrics = system(&ticker, Duration::ZERO);

        ticker.execute_tick(Instant::now());
        metrics.report_if_due(Instant::now()).unwrap();
        assert_eq!(metrics.low_tps_alerts(), 0);
    }
}
