//! Startup configuration for the scheduler, collider and gameplay systems.
//!
//! A single [`SimConfig`] value is built once and handed to every constructor.
//! Nothing in the crate reads configuration from globals.
//!
//! Durations are written as integer milliseconds in JSON:
//!
//! ```json
//! { "ticker": { "target_tps": 30 }, "food": { "max_age": 30000 } }
//! ```
//!
//! Missing fields fall back to their defaults.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Fallback tick rate when a non-positive TPS is configured.
pub const DEFAULT_TPS: u32 = 20;

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub ticker: TickerConfig,
    pub collider: ColliderConfig,
    pub food: FoodConfig,
    pub player: PlayerConfig,
}

/// Tick scheduler tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TickerConfig {
    /// Target ticks per second. Zero falls back to [`DEFAULT_TPS`].
    pub target_tps: u32,
    /// Number of samples kept per system for the rolling average.
    pub metrics_window: usize,
    /// Fraction of the tick duration after which a single system is slow.
    pub system_warning_fraction: f64,
    /// How often the metrics system logs a loop summary.
    #[serde(with = "duration_ms")]
    pub metrics_interval: Duration,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            target_tps: DEFAULT_TPS,
            metrics_window: 50,
            system_warning_fraction: 0.25,
            metrics_interval: Duration::from_secs(30),
        }
    }
}

impl TickerConfig {
    pub fn with_tps(target_tps: u32) -> Self {
        Self {
            target_tps,
            ..Default::default()
        }
    }

    /// Effective TPS after applying the fallback.
    pub fn effective_tps(&self) -> u32 {
        if self.target_tps == 0 {
            DEFAULT_TPS
        } else {
            self.target_tps
        }
    }

    /// Nominal duration of one tick (1s / TPS).
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs(1) / self.effective_tps()
    }

    /// Tick time beyond which an overrun is critical (2x nominal).
    pub fn max_tick_time(&self) -> Duration {
        self.tick_duration() * 2
    }

    /// Tick time beyond which a tick is reported as slow (0.5x nominal).
    pub fn warning_threshold(&self) -> Duration {
        self.tick_duration() / 2
    }

    /// Per-system warning threshold; the critical threshold is double this.
    pub fn system_warning_threshold(&self) -> Duration {
        let nanos = self.tick_duration().as_nanos() as f64 * self.system_warning_fraction.max(0.0);
        Duration::from_nanos(nanos.round() as u64)
    }
}

/// Broad-phase grid tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColliderConfig {
    /// Edge length of one grid cell in world units.
    pub cell_size: f64,
}

impl Default for ColliderConfig {
    fn default() -> Self {
        // Objects range from 0.3 to a few units; 5.0 keeps most in one cell.
        Self { cell_size: 5.0 }
    }
}

/// One entry of the weighted food table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodCategory {
    pub name: String,
    pub radius: f64,
    /// Nutrient value added to the eater's mass.
    pub mass: f64,
    /// Relative spawn weight.
    pub weight: u32,
    pub color: String,
}

impl FoodCategory {
    pub fn new(name: &str, radius: f64, mass: f64, weight: u32, color: &str) -> Self {
        Self {
            name: name.to_string(),
            radius,
            mass,
            weight,
            color: color.to_string(),
        }
    }
}

/// Default category table. Weights sum to 100.
pub fn default_food_categories() -> Vec<FoodCategory> {
    vec![
        FoodCategory::new("basic", 0.3, 1.0, 70, "#90EE90"),
        FoodCategory::new("medium", 0.5, 3.0, 20, "#FFD700"),
        FoodCategory::new("large", 0.8, 8.0, 8, "#FF6347"),
        FoodCategory::new("rare", 1.0, 20.0, 2, "#9370DB"),
    ]
}

/// Food spawning, falling and expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FoodConfig {
    /// Population cap.
    pub max_food: usize,
    /// Items spawned at once when the world is built.
    pub initial_food: usize,
    #[serde(with = "duration_ms")]
    pub spawn_interval: Duration,
    /// Food spawns uniformly by angle within this distance of the origin.
    pub spawn_radius: f64,
    pub spawn_height: f64,
    pub ground_level: f64,
    pub gravity: f64,
    /// Food older than this is purged even if nobody ate it.
    #[serde(with = "duration_ms")]
    pub max_age: Duration,
    pub categories: Vec<FoodCategory>,
    /// RNG seed; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for FoodConfig {
    fn default() -> Self {
        Self {
            max_food: 100,
            initial_food: 0,
            spawn_interval: Duration::from_millis(500),
            spawn_radius: 500.0,
            spawn_height: 20.0,
            ground_level: 1.0,
            gravity: 9.8,
            max_age: Duration::from_secs(60),
            categories: default_food_categories(),
            seed: None,
        }
    }
}

impl FoodConfig {
    pub fn total_weight(&self) -> u32 {
        self.categories.iter().map(|c| c.weight).sum()
    }
}

/// Player defaults and lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub default_radius: f64,
    pub default_mass: f64,
    /// Players not seen for this long are removed.
    #[serde(with = "duration_ms")]
    pub inactive_timeout: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_radius: 1.0,
            default_mass: 1.0,
            inactive_timeout: Duration::from_secs(5 * 60),
        }
    }
}

impl SimConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Reject values that would break the grid math or the spawn draw.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.collider.cell_size.is_finite() && self.collider.cell_size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "collider.cell_size must be positive, got {}",
                self.collider.cell_size
            )));
        }
        if self.ticker.metrics_window == 0 {
            return Err(ConfigError::Invalid(
                "ticker.metrics_window must be at least 1".to_string(),
            ));
        }
        if self.food.categories.is_empty() {
            return Err(ConfigError::Invalid(
                "food.categories must not be empty".to_string(),
            ));
        }
        if self.food.total_weight() == 0 {
            return Err(ConfigError::Invalid(
                "food.categories weights must sum to a positive value".to_string(),
            ));
        }
        if let Some(bad) = self.food.categories.iter().find(|c| c.radius < 0.0) {
            return Err(ConfigError::Invalid(format!(
                "food category {} has negative radius",
                bad.name
            )));
        }
        if self.player.default_radius < 0.0 {
            return Err(ConfigError::Invalid(
                "player.default_radius must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serialize a `Duration` as whole milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_tick_thresholds() {
        let config = TickerConfig::with_tps(20);
        assert_eq!(config.tick_duration(), Duration::from_millis(50));
        assert_eq!(config.max_tick_time(), Duration::from_millis(100));
        assert_eq!(config.warning_threshold(), Duration::from_millis(25));
        assert_eq!(config.system_warning_threshold(), Duration::from_micros(12_500));
    }

    #[test]
    fn test_zero_tps_falls_back() {
        let config = TickerConfig::with_tps(0);
        assert_eq!(config.effective_tps(), DEFAULT_TPS);
        assert_eq!(config.tick_duration(), Duration::from_millis(50));
    }

    #[test]
    fn test_default_weights_sum_to_hundred() {
        assert_eq!(FoodConfig::default().total_weight(), 100);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SimConfig::from_json_str(
            r#"{ "ticker": { "target_tps": 30 }, "food": { "max_age": 1500 } }"#,
        )
        .unwrap();
        assert_eq!(config.ticker.target_tps, 30);
        assert_eq!(config.ticker.metrics_window, 50);
        assert_eq!(config.ticker.metrics_interval, Duration::from_secs(30));
        assert_eq!(config.food.max_age, Duration::from_millis(1500));
        assert_eq!(config.collider.cell_size, 5.0);
    }

    #[test]
    fn test_validate_rejects_bad_cell_size() {
        let err = SimConfig::from_json_str(r#"{ "collider": { "cell_size": 0.0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_validate_rejects_zero_weights() {
        let mut config = SimConfig::default();
        for category in &mut config.food.categories {
            category.weight = 0;
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip_keeps_millis() {
        let config = SimConfig::default();
        let json = config.to_json_pretty().unwrap();
        assert!(json.contains("\"spawn_interval\": 500"));
        let parsed = SimConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed.player.inactive_timeout, Duration::from_secs(300));
    }
}
