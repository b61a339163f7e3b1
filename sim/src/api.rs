//! Public API for the simulation.
//!
//! [`SimWorld`] wires one [`SimConfig`] into the collider, the player and
//! food tables, the gameplay systems and the [`GameTicker`], and gives a
//! networking or CLI layer a single handle to drive and observe the world.
//!
//! ## Driving the Loop
//!
//! - `start`/`pause`/`resume`/`stop` run the fixed-rate loop on its own thread.
//! - `step` runs exactly one tick on the caller's thread for headless use.
//!   Mixing the two is allowed; ticks never overlap.

use crate::collider::ColliderDispatcher;
use crate::config::SimConfig;
use crate::error::{ConfigError, TickerError};
use crate::food::FoodStore;
use crate::players::{Player, PlayerRegistry};
use crate::systems::{CollisionManagerSystem, FoodSystem, MetricsSystem, PlayerManagementSystem};
use crate::ticker::{GameTicker, TickSystem, TickerStats};
use crate::world::Snapshot;
use glam::DVec3;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// The main simulation world container.
pub struct SimWorld {
    config: SimConfig,
    ticker: GameTicker,
    collider: Arc<ColliderDispatcher>,
    players: Arc<PlayerRegistry>,
    food: Arc<FoodStore>,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    /// Create a world with the default configuration.
    pub fn new() -> Self {
        Self::build(SimConfig::default())
    }

    /// Validate `config` and build a world from it.
    pub fn with_config(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SimConfig) -> Self {
        let collider = Arc::new(ColliderDispatcher::new(config.collider.cell_size));
        let players = Arc::new(PlayerRegistry::new(&config.player));
        let food = Arc::new(FoodStore::new());
        let ticker = GameTicker::new(&config.ticker);

        ticker.register_system(Box::new(PlayerManagementSystem::new(
            Arc::clone(&players),
            Arc::clone(&collider),
            config.player.inactive_timeout,
        )));
        ticker.register_system(Box::new(CollisionManagerSystem::new(
            Arc::clone(&collider),
            Arc::clone(&players),
            Arc::clone(&food),
        )));

        let mut food_system =
            FoodSystem::new(config.food.clone(), Arc::clone(&collider), Arc::clone(&food));
        if config.food.initial_food > 0 {
            food_system.populate(config.food.initial_food);
        }
        ticker.register_system(Box::new(food_system));
        ticker.register_system(Box::new(MetricsSystem::new(
            ticker.handle(),
            Arc::clone(&players),
            config.ticker.metrics_interval,
        )));

        info!(
            tps = config.ticker.effective_tps(),
            cell_size = config.collider.cell_size,
            food = food.len(),
            "simulation world built"
        );

        Self {
            config,
            ticker,
            collider,
            players,
            food,
        }
    }

    /// Add an extra system to the tick schedule.
    pub fn register_system(&self, system: Box<dyn TickSystem>) {
        self.ticker.register_system(system);
    }

    pub fn start(&self) -> Result<(), TickerError> {
        self.ticker.start()
    }

    pub fn stop(&self) {
        self.ticker.stop();
    }

    pub fn pause(&self) {
        self.ticker.pause();
    }

    pub fn resume(&self) {
        self.ticker.resume();
    }

    /// Run one tick now on the calling thread.
    pub fn step(&self) {
        self.ticker.execute_tick(Instant::now());
    }

    pub fn stats(&self) -> TickerStats {
        self.ticker.stats()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(
            self.ticker.tick_count(),
            &self.players,
            &self.food,
            &self.collider,
        )
    }

    /// Add a player at `position` with the configured default size.
    /// Returns `None` without touching any table if `position` is not finite.
    pub fn join_player(&self, id: &str, position: DVec3) -> Option<Player> {
        if !position.is_finite() {
            warn!(player = %id, "rejected join at non-finite position");
            return None;
        }
        let player = self.players.add_player(id, position);
        self.collider.add_object(player.to_collidable());
        info!(player = %id, "player joined");
        Some(player)
    }

    /// Move a player. Returns `false` for unknown IDs and non-finite
    /// positions, leaving the registry and the grid as they were.
    pub fn move_player(&self, id: &str, position: DVec3) -> bool {
        if !position.is_finite() || !self.players.update_position(id, position) {
            return false;
        }
        self.collider.update_object_position(id, position)
    }

    pub fn leave_player(&self, id: &str) -> Option<Player> {
        let player = self.players.remove_player(id)?;
        self.collider.remove_object(id);
        info!(player = %id, score = player.score, "player left");
        Some(player)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn ticker(&self) -> &GameTicker {
        &self.ticker
    }

    pub fn collider(&self) -> &Arc<ColliderDispatcher> {
        &self.collider
    }

    pub fn players(&self) -> &Arc<PlayerRegistry> {
        &self.players
    }

    pub fn food(&self) -> &Arc<FoodStore> {
        &self.food
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let world = SimWorld::new();
        assert_eq!(
            world.ticker().system_names(),
            vec![
                "PlayerManagementSystem",
                "CollisionManagerSystem",
                "FoodSystem",
                "MetricsSystem"
            ]
        );
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = SimConfig::default();
        config.collider.cell_size = -1.0;
        assert!(SimWorld::with_config(config).is_err());
    }

    #[test]
    fn test_join_move_leave() {
        let world = SimWorld::new();
        world.join_player("p1", DVec3::ZERO);
        assert!(world.collider().contains("p1"));

        assert!(world.move_player("p1", DVec3::new(10.0, 0.0, 0.0)));
        assert_eq!(world.collider().get_object("p1").unwrap().position.x, 10.0);
        assert!(!world.move_player("ghost", DVec3::ZERO));

        let gone = world.leave_player("p1").unwrap();
        assert_eq!(gone.id, "p1");
        assert!(!world.collider().contains("p1"));
        assert!(world.leave_player("p1").is_none());
    }

    #[test]
    fn test_far_and_non_finite_moves_keep_tables_in_sync() {
        let world = SimWorld::new();
        world.join_player("p1", DVec3::ZERO).unwrap();

        let far = DVec3::new(1.0e10, 0.0, -1.0e10);
        assert!(world.move_player("p1", far));
        assert_eq!(world.players().get_player("p1").unwrap().position, far);
        assert_eq!(world.collider().get_object("p1").unwrap().position, far);
        assert!(world.collider().get_nearby_objects(far, 1.0).iter().any(|o| o.id == "p1"));

        for bad in [
            DVec3::new(f64::INFINITY, 0.0, 0.0),
            DVec3::new(0.0, f64::NEG_INFINITY, 0.0),
            DVec3::new(0.0, 0.0, f64::NAN),
        ] {
            assert!(!world.move_player("p1", bad));
            assert_eq!(world.players().get_player("p1").unwrap().position, far);
            assert_eq!(world.collider().get_object("p1").unwrap().position, far);
        }
        assert!(world.collider().get_nearby_objects(far, 1.0).iter().any(|o| o.id == "p1"));
        assert!(!world.collider().get_nearby_objects(DVec3::ZERO, 5.0).iter().any(|o| o.id == "p1"));

        assert!(world.join_player("p2", DVec3::splat(f64::NAN)).is_none());
        assert!(!world.players().contains("p2"));
        assert!(!world.collider().contains("p2"));

        world.step();
        assert_eq!(world.collider().get_object("p1").unwrap().position, far);
    }

    #[test]
    fn test_initial_food_and_step() {
        let mut config = SimConfig::default();
        config.food.initial_food = 10;
        config.food.seed = Some(3);
        let world = SimWorld::with_config(config).unwrap();
        assert_eq!(world.food().len(), 10);

        world.step();
        world.step();
        let snapshot = world.snapshot();
        assert_eq!(snapshot.tick, 2);
        assert!(snapshot.food.len() >= 10);
    }
}
