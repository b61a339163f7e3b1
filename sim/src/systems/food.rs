//! Food spawning, falling and expiry.
//!
//! Eating is resolved by the collision manager; this system only keeps the
//! population topped up and moves what is still falling.

use crate::collider::ColliderDispatcher;
use crate::config::FoodConfig;
use crate::error::SystemError;
use crate::food::{pick_category, FoodItem, FoodStore};
use crate::ticker::TickSystem;
use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

pub const FOOD_SYSTEM_PRIORITY: i32 = 20;

/// Updates between population summaries in the log.
const STATS_LOG_INTERVAL: u64 = 200;

pub struct FoodSystem {
    config: FoodConfig,
    collider: Arc<ColliderDispatcher>,
    food: Arc<FoodStore>,
    rng: StdRng,
    next_id: u64,
    last_spawn: Option<Instant>,
    updates: u64,
}

impl FoodSystem {
    pub fn new(config: FoodConfig, collider: Arc<ColliderDispatcher>, food: Arc<FoodStore>) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            collider,
            food,
            rng,
            next_id: 1,
            last_spawn: None,
            updates: 0,
        }
    }

    pub fn config(&self) -> &FoodConfig {
        &self.config
    }

    /// Spawn one item if the population is under the cap.
    pub fn spawn_one(&mut self, now: Instant) -> Option<FoodItem> {
        if self.food.len() >= self.config.max_food {
            return None;
        }
        let category = pick_category(&self.config.categories, &mut self.rng)?.clone();

        let angle = self.rng.gen::<f64>() * TAU;
        let distance = self.rng.gen::<f64>() * self.config.spawn_radius;
        let position = DVec3::new(
            angle.cos() * distance,
            self.config.spawn_height,
            angle.sin() * distance,
        );

        let item = FoodItem::from_category(format!("food_{}", self.next_id), position, &category, now);
        self.next_id += 1;

        self.collider.add_object(item.to_collidable());
        self.food.insert(item.clone());
        trace!(
            food = %item.id,
            category = %item.category,
            x = position.x,
            z = position.z,
            "spawned food"
        );
        Some(item)
    }

    /// Spawn up to `count` items immediately, respecting the cap.
    pub fn populate(&mut self, count: usize) -> usize {
        let now = Instant::now();
        let mut spawned = 0;
        while spawned < count && self.spawn_one(now).is_some() {
            spawned += 1;
        }
        debug!(spawned, total = self.food.len(), "populated food");
        spawned
    }

    fn spawn_if_due(&mut self, now: Instant) {
        let due = self
            .last_spawn
            .map_or(true, |last| now.saturating_duration_since(last) >= self.config.spawn_interval);
        if !due || self.food.len() >= self.config.max_food {
            return;
        }
        self.last_spawn = Some(now);
        self.spawn_one(now);
    }

    /// Apply gravity to falling items and land them on the ground.
    pub fn apply_physics(&self, delta_time: Duration) {
        let dt = delta_time.as_secs_f64();
        let gravity = self.config.gravity;
        let ground = self.config.ground_level;

        let mut moved = Vec::new();
        self.food.for_each_mut(|item| {
            if item.on_ground {
                return;
            }
            let old = item.position;
            item.velocity.y -= gravity * dt;
            item.position += item.velocity * dt;

            let floor = ground + item.radius;
            if item.position.y <= floor {
                item.position.y = floor;
                item.velocity.y = 0.0;
                item.on_ground = true;
            }
            if item.position != old {
                moved.push((item.id.clone(), item.position));
            }
        });

        for (id, position) in moved {
            self.collider.update_object_position(&id, position);
        }
    }

    /// Purge items older than the configured max age.
    pub fn expire(&self, now: Instant) -> usize {
        let expired = self.food.remove_expired(self.config.max_age, now);
        for item in &expired {
            self.collider.remove_object(&item.id);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "expired old food");
        }
        expired.len()
    }

    fn log_stats(&self) {
        let items = self.food.items();
        let on_ground = items.iter().filter(|i| i.on_ground).count();
        debug!(
            total = items.len(),
            on_ground,
            falling = items.len() - on_ground,
            by_category = ?self.food.counts_by_category(),
            "food population"
        );
    }
}

impl TickSystem for FoodSystem {
    fn update(&mut self, delta_time: Duration) -> Result<(), SystemError> {
        let now = Instant::now();
        self.spawn_if_due(now);
        self.apply_physics(delta_time);
        self.expire(now);

        self.updates += 1;
        if self.updates % STATS_LOG_INTERVAL == 0 {
            self.log_stats();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "FoodSystem"
    }

    fn priority(&self) -> i32 {
        FOOD_SYSTEM_PRIORITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(config: FoodConfig) -> (FoodSystem, Arc<ColliderDispatcher>, Arc<FoodStore>) {
        let collider = Arc::new(ColliderDispatcher::new(5.0));
        let food = Arc::new(FoodStore::new());
        let system = FoodSystem::new(config, Arc::clone(&collider), Arc::clone(&food));
        (system, collider, food)
    }

    fn seeded() -> FoodConfig {
        FoodConfig {
            seed: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn test_spawn_within_radius_and_registered() {
        let (mut system, collider, food) = system(seeded());
        assert_eq!(system.populate(50), 50);

        for item in food.items() {
            let horizontal = DVec3::new(item.position.x, 0.0, item.position.z).length();
            assert!(horizontal <= 500.0);
            assert_eq!(item.position.y, 20.0);
            assert!(collider.contains(&item.id));
        }
        assert_eq!(collider.get_object_count(), 50);
    }

    #[test]
    fn test_population_cap() {
        let (mut system, _, food) = system(FoodConfig {
            max_food: 5,
            ..seeded()
        });
        assert_eq!(system.populate(20), 5);
        assert!(system.spawn_one(Instant::now()).is_none());
        assert_eq!(food.len(), 5);
    }

    #[test]
    fn test_same_seed_same_world() {
        let (mut a, _, food_a) = system(seeded());
        let (mut b, _, food_b) = system(seeded());
        a.populate(10);
        b.populate(10);

        let pos_a: Vec<_> = food_a.items().into_iter().map(|i| i.position).collect();
        let pos_b: Vec<_> = food_b.items().into_iter().map(|i| i.position).collect();
        assert_eq!(pos_a, pos_b);
    }

    #[test]
    fn test_food_falls_and_lands() {
        let (mut system, collider, food) = system(seeded());
        let item = system.spawn_one(Instant::now()).unwrap();

        system.apply_physics(Duration::from_millis(500));
        let falling = food.get(&item.id).unwrap();
        assert!(falling.position.y < 20.0);
        assert!(!falling.on_ground);
        assert_eq!(collider.get_object(&item.id).unwrap().position.y, falling.position.y);

        for _ in 0..20 {
            system.apply_physics(Duration::from_millis(500));
        }
        let landed = food.get(&item.id).unwrap();
        assert!(landed.on_ground);
        assert_eq!(landed.position.y, 1.0 + landed.radius);
        assert_eq!(landed.velocity.y, 0.0);
    }

    #[test]
    fn test_expire_removes_from_grid() {
        let (mut system, collider, food) = system(FoodConfig {
            max_age: Duration::from_secs(60),
            ..seeded()
        });
        let now = Instant::now();
        system.populate(3);

        assert_eq!(system.expire(now + Duration::from_secs(30)), 0);
        assert_eq!(system.expire(now + Duration::from_secs(120)), 3);
        assert!(food.is_empty());
        assert_eq!(collider.get_object_count(), 0);
    }

    #[test]
    fn test_update_spawns_once_per_interval() {
        let (mut system, _, food) = system(seeded());
        system.update(Duration::from_millis(50)).unwrap();
        system.update(Duration::from_millis(50)).unwrap();
        // The 500ms interval has not elapsed between the two calls.
        assert_eq!(food.len(), 1);
    }
}
