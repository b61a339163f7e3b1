//! Authoritative player table.
//!
//! [`PlayerRegistry`] owns every connected player behind its own
//! reader/writer lock. Systems read consistent clones and write back through
//! narrow methods; nothing hands out references into the map.

use crate::config::PlayerConfig;
use crate::spatial::CollidableObject;
use glam::DVec3;
use serde::Serialize;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// A connected player cell.
#[derive(Debug, Clone, Serialize)]
pub struct Player {
    pub id: String,
    pub position: DVec3,
    /// Grows as the player eats.
    pub radius: f64,
    pub mass: f64,
    pub score: f64,
    #[serde(skip)]
    pub last_seen: Instant,
}

impl Player {
    pub fn to_collidable(&self) -> CollidableObject {
        CollidableObject::player(self.id.clone(), self.position, self.radius, self.mass)
    }
}

/// Area-conserving growth: the disc area grows by `mass_gained`.
///
/// `sqrt((PI * r^2 + m) / PI)`
#[inline]
pub fn grown_radius(radius: f64, mass_gained: f64) -> f64 {
    ((PI * radius * radius + mass_gained) / PI).sqrt()
}

/// Thread-safe registry of players.
#[derive(Debug)]
pub struct PlayerRegistry {
    players: RwLock<HashMap<String, Player>>,
    default_radius: f64,
    default_mass: f64,
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new(&PlayerConfig::default())
    }
}

impl PlayerRegistry {
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            players: RwLock::new(HashMap::new()),
            default_radius: config.default_radius,
            default_mass: config.default_mass,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Player>> {
        self.players.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Player>> {
        self.players.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a player with the configured default size. An existing player
    /// with the same ID is replaced.
    pub fn add_player(&self, id: &str, position: DVec3) -> Player {
        self.add_player_with(id, position, self.default_radius, self.default_mass)
    }

    pub fn add_player_with(&self, id: &str, position: DVec3, radius: f64, mass: f64) -> Player {
        let player = Player {
            id: id.to_string(),
            position,
            radius: radius.max(0.0),
            mass,
            score: 0.0,
            last_seen: Instant::now(),
        };
        self.write().insert(player.id.clone(), player.clone());
        player
    }

    pub fn remove_player(&self, id: &str) -> Option<Player> {
        self.write().remove(id)
    }

    pub fn get_player(&self, id: &str) -> Option<Player> {
        self.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    /// Move a player and refresh its activity timestamp.
    /// Returns `false` for unknown IDs and non-finite positions.
    pub fn update_position(&self, id: &str, position: DVec3) -> bool {
        if !position.is_finite() {
            return false;
        }
        match self.write().get_mut(id) {
            Some(player) => {
                player.position = position;
                player.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Refresh a player's activity timestamp without moving it.
    pub fn touch(&self, id: &str) -> bool {
        match self.write().get_mut(id) {
            Some(player) => {
                player.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Snapshot of every player, ordered by ID.
    pub fn all_players(&self) -> Vec<Player> {
        let mut players: Vec<Player> = self.read().values().cloned().collect();
        players.sort_by(|a, b| a.id.cmp(&b.id));
        players
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Credit a consumed food item: mass and score grow by `mass`, radius
    /// grows by [`grown_radius`]. Returns `(old_radius, new_radius)`.
    pub fn apply_food_gain(&self, id: &str, mass: f64) -> Option<(f64, f64)> {
        let mut players = self.write();
        let player = players.get_mut(id)?;
        let old_radius = player.radius;
        player.mass += mass;
        player.score += mass;
        player.radius = grown_radius(old_radius, mass);
        Some((old_radius, player.radius))
    }

    /// Drop players whose last activity is older than `timeout` at `now`.
    /// Returns the removed IDs in sorted order.
    pub fn remove_inactive(&self, timeout: Duration, now: Instant) -> Vec<String> {
        let mut players = self.write();
        let mut stale: Vec<String> = players
            .values()
            .filter(|p| now.saturating_duration_since(p.last_seen) > timeout)
            .map(|p| p.id.clone())
            .collect();
        stale.sort();
        for id in &stale {
            players.remove(id);
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_formula() {
        let r = grown_radius(1.0, 1.0);
        assert!((r - 1.1441).abs() < 1e-4, "got {r}");
        // Zero mass leaves the radius unchanged.
        assert!((grown_radius(2.5, 0.0) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_apply_food_gain() {
        let registry = PlayerRegistry::default();
        registry.add_player("p1", DVec3::ZERO);

        let (old, new) = registry.apply_food_gain("p1", 1.0).unwrap();
        assert_eq!(old, 1.0);
        assert!((new - 1.1441).abs() < 1e-4);

        let player = registry.get_player("p1").unwrap();
        assert_eq!(player.mass, 2.0);
        assert_eq!(player.score, 1.0);
        assert_eq!(player.radius, new);

        assert!(registry.apply_food_gain("ghost", 1.0).is_none());
    }

    #[test]
    fn test_update_position_and_touch() {
        let registry = PlayerRegistry::default();
        registry.add_player("p1", DVec3::ZERO);

        assert!(registry.update_position("p1", DVec3::new(3.0, 0.0, 4.0)));
        assert_eq!(registry.get_player("p1").unwrap().position.x, 3.0);
        assert!(registry.touch("p1"));
        assert!(!registry.update_position("ghost", DVec3::ZERO));
        assert!(!registry.touch("ghost"));

        assert!(!registry.update_position("p1", DVec3::new(f64::NAN, 0.0, 0.0)));
        assert!(!registry.update_position("p1", DVec3::new(0.0, f64::NEG_INFINITY, 0.0)));
        assert_eq!(registry.get_player("p1").unwrap().position, DVec3::new(3.0, 0.0, 4.0));
    }

    #[test]
    fn test_remove_inactive() {
        let registry = PlayerRegistry::default();
        registry.add_player("b", DVec3::ZERO);
        registry.add_player("a", DVec3::ZERO);

        let later = Instant::now() + Duration::from_secs(10);
        assert!(registry.remove_inactive(Duration::from_secs(60), later).is_empty());
        assert_eq!(registry.remove_inactive(Duration::from_secs(5), later), vec!["a", "b"]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_all_players_sorted() {
        let registry = PlayerRegistry::default();
        registry.add_player("zed", DVec3::ZERO);
        registry.add_player_with("amy", DVec3::ONE, 2.0, 4.0);

        let ids: Vec<_> = registry.all_players().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["amy", "zed"]);
        assert_eq!(registry.get_player("amy").unwrap().radius, 2.0);
        assert_eq!(registry.len(), 2);
    }
}
