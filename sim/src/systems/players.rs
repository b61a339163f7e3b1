//! Player lifecycle: idle players are dropped from the registry and the grid.

use crate::collider::ColliderDispatcher;
use crate::error::SystemError;
use crate::players::PlayerRegistry;
use crate::ticker::TickSystem;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

pub const PLAYER_MANAGEMENT_PRIORITY: i32 = 10;

pub struct PlayerManagementSystem {
    players: Arc<PlayerRegistry>,
    collider: Arc<ColliderDispatcher>,
    inactive_timeout: Duration,
}

impl PlayerManagementSystem {
    pub fn new(
        players: Arc<PlayerRegistry>,
        collider: Arc<ColliderDispatcher>,
        inactive_timeout: Duration,
    ) -> Self {
        Self {
            players,
            collider,
            inactive_timeout,
        }
    }

    /// Remove players idle longer than the timeout at `now`.
    pub fn remove_inactive(&self, now: Instant) -> Vec<String> {
        let removed = self.players.remove_inactive(self.inactive_timeout, now);
        for id in &removed {
            self.collider.remove_object(id);
            info!(player = %id, timeout = ?self.inactive_timeout, "removed inactive player");
        }
        removed
    }
}

impl TickSystem for PlayerManagementSystem {
    fn update(&mut self, _delta_time: Duration) -> Result<(), SystemError> {
        self.remove_inactive(Instant::now());
        Ok(())
    }

    fn name(&self) -> &str {
        "PlayerManagementSystem"
    }

    fn priority(&self) -> i32 {
        PLAYER_MANAGEMENT_PRIORITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_idle_player_removed_everywhere() {
        let players = Arc::new(PlayerRegistry::default());
        let collider = Arc::new(ColliderDispatcher::new(5.0));
        let system = PlayerManagementSystem::new(
            Arc::clone(&players),
            Arc::clone(&collider),
            Duration::from_secs(300),
        );

        let idle = players.add_player("idle", DVec3::ZERO);
        collider.add_object(idle.to_collidable());

        assert!(system.remove_inactive(Instant::now()).is_empty());
        let later = Instant::now() + Duration::from_secs(301);
        assert_eq!(system.remove_inactive(later), vec!["idle"]);
        assert!(players.is_empty());
        assert!(!collider.contains("idle"));
    }

    #[test]
    fn test_active_player_survives_update() {
        let players = Arc::new(PlayerRegistry::default());
        let collider = Arc::new(ColliderDispatcher::new(5.0));
        let mut system =
            PlayerManagementSystem::new(Arc::clone(&players), collider, Duration::from_secs(300));

        players.add_player("p1", DVec3::ZERO);
        system.update(Duration::from_millis(50)).unwrap();
        assert!(players.contains("p1"));
    }
}
