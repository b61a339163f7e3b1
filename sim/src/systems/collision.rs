//! Player/food collision management.
//!
//! Each tick the system:
//! 1. Pushes every player's current position and radius into the grid.
//! 2. Every [`CONSISTENCY_CHECK_INTERVAL`] ticks, repairs drift between the
//!    grid and the authoritative player/food tables.
//! 3. Resolves food consumption.
//!
//! ## Contested Food
//!
//! A food item may be in reach of several players in the same tick. It goes
//! to the closest eligible player; equal distances go to the lowest player
//! ID. A player may eat every item it wins in one pass, and eligibility is
//! judged on radii at the start of the pass.

use crate::collider::ColliderDispatcher;
use crate::error::SystemError;
use crate::food::FoodStore;
use crate::players::PlayerRegistry;
use crate::spatial::ObjectKind;
use crate::ticker::TickSystem;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

pub const COLLISION_MANAGER_PRIORITY: i32 = 12;

/// Ticks between grid/table consistency checks.
pub const CONSISTENCY_CHECK_INTERVAL: u64 = 100;

/// One food item eaten by one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumptionEvent {
    pub player_id: String,
    pub food_id: String,
    pub mass: f64,
    pub old_radius: f64,
    pub new_radius: f64,
}

/// Outcome of a consistency pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Food in the store that was missing from the grid.
    pub food_restored: usize,
    /// Food in the grid that no longer exists in the store.
    pub food_purged: usize,
    /// Player objects in the grid for players that left.
    pub players_purged: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Resolve every player-eats-food event for the current world state.
///
/// Winning claims are applied in `(player_id, food_id)` order: the food
/// leaves the store and the grid, the player grows, and the grown player is
/// re-inserted into the grid. Grid entries for food that is no longer in the
/// store are dropped along the way.
pub fn resolve_food_consumption(
    collider: &ColliderDispatcher,
    players: &PlayerRegistry,
    food: &FoodStore,
) -> Vec<ConsumptionEvent> {
    let roster = players.all_players();
    if roster.is_empty() {
        return Vec::new();
    }

    // food_id -> (distance, player_id)
    let mut claims: BTreeMap<String, (f64, String)> = BTreeMap::new();
    let mut stale: BTreeSet<String> = BTreeSet::new();

    for player in &roster {
        // Any edible item lies within radius + food radius <= 2 * radius.
        for candidate in collider.get_nearby_objects(player.position, player.radius * 2.0) {
            if candidate.kind != ObjectKind::Food {
                continue;
            }
            if !food.contains(&candidate.id) {
                stale.insert(candidate.id);
                continue;
            }

            let distance = player.position.distance(candidate.position);
            if distance > player.radius + candidate.radius || candidate.radius > player.radius {
                continue;
            }

            // Roster is ID-ordered, so keeping an equal claim favors the lower ID.
            let closer = claims
                .get(&candidate.id)
                .map_or(true, |(best, _)| distance < *best);
            if closer {
                claims.insert(candidate.id, (distance, player.id.clone()));
            }
        }
    }

    for id in &stale {
        collider.remove_object(id);
        debug!(food = %id, "dropped grid entry for food missing from store");
    }

    let mut wins: Vec<(String, String)> = claims
        .into_iter()
        .map(|(food_id, (_, player_id))| (player_id, food_id))
        .collect();
    wins.sort();

    let mut events = Vec::with_capacity(wins.len());
    let mut grown: BTreeSet<String> = BTreeSet::new();
    for (player_id, food_id) in wins {
        if !players.contains(&player_id) {
            continue;
        }
        let Some(item) = food.remove(&food_id) else {
            continue;
        };
        collider.remove_object(&food_id);

        let Some((old_radius, new_radius)) = players.apply_food_gain(&player_id, item.mass) else {
            continue;
        };
        trace!(
            player = %player_id,
            food = %food_id,
            mass = item.mass,
            old_radius,
            new_radius,
            "food consumed"
        );
        grown.insert(player_id.clone());
        events.push(ConsumptionEvent {
            player_id,
            food_id,
            mass: item.mass,
            old_radius,
            new_radius,
        });
    }

    for id in grown {
        if let Some(player) = players.get_player(&id) {
            collider.add_object(player.to_collidable());
        }
    }

    events
}

/// Keeps the grid in step with players and food, and resolves eating.
pub struct CollisionManagerSystem {
    collider: Arc<ColliderDispatcher>,
    players: Arc<PlayerRegistry>,
    food: Arc<FoodStore>,
    updates: u64,
    total_consumed: u64,
    last_events: Vec<ConsumptionEvent>,
}

impl CollisionManagerSystem {
    pub fn new(
        collider: Arc<ColliderDispatcher>,
        players: Arc<PlayerRegistry>,
        food: Arc<FoodStore>,
    ) -> Self {
        Self {
            collider,
            players,
            food,
            updates: 0,
            total_consumed: 0,
            last_events: Vec::new(),
        }
    }

    pub fn total_consumed(&self) -> u64 {
        self.total_consumed
    }

    /// Events produced by the most recent update.
    pub fn last_events(&self) -> &[ConsumptionEvent] {
        &self.last_events
    }

    fn sync_players(&self) {
        for player in self.players.all_players() {
            self.collider.add_object(player.to_collidable());
        }
    }

    /// Reconcile the grid with the authoritative tables.
    pub fn repair_consistency(&self) -> RepairReport {
        let mut report = RepairReport::default();

        for item in self.food.items() {
            if !self.collider.contains(&item.id) {
                self.collider.add_object(item.to_collidable());
                report.food_restored += 1;
            }
        }
        for obj in self.collider.get_objects_by_type(ObjectKind::Food) {
            if !self.food.contains(&obj.id) {
                self.collider.remove_object(&obj.id);
                report.food_purged += 1;
            }
        }
        for obj in self.collider.get_objects_by_type(ObjectKind::Player) {
            if !self.players.contains(&obj.id) {
                self.collider.remove_object(&obj.id);
                report.players_purged += 1;
            }
        }

        if !report.is_clean() {
            warn!(
                food_restored = report.food_restored,
                food_purged = report.food_purged,
                players_purged = report.players_purged,
                "repaired grid drift"
            );
        }
        report
    }
}

impl TickSystem for CollisionManagerSystem {
    fn update(&mut self, _delta_time: Duration) -> Result<(), SystemError> {
        self.updates += 1;
        self.sync_players();

        if self.updates % CONSISTENCY_CHECK_INTERVAL == 0 {
            self.repair_consistency();
            debug!(
                players = self.players.len(),
                food = self.food.len(),
                grid_objects = self.collider.get_object_count(),
                "collision manager status"
            );
        }

        self.last_events = resolve_food_consumption(&self.collider, &self.players, &self.food);
        if !self.last_events.is_empty() {
            self.total_consumed += self.last_events.len() as u64;
            info!(eaten = self.last_events.len(), "resolved food consumption");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "CollisionManagerSystem"
    }

    fn priority(&self) -> i32 {
        COLLISION_MANAGER_PRIORITY
    }
}
