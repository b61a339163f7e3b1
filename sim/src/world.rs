//! Serializable world snapshot.
//!
//! The `Snapshot` struct provides a read-only view of players and food that
//! a networking layer can send to clients as JSON.

use crate::collider::ColliderDispatcher;
use crate::food::{FoodItem, FoodStore};
use crate::players::{Player, PlayerRegistry};
use serde::Serialize;

/// Complete world state at one tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    /// Ticks executed so far.
    pub tick: u64,
    /// All players, ordered by ID.
    pub players: Vec<Player>,
    /// All food items, ordered by ID.
    pub food: Vec<FoodItem>,
    /// Objects tracked by the broad phase.
    pub collider_objects: usize,
}

impl Snapshot {
    /// Capture the current state of every table.
    ///
    /// Tables are read one after another, so a tick running concurrently
    /// may show up in some of them and not others.
    pub fn capture(
        tick: u64,
        players: &PlayerRegistry,
        food: &FoodStore,
        collider: &ColliderDispatcher,
    ) -> Self {
        Self {
            tick,
            players: players.all_players(),
            food: food.items(),
            collider_objects: collider.get_object_count(),
        }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
