//! Gameplay systems driven by the tick scheduler.
//!
//! Every system implements [`crate::ticker::TickSystem`] and runs once per
//! tick, sequentially, in ascending priority order:
//!
//! - `PlayerManagementSystem` (10) - drops idle players
//! - `CollisionManagerSystem` (12) - syncs players to the grid, repairs
//!   food/grid drift, resolves who eats what
//! - `FoodSystem` (20) - spawns, drops and ages food
//! - `MetricsSystem` (200) - periodic TPS summary, warns below 90% of target
//! - `WorkloadSystem` (configurable) - synthetic load for overload testing
//!
//! ## Shared State
//!
//! Systems share the [`crate::collider::ColliderDispatcher`],
//! [`crate::players::PlayerRegistry`] and [`crate::food::FoodStore`] through
//! `Arc`s. Each has its own lock; a system sees whatever the systems before
//! it left behind this tick.

pub mod collision;
pub mod food;
pub mod metrics;
pub mod players;
pub mod workload;

pub use collision::{resolve_food_consumption, CollisionManagerSystem, ConsumptionEvent};
pub use food::FoodSystem;
pub use metrics::MetricsSystem;
pub use players::PlayerManagementSystem;
pub use workload::{Workload, WorkloadSystem};
