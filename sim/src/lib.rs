//! X-Cells - Simulation Core
//!
//! A fixed-rate tick scheduler with per-system performance monitoring, a 3D
//! spatial-hash broad phase, and the gameplay systems (player lifecycle, food
//! spawning, eating) it drives.
//!
//! Logging goes through `tracing`; install a subscriber in the binary.

pub mod api;
pub mod collider;
pub mod config;
pub mod error;
pub mod food;
pub mod monitor;
pub mod players;
pub mod spatial;
pub mod systems;
pub mod ticker;
pub mod world;

pub use api::SimWorld;
pub use collider::{check_sphere_collision, ColliderDispatcher, Collision};
pub use config::{ColliderConfig, FoodCategory, FoodConfig, PlayerConfig, SimConfig, TickerConfig};
pub use error::{ConfigError, SystemError, TickerError};
pub use food::{FoodItem, FoodStore};
pub use monitor::{PerfLevel, PerformanceMonitor, SystemMetrics};
pub use players::{grown_radius, Player, PlayerRegistry};
pub use spatial::{CellKey, CollidableObject, ObjectKind, SpatialGrid};
pub use systems::{
    resolve_food_consumption, CollisionManagerSystem, ConsumptionEvent, FoodSystem,
    MetricsSystem, PlayerManagementSystem, Workload, WorkloadSystem,
};
pub use ticker::{GameTicker, TickSystem, TickerHandle, TickerState, TickerStats};
pub use world::Snapshot;
