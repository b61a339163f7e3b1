//! Food entities and their store.

use crate::config::FoodCategory;
use crate::spatial::CollidableObject;
use glam::DVec3;
use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// A piece of food in the world.
#[derive(Debug, Clone, Serialize)]
pub struct FoodItem {
    pub id: String,
    pub position: DVec3,
    pub velocity: DVec3,
    pub radius: f64,
    /// Nutrient value credited to the eater.
    pub mass: f64,
    pub category: String,
    pub color: String,
    pub on_ground: bool,
    #[serde(skip)]
    pub spawned_at: Instant,
}

impl FoodItem {
    pub fn from_category(
        id: impl Into<String>,
        position: DVec3,
        category: &FoodCategory,
        spawned_at: Instant,
    ) -> Self {
        Self {
            id: id.into(),
            position,
            velocity: DVec3::ZERO,
            radius: category.radius,
            mass: category.mass,
            category: category.name.clone(),
            color: category.color.clone(),
            on_ground: false,
            spawned_at,
        }
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.spawned_at)
    }

    pub fn to_collidable(&self) -> CollidableObject {
        CollidableObject::food(self.id.clone(), self.position, self.radius, self.mass)
    }
}

/// Weighted draw from the category table.
///
/// Returns `None` when the table is empty or every weight is zero.
pub fn pick_category<'a, R: Rng>(
    categories: &'a [FoodCategory],
    rng: &mut R,
) -> Option<&'a FoodCategory> {
    let total: u32 = categories.iter().map(|c| c.weight).sum();
    if total == 0 {
        return None;
    }
    let mut roll = rng.gen_range(0..total);
    for category in categories {
        if roll < category.weight {
            return Some(category);
        }
        roll -= category.weight;
    }
    None
}

/// Authoritative food table behind its own lock.
#[derive(Debug, Default)]
pub struct FoodStore {
    items: RwLock<HashMap<String, FoodItem>>,
}

impl FoodStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, FoodItem>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, FoodItem>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, item: FoodItem) {
        self.write().insert(item.id.clone(), item);
    }

    pub fn remove(&self, id: &str) -> Option<FoodItem> {
        self.write().remove(id)
    }

    pub fn get(&self, id: &str) -> Option<FoodItem> {
        self.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Snapshot of every item, ordered by ID.
    pub fn items(&self) -> Vec<FoodItem> {
        let mut items: Vec<FoodItem> = self.read().values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items
    }

    pub fn counts_by_category(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for item in self.read().values() {
            *counts.entry(item.category.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Mutate every item in place under one write lock.
    pub fn for_each_mut(&self, mut f: impl FnMut(&mut FoodItem)) {
        for item in self.write().values_mut() {
            f(item);
        }
    }

    /// Remove items older than `max_age` at `now`, returning them by ID order.
    pub fn remove_expired(&self, max_age: Duration, now: Instant) -> Vec<FoodItem> {
        let mut items = self.write();
        let mut expired: Vec<String> = items
            .values()
            .filter(|item| item.age(now) > max_age)
            .map(|item| item.id.clone())
            .collect();
        expired.sort();
        expired
            .into_iter()
            .filter_map(|id| items.remove(&id))
            .collect()
    }

    pub fn clear(&self) {
        self.write().clear();
    }
}
