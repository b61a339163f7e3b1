//! Broad-phase collision façade used by gameplay systems.
//!
//! [`ColliderDispatcher`] owns a [`SpatialGrid`] behind one reader/writer lock
//! and answers "who is near X" and "who overlaps whom" without scanning the
//! whole world.
//!
//! ## Failure policy
//!
//! Operations on unknown IDs return `None`, an empty `Vec`, or do nothing.
//! An entity that has not been synced yet is a transient condition; callers
//! log it if they care.
//!
//! ## Parallel Feature
//!
//! With `--features parallel`, [`ColliderDispatcher::get_all_collisions`]
//! gathers candidate pairs across threads with rayon and deduplicates them
//! sequentially. The resulting pair set is identical.

use crate::spatial::{CollidableObject, ObjectKind, SpatialGrid};
use glam::DVec3;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A pair of overlapping spheres.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collision {
    pub first: CollidableObject,
    pub second: CollidableObject,
    /// Distance between centers.
    pub distance: f64,
}

impl Collision {
    /// IDs ordered lexicographically, for comparing pairs regardless of side.
    pub fn ordered_ids(&self) -> (&str, &str) {
        let (a, b) = (self.first.id.as_str(), self.second.id.as_str());
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

/// True iff the distance between centers is at most the sum of radii.
#[inline]
pub fn check_sphere_collision(a: &CollidableObject, b: &CollidableObject) -> bool {
    a.distance_to(b) <= a.radius + b.radius
}

/// Thread-safe broad-phase collision dispatcher.
#[derive(Debug)]
pub struct ColliderDispatcher {
    grid: RwLock<SpatialGrid>,
}

impl Default for ColliderDispatcher {
    fn default() -> Self {
        Self::new(5.0)
    }
}

impl ColliderDispatcher {
    pub fn new(cell_size: f64) -> Self {
        Self {
            grid: RwLock::new(SpatialGrid::new(cell_size)),
        }
    }

    // Every grid mutation leaves it consistent; poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, SpatialGrid> {
        self.grid.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SpatialGrid> {
        self.grid.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cell_size(&self) -> f64 {
        self.read().cell_size()
    }

    /// Track an object, replacing any previous entry with the same ID.
    /// Returns `false` for a non-finite position or radius.
    pub fn add_object(&self, obj: CollidableObject) -> bool {
        self.write().add_object(obj)
    }

    /// Stop tracking an object. Returns it if it was present.
    pub fn remove_object(&self, id: &str) -> Option<CollidableObject> {
        self.write().remove_object(id)
    }

    /// Move a tracked object and fix its grid membership.
    /// Returns `false` if the ID is unknown or `new_pos` is not finite; the
    /// object then keeps its previous position.
    pub fn update_object_position(&self, id: &str, new_pos: DVec3) -> bool {
        let mut grid = self.write();
        let Some(mut obj) = grid.get(id).cloned() else {
            return false;
        };
        obj.position = new_pos;
        grid.add_object(obj)
    }

    /// Candidate neighbors of `pos` within `radius` (superset; ordered by ID).
    pub fn get_nearby_objects(&self, pos: DVec3, radius: f64) -> Vec<CollidableObject> {
        self.read().get_nearby_objects(pos, radius)
    }

    pub fn get_object(&self, id: &str) -> Option<CollidableObject> {
        self.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains(id)
    }

    /// All objects overlapping `id`, excluding itself.
    pub fn get_collisions_for_object(&self, id: &str) -> Vec<Collision> {
        let grid = self.read();
        let Some(obj) = grid.get(id) else {
            return Vec::new();
        };
        collisions_around(&grid, obj)
            .into_iter()
            .map(|(other, distance)| Collision {
                first: obj.clone(),
                second: other.clone(),
                distance,
            })
            .collect()
    }

    /// Every overlapping pair in the world, each reported once.
    ///
    /// Runs in roughly O(n * k) where k is local density.
    pub fn get_all_collisions(&self) -> Vec<Collision> {
        let guard = self.read();
        let grid: &SpatialGrid = &guard;

        // Visit objects in ID order so the output is reproducible.
        let mut objects: Vec<&CollidableObject> = grid.objects().collect();
        objects.sort_by(|a, b| a.id.cmp(&b.id));

        #[cfg(feature = "parallel")]
        let candidates: Vec<(&CollidableObject, Vec<(&CollidableObject, f64)>)> = objects
            .par_iter()
            .map(|obj| (*obj, collisions_around(grid, obj)))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let candidates: Vec<(&CollidableObject, Vec<(&CollidableObject, f64)>)> = objects
            .iter()
            .map(|obj| (*obj, collisions_around(grid, obj)))
            .collect();

        let mut seen: HashSet<(&str, &str)> = HashSet::new();
        let mut collisions = Vec::new();
        for (obj, partners) in candidates {
            for (other, distance) in partners {
                let key = if obj.id <= other.id {
                    (obj.id.as_str(), other.id.as_str())
                } else {
                    (other.id.as_str(), obj.id.as_str())
                };
                if !seen.insert(key) {
                    continue;
                }
                collisions.push(Collision {
                    first: obj.clone(),
                    second: other.clone(),
                    distance,
                });
            }
        }
        collisions
    }

    pub fn get_object_count(&self) -> usize {
        self.read().object_count()
    }

    /// All tracked objects of one kind, ordered by ID.
    pub fn get_objects_by_type(&self, kind: ObjectKind) -> Vec<CollidableObject> {
        let grid = self.read();
        let mut result: Vec<CollidableObject> =
            grid.objects().filter(|o| o.kind == kind).cloned().collect();
        result.sort_by(|a, b| a.id.cmp(&b.id));
        result
    }

    /// Drop every tracked object.
    pub fn clear(&self) {
        self.write().clear();
    }
}

/// True partners of `obj` from the grid, probing `radius * 2` around it.
fn collisions_around<'a>(
    grid: &'a SpatialGrid,
    obj: &CollidableObject,
) -> Vec<(&'a CollidableObject, f64)> {
    grid.nearby(obj.position, obj.radius * 2.0)
        .into_values()
        .filter(|other| other.id != obj.id && check_sphere_collision(obj, other))
        .map(|other| (other, obj.distance_to(other)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(id: &str, x: f64, radius: f64) -> CollidableObject {
        CollidableObject::new(id, DVec3::new(x, 0.0, 0.0), radius, ObjectKind::Test)
    }

    #[test]
    fn test_sphere_collision_touching_and_apart() {
        let a = sphere("a", 0.0, 1.0);
        assert!(check_sphere_collision(&a, &sphere("b", 1.5, 1.0)));
        assert!(!check_sphere_collision(&a, &sphere("b", 2.5, 1.0)));
        // Exactly touching counts.
        assert!(check_sphere_collision(&a, &sphere("b", 2.0, 1.0)));
    }

    #[test]
    fn test_sphere_collision_symmetric() {
        let a = sphere("a", 0.0, 0.7);
        let b = sphere("b", 1.1, 0.4);
        assert_eq!(check_sphere_collision(&a, &b), check_sphere_collision(&b, &a));
    }

    #[test]
    fn test_update_position_moves_cells() {
        let collider = ColliderDispatcher::new(2.0);
        collider.add_object(sphere("a", 0.0, 0.5));

        assert!(collider.update_object_position("a", DVec3::new(50.0, 0.0, 0.0)));
        assert!(collider.get_nearby_objects(DVec3::ZERO, 1.0).is_empty());
        let moved = collider.get_nearby_objects(DVec3::new(50.0, 0.0, 0.0), 1.0);
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].position.x, 50.0);

        assert!(!collider.update_object_position("ghost", DVec3::ZERO));
        assert_eq!(collider.get_object_count(), 1);

        assert!(!collider.update_object_position("a", DVec3::new(f64::INFINITY, 0.0, 0.0)));
        assert_eq!(collider.get_object("a").unwrap().position.x, 50.0);
        assert_eq!(collider.get_nearby_objects(DVec3::new(50.0, 0.0, 0.0), 1.0).len(), 1);
    }

    #[test]
    fn test_collisions_for_object_excludes_self() {
        let collider = ColliderDispatcher::new(2.0);
        collider.add_object(sphere("a", 0.0, 1.0));
        collider.add_object(sphere("b", 1.5, 1.0));
        collider.add_object(sphere("c", 10.0, 1.0));

        let hits = collider.get_collisions_for_object("a");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].second.id, "b");
        assert!((hits[0].distance - 1.5).abs() < 1e-9);

        assert!(collider.get_collisions_for_object("ghost").is_empty());
    }

    #[test]
    fn test_all_collisions_unique_pairs() {
        let collider = ColliderDispatcher::new(2.0);
        collider.add_object(sphere("a", 0.0, 1.0));
        collider.add_object(sphere("b", 1.0, 1.0));
        collider.add_object(sphere("c", 2.0, 1.0));
        collider.add_object(sphere("far", 40.0, 1.0));

        let pairs = collider.get_all_collisions();
        let mut keys: Vec<_> = pairs.iter().map(|c| c.ordered_ids()).collect();
        keys.sort();
        assert_eq!(keys, vec![("a", "b"), ("a", "c"), ("b", "c")]);
    }

    #[test]
    fn test_objects_by_type() {
        let collider = ColliderDispatcher::new(5.0);
        collider.add_object(CollidableObject::new("p1", DVec3::ZERO, 1.0, ObjectKind::Player));
        collider.add_object(CollidableObject::new("f2", DVec3::ONE, 0.3, ObjectKind::Food));
        collider.add_object(CollidableObject::new("f1", DVec3::NEG_ONE, 0.3, ObjectKind::Food));

        let food = collider.get_objects_by_type(ObjectKind::Food);
        let ids: Vec<_> = food.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["f1", "f2"]);
        assert_eq!(collider.get_objects_by_type(ObjectKind::Static).len(), 0);

        collider.clear();
        assert_eq!(collider.get_object_count(), 0);
    }
}
