//! Spatial partitioning for efficient neighbor queries.
//!
//! Provides O(1) cell lookup and O(k) neighbor queries where k is the number
//! of objects in nearby cells, rather than O(n) for brute force.
//!
//! An object is registered in every cell of the cube spanning
//! `ceil(radius / cell_size)` cells on each axis around its center cell, so
//! large objects are found from any cell they overlap. The grid itself is not
//! synchronized; [`crate::collider::ColliderDispatcher`] wraps it in a single
//! reader/writer lock.
//!
//! Cell coordinates are 64-bit and saturate at the edges of the integer
//! range, so any finite position maps to a cell. Non-finite positions and
//! radii are rejected.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Integer cell coordinates.
pub type CellKey = (i64, i64, i64);

/// Broad category of a collidable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Player,
    Food,
    Static,
    Test,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Player => "player",
            ObjectKind::Food => "food",
            ObjectKind::Static => "static",
            ObjectKind::Test => "test",
        }
    }
}

/// A sphere tracked by the broad phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollidableObject {
    pub id: String,
    pub position: DVec3,
    pub radius: f64,
    pub kind: ObjectKind,
    pub mass: f64,
    pub is_static: bool,
    /// Center cell recorded at the last insertion.
    pub cell: CellKey,
    /// Cells covered on each side of `cell`, recorded at the last insertion.
    pub cell_span: i64,
}

impl CollidableObject {
    pub fn new(id: impl Into<String>, position: DVec3, radius: f64, kind: ObjectKind) -> Self {
        Self {
            id: id.into(),
            position,
            radius: radius.max(0.0),
            kind,
            mass: 0.0,
            is_static: false,
            cell: (0, 0, 0),
            cell_span: 0,
        }
    }

    pub fn player(id: impl Into<String>, position: DVec3, radius: f64, mass: f64) -> Self {
        Self::new(id, position, radius, ObjectKind::Player).with_mass(mass)
    }

    pub fn food(id: impl Into<String>, position: DVec3, radius: f64, mass: f64) -> Self {
        Self::new(id, position, radius, ObjectKind::Food).with_mass(mass)
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    /// True when both position and radius are finite.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.radius.is_finite()
    }

    /// Euclidean distance between centers.
    #[inline]
    pub fn distance_to(&self, other: &CollidableObject) -> f64 {
        self.position.distance(other.position)
    }
}

/// Grid-based spatial partitioning structure.
///
/// Cells hold object IDs; the canonical object lives in the ID table.
#[derive(Debug)]
pub struct SpatialGrid {
    /// Cell size in world units.
    cell_size: f64,
    /// Map from cell coordinates to the IDs referenced by that cell.
    cells: HashMap<CellKey, Vec<String>>,
    /// Canonical objects by ID.
    objects: HashMap<String, CollidableObject>,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(5.0)
    }
}

impl SpatialGrid {
    /// Create a new spatial grid with the given cell size.
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            objects: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Convert world coordinates to cell coordinates.
    #[inline]
    pub fn cell_of(&self, pos: DVec3) -> CellKey {
        (
            (pos.x / self.cell_size).floor() as i64,
            (pos.y / self.cell_size).floor() as i64,
            (pos.z / self.cell_size).floor() as i64,
        )
    }

    /// Number of cells covered on each side of the center for `radius`.
    #[inline]
    pub fn span_for(&self, radius: f64) -> i64 {
        (radius.max(0.0) / self.cell_size).ceil() as i64
    }

    /// Insert (or re-insert) an object.
    ///
    /// Any previous membership under the same ID is purged first, so a moved
    /// object never lingers in its old cells. Returns `false` and leaves the
    /// grid untouched if the position or radius is not finite.
    pub fn add_object(&mut self, mut obj: CollidableObject) -> bool {
        if !obj.is_finite() {
            return false;
        }

        obj.cell = self.cell_of(obj.position);
        obj.cell_span = self.span_for(obj.radius);
        let keys = cube(obj.cell, obj.cell_span);

        self.purge_cells(&obj.id);
        for key in keys {
            self.cells.entry(key).or_default().push(obj.id.clone());
        }

        self.objects.insert(obj.id.clone(), obj);
        true
    }

    /// Remove an object from every cell and from the ID table.
    /// Returns the removed object; unknown IDs are a no-op.
    pub fn remove_object(&mut self, id: &str) -> Option<CollidableObject> {
        self.purge_cells(id);
        self.objects.remove(id)
    }

    /// Drop `id` from the cells it was last inserted into.
    fn purge_cells(&mut self, id: &str) {
        let Some((cell, span)) = self.objects.get(id).map(|o| (o.cell, o.cell_span)) else {
            return;
        };

        for key in cube(cell, span) {
            if let Some(entries) = self.cells.get_mut(&key) {
                if let Some(idx) = entries.iter().position(|e| e == id) {
                    entries.remove(idx);
                }
                if entries.is_empty() {
                    self.cells.remove(&key);
                }
            }
        }
    }

    /// All objects referenced by cells overlapping the cube around
    /// `pos` +/- `radius`, deduplicated by ID and ordered by ID.
    ///
    /// This is a superset of the true neighbors; callers must still test
    /// exact distances. A non-finite `pos` or `radius` finds nothing.
    pub fn get_nearby_objects(&self, pos: DVec3, radius: f64) -> Vec<CollidableObject> {
        self.nearby(pos, radius).into_values().cloned().collect()
    }

    /// Borrowing variant of [`Self::get_nearby_objects`].
    pub(crate) fn nearby(&self, pos: DVec3, radius: f64) -> BTreeMap<&str, &CollidableObject> {
        let mut found = BTreeMap::new();
        if !pos.is_finite() || !radius.is_finite() {
            return found;
        }

        let center = self.cell_of(pos);
        let span = self.span_for(radius);

        for key in cube(center, span) {
            if let Some(entries) = self.cells.get(&key) {
                for id in entries {
                    if let Some(obj) = self.objects.get(id) {
                        found.insert(obj.id.as_str(), obj);
                    }
                }
            }
        }
        found
    }

    pub fn get(&self, id: &str) -> Option<&CollidableObject> {
        self.objects.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    /// Iterate all tracked objects (unordered).
    pub fn objects(&self) -> impl Iterator<Item = &CollidableObject> {
        self.objects.values()
    }

    /// Get count of objects referenced by a cell.
    pub fn cell_len(&self, cell: CellKey) -> usize {
        self.cells.get(&cell).map(|v| v.len()).unwrap_or(0)
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Get total object count.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Clear all entries.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.objects.clear();
    }
}

/// Distinct keys in the cube of half-width `span` around `center`.
///
/// Keys clamp at the integer range, so cubes near the edge collapse onto
/// fewer cells instead of wrapping.
fn cube(center: CellKey, span: i64) -> BTreeSet<CellKey> {
    let (cx, cy, cz) = center;
    let mut keys = BTreeSet::new();
    for dx in -span..=span {
        for dy in -span..=span {
            for dz in -span..=span {
                keys.insert((
                    cx.saturating_add(dx),
                    cy.saturating_add(dy),
                    cz.saturating_add(dz),
                ));
            }
        }
    }
    keys
}
