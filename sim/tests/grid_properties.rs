//! Property tests for the broad phase.
//!
//! To reproduce a failure, re-run with the seed proptest prints, e.g.
//!   PROPTEST_SEED=... cargo test -p cells_sim --test grid_properties

use cells_sim::{check_sphere_collision, CollidableObject, ColliderDispatcher, ObjectKind, SpatialGrid};
use glam::DVec3;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn coord() -> impl Strategy<Value = f64> {
    -100.0f64..100.0
}

fn position() -> impl Strategy<Value = DVec3> {
    (coord(), coord(), coord()).prop_map(|(x, y, z)| DVec3::new(x, y, z))
}

fn object(id: usize) -> impl Strategy<Value = CollidableObject> {
    (position(), 0.0f64..8.0)
        .prop_map(move |(pos, radius)| CollidableObject::new(format!("o{id}"), pos, radius, ObjectKind::Test))
}

fn world(max: usize) -> impl Strategy<Value = Vec<CollidableObject>> {
    prop::collection::vec((position(), 0.0f64..8.0), 1..max).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (pos, radius))| CollidableObject::new(format!("o{i}"), pos, radius, ObjectKind::Test))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn inserted_object_is_found_and_removal_is_total(
        obj in object(0),
        cell_size in 0.5f64..20.0,
        query in position(),
    ) {
        let mut grid = SpatialGrid::new(cell_size);
        grid.add_object(obj.clone());

        let found = grid.get_nearby_objects(obj.position, obj.radius);
        prop_assert!(found.iter().any(|o| o.id == obj.id));

        grid.remove_object(&obj.id);
        prop_assert_eq!(grid.cell_count(), 0);
        prop_assert!(grid.get_nearby_objects(obj.position, obj.radius + cell_size).is_empty());
        prop_assert!(grid.get_nearby_objects(query, 50.0).is_empty());
    }

    #[test]
    fn nearby_is_a_superset_of_true_neighbors(
        objects in world(40),
        cell_size in 0.5f64..20.0,
        radius in 0.0f64..30.0,
    ) {
        let mut grid = SpatialGrid::new(cell_size);
        for obj in &objects {
            grid.add_object(obj.clone());
        }

        for a in &objects {
            let nearby: BTreeSet<String> = grid
                .get_nearby_objects(a.position, radius)
                .into_iter()
                .map(|o| o.id)
                .collect();
            for b in &objects {
                if a.position.distance(b.position) <= radius {
                    prop_assert!(nearby.contains(&b.id), "{} missing near {}", b.id, a.id);
                }
            }
        }
    }

    #[test]
    fn sphere_collision_is_symmetric(a in object(0), b in object(1)) {
        prop_assert_eq!(check_sphere_collision(&a, &b), check_sphere_collision(&b, &a));
    }

    #[test]
    fn all_collisions_match_brute_force_without_duplicates(
        objects in world(40),
        cell_size in 1.0f64..10.0,
    ) {
        let collider = ColliderDispatcher::new(cell_size);
        for obj in &objects {
            collider.add_object(obj.clone());
        }

        let mut reported = BTreeSet::new();
        for collision in collider.get_all_collisions() {
            let (a, b) = collision.ordered_ids();
            prop_assert!(a != b);
            prop_assert!(reported.insert((a.to_string(), b.to_string())), "duplicate pair {a}/{b}");
        }

        let mut expected = BTreeSet::new();
        for (i, a) in objects.iter().enumerate() {
            for b in &objects[i + 1..] {
                if check_sphere_collision(a, b) {
                    let pair = if a.id <= b.id {
                        (a.id.clone(), b.id.clone())
                    } else {
                        (b.id.clone(), a.id.clone())
                    };
                    expected.insert(pair);
                }
            }
        }
        prop_assert_eq!(reported, expected);
    }
}
