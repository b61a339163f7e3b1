//! Basic demonstration of the X-Cells simulation core.
//!
//! Run with: cargo run --example basic_demo
//! Set RUST_LOG=cells_sim=debug for per-system detail.

use cells_sim::{SimConfig, SimWorld, Workload, WorkloadSystem};
use glam::DVec3;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== X-Cells - Simulation Demo ===\n");

    let mut config = SimConfig::default();
    config.food.initial_food = 60;
    config.food.spawn_radius = 30.0;
    config.food.seed = Some(2024);
    let world = SimWorld::with_config(config)?;

    // Bots spread around the spawn area.
    for i in 0..6 {
        let angle = i as f64 / 6.0 * std::f64::consts::TAU;
        world.join_player(&format!("bot_{i}"), DVec3::new(angle.cos() * 10.0, 1.0, angle.sin() * 10.0));
    }

    println!("Stepping 200 ticks headless, bots sweeping toward the center...\n");
    for tick in 0..200u32 {
        for player in world.players().all_players() {
            let step = -player.position * 0.01;
            world.move_player(&player.id, player.position + DVec3::new(step.x, 0.0, step.z));
        }
        world.step();

        if (tick + 1) % 50 == 0 {
            print_snapshot(&world);
        }
    }

    println!("\n--- Real-time loop with a 30ms sleep workload ---\n");
    world.register_system(Box::new(WorkloadSystem::new(Workload::Sleep(Duration::from_millis(30)))));
    world.start()?;
    thread::sleep(Duration::from_millis(500));
    world.pause();
    thread::sleep(Duration::from_millis(200));
    world.resume();
    thread::sleep(Duration::from_millis(500));
    world.stop();

    world.ticker().log_detailed_stats();
    println!("\n=== Ticker Stats (JSON) ===\n");
    println!("{}", serde_json::to_string_pretty(&world.stats())?);

    Ok(())
}

fn print_snapshot(world: &SimWorld) {
    let snapshot = world.snapshot();
    println!("--- Tick {} ---", snapshot.tick);
    for player in &snapshot.players {
        println!(
            "    {}: pos=({:.1}, {:.1}) r={:.3} score={:.0}",
            player.id, player.position.x, player.position.z, player.radius, player.score
        );
    }
    println!(
        "  food={} grid objects={}",
        snapshot.food.len(),
        snapshot.collider_objects
    );
}
