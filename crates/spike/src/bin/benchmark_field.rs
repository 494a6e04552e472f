use ant_colony_core::{BehaviorMode, Obstacle, ParameterStore, SimConfig, Vec2, World};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use std::time::Instant;

const AGENTS_PER_NEST: usize = 2_000;
const NESTS: usize = 4;
const OBSTACLES: usize = 40;
const WARMUP_STEPS: usize = 10;
const STEPS: usize = 300;
const DT: f64 = 1.0 / 60.0;

fn build_world(config: SimConfig) -> World {
    let mut rng = ChaCha12Rng::seed_from_u64(config.seed);
    let (w, h) = (config.map_width, config.map_height);
    let mut world = World::new(config, ParameterStore::default());
    for _ in 0..OBSTACLES {
        let center = Vec2::new(rng.random::<f64>() * w, rng.random::<f64>() * h * 0.6);
        world.add_obstacle(Obstacle::circle(center, 10.0 + rng.random::<f64>() * 30.0));
    }
    for i in 0..NESTS {
        let x = w * (i as f64 + 1.0) / (NESTS as f64 + 1.0);
        world
            .add_nest(Vec2::new(x, h * 0.9), BehaviorMode::BothTrails, AGENTS_PER_NEST)
            .unwrap_or_else(|e| panic!("{e}"));
    }
    world.add_random_clumps(4, 500);
    world
}

fn run(frame_skip: u32) {
    let config = SimConfig {
        map_width: 2000.0,
        map_height: 1600.0,
        field_frame_skip: frame_skip,
        seed: 42,
        ..SimConfig::default()
    };
    let mut world = build_world(config);
    for _ in 0..WARMUP_STEPS {
        world.tick(DT);
    }

    let (mut spatial, mut navigation, mut interaction, mut field) = (0u64, 0u64, 0u64, 0u64);
    let start = Instant::now();
    for _ in 0..STEPS {
        let t = world.tick(DT);
        spatial += t.spatial_build_us;
        navigation += t.navigation_us;
        interaction += t.interaction_us;
        field += t.field_us;
    }
    let elapsed = start.elapsed();
    let per_step = |us: u64| us as f64 / STEPS as f64;

    println!("--- field_frame_skip = {frame_skip} ---");
    println!("  Avg step:   {:?}", elapsed / STEPS as u32);
    println!(
        "  Breakdown:  spatial={:.0} us, navigation={:.0} us, interaction={:.0} us, field={:.0} us",
        per_step(spatial),
        per_step(navigation),
        per_step(interaction),
        per_step(field),
    );
    println!("  Delivered:  {}", world.total_delivered());
}

fn main() {
    if cfg!(debug_assertions) {
        eprintln!("WARNING: running in debug mode. Results are not representative.");
        eprintln!("         Use: cargo run -p ant-colony-cli --release --bin benchmark_field");
        eprintln!();
    }
    println!(
        "Benchmarking {} agents over {STEPS} steps",
        AGENTS_PER_NEST * NESTS
    );
    for frame_skip in [1, 3, 6] {
        run(frame_skip);
    }
}
