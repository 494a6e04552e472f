use ant_colony_core::{
    BehaviorMode, Channel, DensityField, EventKind, Obstacle, ParameterStore, RecordingEventHook,
    SimConfig, Vec2, World,
};

const DT: f64 = 1.0 / 60.0;

#[test]
fn random_foragers_stay_in_bounds_and_deliveries_never_decrease() {
    let hook = RecordingEventHook::new();
    let mut world = World::new(SimConfig::default(), ParameterStore::default())
        .with_event_hook(hook.clone());
    world
        .add_nest(Vec2::new(200.0, 400.0), BehaviorMode::Random, 50)
        .unwrap();
    world.scatter_food(80);

    let mut delivered = 0;
    for _ in 0..1000 {
        world.tick(DT);
        for agent in &world.agents {
            assert!((0.0..=1000.0).contains(&agent.position.x));
            assert!((0.0..=800.0).contains(&agent.position.y));
        }
        let now = world.nests[0].delivered();
        assert!(now >= delivered);
        delivered = now;
    }
    assert_eq!(world.agents.len(), 50);
    assert_eq!(hook.count(EventKind::FoodDropped) as u64, delivered);
}

#[test]
fn zero_time_tick_leaves_field_untouched() {
    let mut field = DensityField::new(1000.0, 800.0, 2.0, ParameterStore::default());
    let at = Vec2::new(5.0 * 2.0 + 1.0, 5.0 * 2.0 + 1.0);
    assert_eq!(field.cell_of(at), Some((5, 5)));
    field.deposit(at, Channel::Food, 1.0);
    field.tick(0.0);
    assert_eq!(field.cell_value(5, 5, Channel::Food), Some(1.0));
    assert_eq!(field.total(Channel::Food), 1.0);
}

#[test]
fn trail_foragers_lay_home_trail_and_food_avoids_obstacles() {
    let mut world = World::new(SimConfig::default(), ParameterStore::default());
    world.add_obstacle(Obstacle::rectangle(Vec2::new(500.0, 400.0), 40.0, 300.0));
    world
        .add_nest(Vec2::new(200.0, 400.0), BehaviorMode::BothTrails, 100)
        .unwrap();
    world.add_obstacle(Obstacle::circle(Vec2::new(800.0, 400.0), 20.0));
    world.add_clump(Vec2::new(800.0, 400.0), 60);

    let summary = world.run_experiment(120, DT, 60);
    assert_eq!(summary.samples.len(), 2);
    let first = &summary.samples[0];
    assert!(first.home_total > 0.0);
    assert!(first.home_active_cells > 0);
    assert_eq!(first.active_agents, 100);
    assert_eq!(world.food.len(), 60);
    for food in &world.food {
        assert!(!world.obstacles().intersects(food.position, world.config().food_size / 2.0));
    }
    for agent in &world.agents {
        assert!(agent.position.is_finite());
    }
}
