use ant_colony_core::{BehaviorMode, Obstacle, Vec2, World};
use anyhow::{Context, Result};
use clap::ValueEnum;

const DEMO_AGENTS: usize = 10;
const DEMO_FOOD: usize = 80;
const BRIDGE_AGENTS: usize = 500;
const JUNCTION_AGENTS: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// One nest of random walkers and loose food.
    Demo,
    /// Nest and a large clump separated by a wall with two detours.
    DoubleBridge,
    /// Nest below a gap between two walls, clumps left, right and ahead.
    TJunction,
    /// Configurable nests and randomly placed clumps.
    Full,
}

/// Knobs used by [`Scenario::Full`].
#[derive(Clone, Copy, Debug)]
pub struct FullOptions {
    pub nests: usize,
    pub agents: usize,
    pub clumps: usize,
    pub clump_size: usize,
}

impl Default for FullOptions {
    fn default() -> Self {
        Self {
            nests: 1,
            agents: 200,
            clumps: 3,
            clump_size: 100,
        }
    }
}

pub fn build(scenario: Scenario, world: &mut World, full: FullOptions) -> Result<()> {
    let size = world.map_size();
    match scenario {
        Scenario::Demo => {
            world
                .add_nest(size * 0.5, BehaviorMode::Random, DEMO_AGENTS)
                .context("failed to add demo nest")?;
            world.scatter_food(DEMO_FOOD);
        }
        Scenario::DoubleBridge => {
            let nest = Vec2::new(size.x * 0.2, size.y * 0.5);
            world
                .add_nest(nest, BehaviorMode::BothTrails, BRIDGE_AGENTS)
                .context("failed to add bridge nest")?;
            let food = Vec2::new(nest.x + 600.0, nest.y);
            let wall_x = (nest.x + food.x) / 2.0;
            world.add_clump(food, 2000);
            world.add_clump(Vec2::new(wall_x, nest.y - 150.0), 250);
            world.add_clump(Vec2::new(wall_x, food.y + 300.0), 250);
            world.add_obstacle(Obstacle::rectangle(
                Vec2::new(wall_x, nest.y + 100.0),
                100.0,
                300.0,
            ));
        }
        Scenario::TJunction => {
            let wall_width = 400.0;
            let centre = size.x * 0.5;
            world.add_obstacle(Obstacle::rectangle(
                Vec2::new(centre - wall_width / 2.0 - 100.0, 560.0),
                wall_width,
                400.0,
            ));
            world.add_obstacle(Obstacle::rectangle(
                Vec2::new(centre + wall_width / 2.0 + 100.0, 560.0),
                wall_width,
                400.0,
            ));
            world
                .add_nest(Vec2::new(centre, size.y), BehaviorMode::BothTrails, JUNCTION_AGENTS)
                .context("failed to add junction nest")?;
            let junction_y = size.y * 0.5;
            world.add_clump(Vec2::new(centre - 250.0, junction_y - 200.0), 1000);
            world.add_clump(Vec2::new(centre + 250.0, junction_y - 200.0), 1000);
            world.add_clump(Vec2::new(centre, junction_y - 50.0), 200);
        }
        Scenario::Full => {
            for i in 0..full.nests {
                // spread along the bottom edge
                let x = size.x * (i as f64 + 1.0) / (full.nests as f64 + 1.0);
                world
                    .add_nest(Vec2::new(x, size.y), BehaviorMode::BothTrails, full.agents)
                    .with_context(|| format!("failed to add nest {i}"))?;
            }
            world.add_random_clumps(full.clumps, full.clump_size);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ant_colony_core::{ParameterStore, SimConfig};

    fn world() -> World {
        World::new(SimConfig::default(), ParameterStore::default())
    }

    #[test]
    fn every_scenario_builds_on_default_map() {
        for scenario in Scenario::value_variants() {
            let mut w = world();
            build(*scenario, &mut w, FullOptions::default()).unwrap();
            assert!(!w.nests.is_empty(), "{scenario:?} has a nest");
        }
    }

    #[test]
    fn bridge_wall_sits_between_nest_and_food() {
        let mut w = world();
        build(Scenario::DoubleBridge, &mut w, FullOptions::default()).unwrap();
        assert_eq!(w.obstacles().len(), 1);
        let nest = w.nests[0].position;
        let food = w.clumps[0].center;
        assert!(w.obstacles().segment_blocked(nest, food, 0.0));
    }
}
