//! # Frame Demo
//!
//! Runs a small simulation through the engine and prints the work order and
//! frame statistics.
//!
//! Usage: `frame_demo [config.toml]`

use std::process::ExitCode;

use tessera::{
    EcsResult, Engine, EngineConfig, Entity, EntityTypeId, System, SystemPriority,
};

/// Number of frames to simulate.
const FRAMES: u64 = 120;

/// Frame time handed to the systems.
const DT_MS: f64 = 1000.0 / 60.0;

struct Debris {
    lifetime_ms: f64,
}

impl Entity for Debris {
    const TYPE_ID: EntityTypeId = 0;
}

#[derive(Default)]
struct Input {
    polls: u64,
}

impl System for Input {
    fn update(&mut self, _dt: f64) {
        self.polls += 1;
    }

    fn priority(&self) -> SystemPriority {
        SystemPriority::HIGH
    }
}

#[derive(Default)]
struct Physics {
    steps: u64,
}

impl System for Physics {
    fn update(&mut self, _dt: f64) {
        self.steps += 1;
    }
}

#[derive(Default)]
struct Telemetry {
    reports: u64,
}

impl System for Telemetry {
    fn post_update(&mut self, _dt: f64) {
        self.reports += 1;
    }

    fn priority(&self) -> SystemPriority {
        SystemPriority::LOW
    }

    fn update_interval(&self) -> Option<f64> {
        Some(250.0)
    }
}

fn run(config: EngineConfig) -> EcsResult<()> {
    let mut engine = Engine::new(config)?;

    let systems = engine.systems_mut();
    systems.add_system(Input::default())?;
    systems.add_system(Physics::default())?;
    systems.add_system(Telemetry::default())?;
    systems.add_system_dependency::<Physics, Input>()?;
    systems.update_system_work_order()?;

    println!("Work order:");
    for (position, name) in engine.systems().work_order_names().iter().enumerate() {
        println!("  {position}. {name}");
    }

    for i in 0..1_000 {
        engine.entities_mut().create_entity(Debris {
            lifetime_ms: f64::from(i % 60) * DT_MS,
        })?;
    }

    for _ in 0..FRAMES {
        let expired: Vec<_> = engine
            .entities()
            .iter::<Debris>()
            .filter(|(_, d)| d.lifetime_ms <= 0.0)
            .map(|(id, _)| id)
            .collect();
        for id in expired {
            engine.entities_mut().mark_for_destruction(id)?;
        }
        for (_, debris) in engine.entities_mut().iter_mut::<Debris>() {
            debris.lifetime_ms -= DT_MS;
        }

        engine.update(DT_MS)?;
    }

    let stats = engine.stats();
    println!();
    println!("Frames:              {}", stats.frames_recorded);
    println!("Average frame:       {:.3} ms", stats.avg_frame_ms());
    println!("Entities destroyed:  {}", stats.entities_destroyed);
    println!("Entities alive:      {}", engine.entities().entity_count());
    println!("Input polls:         {}", engine.systems().get_system::<Input>()?.polls);
    println!("Physics steps:       {}", engine.systems().get_system::<Physics>()?.steps);
    println!("Telemetry reports:   {}", engine.systems().get_system::<Telemetry>()?.reports);
    Ok(())
}

fn main() -> ExitCode {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(path),
        None => Ok(EngineConfig::default()),
    };

    match config.and_then(run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("frame_demo: {error}");
            ExitCode::FAILURE
        }
    }
}
