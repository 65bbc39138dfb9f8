//! Tick orchestration: clock advancement and periodic maintenance.
//!
//! The scheduler owns no world state beyond its counters. Each call to
//! `run_tick` advances the world one tick, runs per-tick upkeep and the
//! safety sweep synchronously, and reports which slower jobs are due so
//! the async runtime can fire them without holding the world.

use microcosm_data::{EventOutcome, EventType, Intervention, WorldEvent};
use tracing::info;
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::encounter::EncounterIndex;
use crate::safety::{SafetyCheck, SafetyMonitor};
use crate::world::World;

/// Periodic job that fires at a fixed tick multiple. The scheduler
/// reports due jobs; fulfilment happens outside the tick boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceJob {
    /// Episodic-memory trim for long-dead actors.
    MemoryCleanup,
    RelationshipDecay,
    /// Narrative observation from the world's top-tier voice.
    GodObservation,
    /// Full narrative refresh of the world description.
    WorldUpdate,
    /// Saga chapter check; only emitted when an era boundary passed.
    SagaCheck,
    DeathCheck,
}

/// What happened during one tick, for logging and narrative triggers.
#[derive(Debug, Default)]
pub struct TickReport {
    pub tick: u64,
    pub jobs: Vec<MaintenanceJob>,
    pub interventions: Vec<(Uuid, Vec<Intervention>)>,
    pub deaths: Vec<Uuid>,
    pub encounters: Vec<(Uuid, Uuid)>,
}

pub struct TickScheduler {
    config: SchedulerConfig,
    /// Fractional tick accumulator; speeds below 1.0 advance the world
    /// on only some wall-clock iterations, without drift.
    accumulator: f64,
    last_saga_era: u64,
}

impl TickScheduler {
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            accumulator: 0.0,
            last_saga_era: 0,
        }
    }

    /// Number of simulated ticks owed for one wall-clock iteration at
    /// the given speed multiplier.
    pub fn due_ticks(&mut self, speed: f64) -> u32 {
        self.accumulator += speed.max(0.0);
        let due = self.accumulator.floor();
        self.accumulator -= due;
        due as u32
    }

    /// Advances the world by exactly one tick.
    pub fn run_tick(&mut self, world: &mut World, monitor: &SafetyMonitor) -> TickReport {
        world.tick += 1;
        let tick = world.tick;
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        self.upkeep(world);
        report.encounters = self.detect_encounters(world);
        report.interventions = self.safety_sweep(world, monitor);

        if tick % self.config.death_check_interval == 0 {
            report.jobs.push(MaintenanceJob::DeathCheck);
            report.deaths = self.death_check(world);
        }
        if tick % self.config.saga_check_interval == 0 {
            let era = tick / self.config.world_update_interval;
            if era > self.last_saga_era {
                self.last_saga_era = era;
                report.jobs.push(MaintenanceJob::SagaCheck);
            }
        }
        if tick % self.config.relationship_decay_interval == 0 {
            let relationship = world.config.relationship.clone();
            world.relationships.decay_all(&relationship, tick);
            report.jobs.push(MaintenanceJob::RelationshipDecay);
        }
        if tick % self.config.memory_cleanup_interval == 0 {
            self.memory_cleanup(world);
            report.jobs.push(MaintenanceJob::MemoryCleanup);
        }
        if tick % self.config.god_observation_interval == 0 {
            report.jobs.push(MaintenanceJob::GodObservation);
        }
        if tick % self.config.world_update_interval == 0 {
            report.jobs.push(MaintenanceJob::WorldUpdate);
        }

        if !report.jobs.is_empty() {
            info!(tick, jobs = ?report.jobs, "maintenance due");
        }
        report
    }

    /// Per-tick aging and resource regeneration.
    fn upkeep(&self, world: &mut World) {
        use rayon::prelude::*;
        world
            .actors
            .par_iter_mut()
            .filter(|(_, a)| a.alive)
            .for_each(|(_, actor)| {
                actor.needs.hunger = (actor.needs.hunger + 0.05).min(100.0);
                actor.needs.energy = (actor.needs.energy + 0.1).min(100.0);
                actor.needs.social = (actor.needs.social - 0.02).max(0.0);
            });
        for feature in world.space.features_mut() {
            feature.regenerate();
        }
    }

    /// Finds actor pairs within encounter range and warms their ties.
    fn detect_encounters(&self, world: &mut World) -> Vec<(Uuid, Uuid)> {
        let mut living: Vec<(Uuid, f64, f64, f64)> = world
            .actors
            .values()
            .filter(|a| a.alive)
            .map(|a| (a.id, a.position.x, a.position.y, a.position.z))
            .collect();
        living.sort_unstable_by_key(|(id, ..)| *id);
        if living.len() < 2 {
            return Vec::new();
        }

        let base = world.config.encounter.radius;
        let boost = world.config.encounter.landmark_multiplier;
        let positions: Vec<(f64, f64, f64)> =
            living.iter().map(|&(_, x, y, z)| (x, y, z)).collect();
        let radii: Vec<f64> = living
            .iter()
            .map(|&(_, x, y, _)| {
                if world.space.landmarks_near(x, y, base * boost).is_empty() {
                    base
                } else {
                    base * boost
                }
            })
            .collect();

        let index = EncounterIndex::build(&positions, base);
        let tick = world.tick;
        let mut out = Vec::new();
        for (i, j) in index.pairs(|idx| radii[idx]) {
            let (a, b) = (living[i].0, living[j].0);
            world.relationships.reinforce_mutual(a, b, 0.01, tick);
            out.push((a.min(b), a.max(b)));
        }
        out
    }

    /// Runs the safety monitor over every living actor and journals
    /// each intervention.
    fn safety_sweep(
        &self,
        world: &mut World,
        monitor: &SafetyMonitor,
    ) -> Vec<(Uuid, Vec<Intervention>)> {
        let tick = world.tick;
        let mut ids: Vec<Uuid> = world
            .actors
            .values()
            .filter(|a| a.alive)
            .map(|a| a.id)
            .collect();
        // Fixed order: the checks draw on the world rng.
        ids.sort_unstable();

        let mut fired = Vec::new();
        for id in ids {
            let Some(actor) = world.actors.get_mut(&id) else {
                continue;
            };
            if let SafetyCheck::Intervened(tags) = monitor.check(actor, tick, &mut world.rng) {
                let position = actor.position;
                for tag in &tags {
                    let event = WorldEvent::new(tick, EventType::Intervention, EventOutcome::Info)
                        .with_actor(id)
                        .with_action(tag.as_str(), serde_json::Value::Null)
                        .with_position(position)
                        .with_importance(0.6);
                    world.events.append(event);
                }
                fired.push((id, tags));
            }
        }
        fired
    }

    /// Kills actors whose needs have collapsed.
    fn death_check(&self, world: &mut World) -> Vec<Uuid> {
        let mut doomed: Vec<(Uuid, &'static str)> = world
            .actors
            .values()
            .filter(|a| a.alive)
            .filter_map(|a| {
                if a.needs.hunger >= 100.0 {
                    Some((a.id, "starvation"))
                } else if a.needs.energy <= 0.0 {
                    Some((a.id, "exhaustion"))
                } else {
                    None
                }
            })
            .collect();
        doomed.sort_unstable_by_key(|&(id, _)| id);
        for &(id, cause) in &doomed {
            world.kill_actor(id, cause);
        }
        doomed.into_iter().map(|(id, _)| id).collect()
    }

    /// Trims transient cognition state from long-dead actors.
    fn memory_cleanup(&self, world: &mut World) {
        for actor in world.actors.values_mut().filter(|a| !a.alive) {
            actor.hints.clear();
            actor.pending_action = None;
        }
    }
}
