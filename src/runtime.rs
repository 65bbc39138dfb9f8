//! The simulation task: single writer over the world.
//!
//! One tokio task owns the [`World`] and alternates between the wall
//! clock and the command channel. HTTP handlers, storage, and the
//! narration desk all reach the world through this loop; nothing else
//! holds it mutably.

use std::sync::Arc;
use std::time::{Duration, Instant};

use std::collections::HashSet;

use microcosm_core::scheduler::{MaintenanceJob, TickReport};
use microcosm_core::{
    drama_score, drift_meta_awareness, should_use_llm, AppConfig, Metrics, SafetyMonitor,
    TickScheduler, World,
};
use microcosm_data::{
    BlockPos, BoundingBox, EventOutcome, EventType, Position, WorldEvent,
};
use uuid::Uuid;
use microcosm_io::StorageManager;
use microcosm_observer::{NarrationDesk, RequestKind};
use microcosm_server::{SimCommand, SimStats};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::info;

pub struct SimRuntime {
    world: World,
    scheduler: TickScheduler,
    monitor: SafetyMonitor,
    storage: Arc<StorageManager>,
    desk: NarrationDesk,
    metrics: Arc<Metrics>,
}

impl SimRuntime {
    /// Builds the runtime and seeds the initial population. Committed
    /// events flow to storage from the first tick.
    pub fn new(
        config: AppConfig,
        storage: Arc<StorageManager>,
        desk: NarrationDesk,
        metrics: Arc<Metrics>,
    ) -> Self {
        let monitor = SafetyMonitor::new(config.safety.clone(), &config.world);
        let scheduler = TickScheduler::new(config.scheduler.clone());
        let mut world = World::new(config);
        world.events.add_sink(Box::new(storage.sink()));

        // Config sets the boot speed; admin endpoints override it later.
        storage.set_speed(world.config.scheduler.speed);

        let spread = f64::from(world.config.world.half_extent) / 4.0;
        for i in 0..world.config.world.initial_actors {
            let x = world.rng.gen_range(-spread..=spread);
            let y = world.rng.gen_range(-spread..=spread);
            world.spawn_actor(format!("settler-{}", i + 1), Position::new(x, y, 0.0));
        }
        info!(actors = world.living_count(), "world populated");

        Self {
            world,
            scheduler,
            monitor,
            storage,
            desk,
            metrics,
        }
    }

    /// Registers an extra event sink, e.g. the JSONL archive.
    pub fn add_sink(&mut self, sink: Box<dyn microcosm_core::EventSink>) {
        self.world.events.add_sink(sink);
    }

    /// Drives the world until the command channel closes.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SimCommand>) {
        let tick_seconds = self.world.config.scheduler.tick_seconds;
        let mut clock = tokio::time::interval(Duration::from_secs_f64(tick_seconds));
        clock.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                maybe_cmd = commands.recv() => {
                    match maybe_cmd {
                        Some(cmd) => self.handle(cmd),
                        None => break,
                    }
                }
                _ = clock.tick() => {
                    // The controls read blocks on the storage worker;
                    // keep it off the async threads.
                    let storage = Arc::clone(&self.storage);
                    let controls =
                        tokio::task::spawn_blocking(move || storage.controls().unwrap_or_default())
                            .await
                            .unwrap_or_default();
                    if controls.pause {
                        continue;
                    }
                    for _ in 0..self.scheduler.due_ticks(controls.speed) {
                        self.step();
                    }
                }
            }
        }
        info!(tick = self.world.tick, "simulation loop stopped");
    }

    fn handle(&mut self, cmd: SimCommand) {
        match cmd {
            SimCommand::Propose(proposal, reply) => {
                let result = self.world.process(&proposal);
                if let Some(code) = result.reason_code {
                    self.metrics.record_rejection(code);
                }
                let _ = reply.send(result);
            }
            SimCommand::Actors(reply) => {
                let mut actors: Vec<_> = self.world.actors.values().cloned().collect();
                actors.sort_unstable_by_key(|a| a.id);
                let _ = reply.send(actors);
            }
            SimCommand::Stats(reply) => {
                let _ = reply.send(SimStats {
                    tick: self.world.tick,
                    living_actors: self.world.living_count(),
                    blocks: self.world.space.block_count(),
                    structures: self.world.space.structure_count(),
                    zones: self.world.space.zone_count(),
                    last_event_id: self.world.events.last_id(),
                });
            }
        }
    }

    fn step(&mut self) {
        let started = Instant::now();
        self.absorb_narrations();
        let report = self.scheduler.run_tick(&mut self.world, &self.monitor);
        self.dispatch_narrative(&report);
        self.cognition_pass(&report);
        self.metrics.record_encounters(report.encounters.len());
        self.metrics.record_interventions(report.interventions.len());
        self.metrics.record_tick(
            started.elapsed(),
            self.world.living_count(),
            self.world.space.block_count(),
        );
    }

    /// Journals finished narrations from earlier ticks.
    fn absorb_narrations(&mut self) {
        for narration in self.desk.drain() {
            let event =
                WorldEvent::new(self.world.tick, EventType::Narration, EventOutcome::Info)
                    .with_action(
                        narration.kind,
                        serde_json::json!({ "text": narration.text }),
                    )
                    .with_importance(narration.importance);
            self.world.events.append(event);
        }
    }

    fn dispatch_narrative(&self, report: &TickReport) {
        for job in &report.jobs {
            let kind = match job {
                MaintenanceJob::GodObservation => RequestKind::GodObservation,
                MaintenanceJob::WorldUpdate => RequestKind::WorldUpdate,
                MaintenanceJob::SagaCheck => RequestKind::SagaChapter,
                _ => continue,
            };
            let drama = drama_score(&self.world);
            self.desk
                .request(report.tick, kind, &self.narrative_prompt(drama), drama);
        }
    }

    /// Gates per-actor cognition behind the call-worthiness heuristic
    /// and drifts meta-awareness from this tick's interventions.
    fn cognition_pass(&mut self, report: &TickReport) {
        let intervened: HashSet<Uuid> =
            report.interventions.iter().map(|(id, _)| *id).collect();
        let mut ids: Vec<Uuid> = self.world.living().map(|a| a.id).collect();
        // Fixed order: the heuristic draws on the rng.
        ids.sort_unstable();

        let mut rng = self.world.rng.clone();
        for id in ids {
            let Some(actor) = self.world.actors.get(&id) else {
                continue;
            };
            let importance = (actor.needs.hunger / 100.0)
                .max(1.0 - actor.needs.energy / 100.0)
                .clamp(0.0, 1.0);
            if let Some(cue) = should_use_llm(&self.world, actor, importance, &mut rng) {
                self.metrics.record_cue(cue);
                let prompt = self.actor_prompt(actor, cue.as_str());
                self.desk
                    .request(report.tick, RequestKind::ActorCognition, &prompt, importance);
            }
            if let Some(actor) = self.world.actors.get_mut(&id) {
                drift_meta_awareness(actor, intervened.contains(&id));
            }
        }
        self.world.rng = rng;
    }

    /// Situation digest for one actor's cognition call.
    fn actor_prompt(&self, actor: &microcosm_data::Actor, cue: &str) -> String {
        let (x, y, z) = actor.position.rounded();
        let center = BlockPos::new(x as i32, y as i32, z as i32);
        let around = BoundingBox::from_corners(
            BlockPos::new(center.x - 4, center.y - 4, (center.z - 4).max(0)),
            BlockPos::new(center.x + 4, center.y + 4, center.z + 4),
        );
        let nearby_blocks = self.world.space.blocks_in_range(&around).len();
        let nearby_structures = self
            .world
            .space
            .structures_near(actor.position.x, actor.position.y, actor.position.z, 16.0)
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut prompt = format!(
            "You are {} at ({}, {}, {}) on tick {} ({}).\n\
             Hunger {:.0}, energy {:.0}, social {:.0}, mood {:.1}.\n\
             {} blocks nearby. Structures in reach: {}.\n",
            actor.name,
            x,
            y,
            z,
            self.world.tick,
            cue,
            actor.needs.hunger,
            actor.needs.energy,
            actor.needs.social,
            actor.emotional.mood,
            nearby_blocks,
            if nearby_structures.is_empty() {
                "none"
            } else {
                nearby_structures.as_str()
            },
        );
        for hint in &actor.hints {
            prompt.push_str(&format!("Hint: {hint}\n"));
        }
        prompt.push_str("Decide your next action.");
        prompt
    }

    /// Digest of the current world handed to the narrative tiers.
    fn narrative_prompt(&self, drama: f32) -> String {
        let mut prompt = format!(
            "Tick {}: {} living actors, {} blocks, {} structures, drama {:.2}.\nRecent notable events:\n",
            self.world.tick,
            self.world.living_count(),
            self.world.space.block_count(),
            self.world.space.structure_count(),
            drama,
        );
        for event in self.world.events.important(0.6, 12) {
            prompt.push_str(&format!(
                "- tick {} {}: {}\n",
                event.tick,
                event.event_type.as_str(),
                event
                    .action
                    .as_deref()
                    .or(event.reason.as_deref())
                    .unwrap_or("-"),
            ));
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use microcosm_data::{ActionKind, ActionProposal, ReasonCode, VoxelSpec};
    use microcosm_observer::{MemoryLedger, Orchestrator};
    use microcosm_server::SimHandle;

    fn build_runtime(config: AppConfig) -> (SimRuntime, Arc<StorageManager>) {
        let storage = Arc::new(StorageManager::in_memory().unwrap());
        let orchestrator = Arc::new(Orchestrator::new(
            Vec::new(),
            Arc::new(MemoryLedger::default()),
            config.llm.clone(),
        ));
        let desk = NarrationDesk::new(orchestrator);
        let metrics = Arc::new(Metrics::new());
        let runtime = SimRuntime::new(config, Arc::clone(&storage), desk, metrics);
        (runtime, storage)
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.world.seed = Some(11);
        config.world.initial_actors = 2;
        config
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_proposals_round_trip_through_the_loop() {
        let (runtime, _storage) = build_runtime(test_config());
        let (handle, rx) = SimHandle::channel(16);
        tokio::spawn(runtime.run(rx));

        let actors = handle.actors().await.unwrap();
        assert_eq!(actors.len(), 2);

        let result = handle
            .propose(ActionProposal {
                actor_id: actors[0].id,
                action: ActionKind::Speak {
                    message: "hello".into(),
                    target: None,
                },
            })
            .await
            .unwrap();
        assert!(result.is_accepted());

        let result = handle
            .propose(ActionProposal {
                actor_id: uuid::Uuid::new_v4(),
                action: ActionKind::Move {
                    x: 0.0,
                    y: 0.0,
                    z: 0.0,
                },
            })
            .await
            .unwrap();
        assert!(!result.is_accepted());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_racing_placements_admit_exactly_one() {
        let (runtime, _storage) = build_runtime(test_config());
        let (handle, rx) = SimHandle::channel(16);
        tokio::spawn(runtime.run(rx));

        let actors = handle.actors().await.unwrap();
        let spec = VoxelSpec {
            pos: BlockPos::new(3, 3, 0),
            color: "#aa0000".into(),
            material: "stone".into(),
            collidable: true,
        };
        let first = handle.propose(ActionProposal {
            actor_id: actors[0].id,
            action: ActionKind::PlaceVoxel {
                voxels: vec![spec.clone()],
            },
        });
        let second = handle.propose(ActionProposal {
            actor_id: actors[1].id,
            action: ActionKind::PlaceVoxel {
                voxels: vec![spec],
            },
        });
        let (a, b) = tokio::join!(first, second);
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.is_accepted(), b.is_accepted());
        let loser = if a.is_accepted() { b } else { a };
        assert_eq!(loser.reason_code, Some(ReasonCode::PositionOccupied));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_config_speed_applies_at_boot() {
        let mut config = test_config();
        config.scheduler.speed = 2.5;
        let (_runtime, storage) = build_runtime(config);
        assert_eq!(storage.controls().unwrap().speed, 2.5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_loop_survives_a_stopped_storage_worker() {
        let mut config = test_config();
        config.scheduler.tick_seconds = 0.01;
        let (runtime, storage) = build_runtime(config);
        storage.stop();
        let (handle, rx) = SimHandle::channel(16);
        tokio::spawn(runtime.run(rx));

        tokio::time::sleep(Duration::from_millis(300)).await;
        let stats = handle.stats().await.unwrap();
        assert!(stats.tick > 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_births_reach_storage_through_the_sink() {
        let (_runtime, storage) = build_runtime(test_config());
        // Spawns happen in the constructor; give the worker a moment.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let events = storage
            .query_events(microcosm_io::EventQuery {
                event_type: Some(EventType::Birth),
                ..microcosm_io::EventQuery::default()
            })
            .unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pause_halts_the_clock() {
        let mut config = test_config();
        config.scheduler.tick_seconds = 0.01;
        let (runtime, storage) = build_runtime(config);
        storage.set_pause(true);
        let (handle, rx) = SimHandle::channel(16);
        tokio::spawn(runtime.run(rx));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.tick, 0);

        storage.set_pause(false);
        tokio::time::sleep(Duration::from_millis(200)).await;
        let stats = handle.stats().await.unwrap();
        assert!(stats.tick > 0);
    }
}
