//! The world aggregate: actors, spatial state, journal, and clock.

use std::collections::HashMap;

use microcosm_data::{Actor, EventOutcome, EventType, Position, WorldEvent};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::event_log::EventLog;
use crate::relationship::RelationshipTable;
use crate::voxel::VoxelSpace;

/// Number of recent events retained in memory; durable sinks keep the
/// rest.
const EVENT_WINDOW: usize = 10_000;

/// Authoritative simulation state. All mutation flows through the
/// arbitration and scheduling paths; there is exactly one `World` per
/// instance and exactly one task that holds it mutably.
pub struct World {
    pub config: AppConfig,
    pub tick: u64,
    pub actors: HashMap<Uuid, Actor>,
    pub space: VoxelSpace,
    pub relationships: RelationshipTable,
    pub events: EventLog,
    pub rng: ChaCha8Rng,
}

impl World {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        let rng = match config.world.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let space = VoxelSpace::new(&config.world);
        Self {
            config,
            tick: 0,
            actors: HashMap::new(),
            space,
            relationships: RelationshipTable::new(),
            events: EventLog::new(EVENT_WINDOW),
            rng,
        }
    }

    /// Spawns a named actor and journals the birth. In deterministic
    /// mode the id comes from the world rng, so replays agree on it.
    pub fn spawn_actor(&mut self, name: impl Into<String>, position: Position) -> Uuid {
        let mut actor = Actor::spawn(name, position, self.tick);
        if self.config.world.deterministic {
            actor.id = Uuid::from_u128(self.rng.gen());
        }
        let id = actor.id;
        let event = WorldEvent::new(self.tick, EventType::Birth, EventOutcome::Info)
            .with_actor(id)
            .with_position(position)
            .with_importance(0.7);
        self.events.append(event);
        self.actors.insert(id, actor);
        id
    }

    /// Marks an actor dead and journals it. The record is kept.
    pub fn kill_actor(&mut self, id: Uuid, cause: &str) {
        let Some(actor) = self.actors.get_mut(&id) else {
            return;
        };
        if !actor.alive {
            return;
        }
        actor.die(self.tick);
        let position = actor.position;
        let event = WorldEvent::new(self.tick, EventType::Death, EventOutcome::Info)
            .with_actor(id)
            .with_position(position)
            .with_reason(cause.to_string())
            .with_importance(0.9);
        self.events.append(event);
        self.relationships.remove_actor(id);
    }

    #[must_use]
    pub fn actor(&self, id: Uuid) -> Option<&Actor> {
        self.actors.get(&id)
    }

    /// Living actors, unordered.
    pub fn living(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values().filter(|a| a.alive)
    }

    #[must_use]
    pub fn living_count(&self) -> usize {
        self.actors.values().filter(|a| a.alive).count()
    }
}
