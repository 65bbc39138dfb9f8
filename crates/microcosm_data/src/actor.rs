use crate::safety::SafetyState;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// World position of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position.
    #[must_use]
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Position rounded to the integer grid, used for stuck detection.
    #[must_use]
    pub fn rounded(&self) -> (i64, i64, i64) {
        (
            self.x.round() as i64,
            self.y.round() as i64,
            self.z.round() as i64,
        )
    }
}

/// Facing direction in the horizontal plane, radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Facing(pub f64);

/// Physiological needs, each in [0, 100].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Needs {
    pub hunger: f32,
    pub energy: f32,
    pub social: f32,
}

impl Default for Needs {
    fn default() -> Self {
        Self {
            hunger: 0.0,
            energy: 100.0,
            social: 50.0,
        }
    }
}

/// Current behavior mode driving an actor's cheap deterministic policy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "data")]
pub enum BehaviorMode {
    #[default]
    Neutral,
    Wandering,
    Building,
    Socializing,
    /// Sustained aggression; subject to the rampage timeout.
    Hostile {
        target: Option<Uuid>,
    },
}

impl BehaviorMode {
    #[must_use]
    pub fn is_hostile(&self) -> bool {
        matches!(self, BehaviorMode::Hostile { .. })
    }
}

/// Emotional modulation written by interventions and narrative events.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EmotionalState {
    /// Valence in [-1, 1]; negative is distressed.
    pub mood: f32,
    /// Tick until which the actor is in an enforced emotional cooldown.
    pub calm_until: Option<u64>,
}

/// Immutable personality vector assigned at spawn.
///
/// Axes: openness, conscientiousness, extraversion, agreeableness,
/// and neuroticism, each in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Personality(pub [f32; 5]);

impl Default for Personality {
    fn default() -> Self {
        Self([0.5; 5])
    }
}

/// A being in the simulation. Human-driven avatars and autonomous
/// agents are represented identically; nothing in this record reveals
/// which is which.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
    pub position: Position,
    pub facing: Facing,
    pub needs: Needs,
    pub inventory: Vec<String>,
    pub behavior: BehaviorMode,
    pub personality: Personality,
    pub emotional: EmotionalState,
    pub safety: SafetyState,
    /// How aware the actor is that it lives in a simulation, 0–100.
    pub meta_awareness: f32,
    pub alive: bool,
    pub birth_tick: u64,
    pub death_tick: Option<u64>,
    /// Elevated privilege: may mutate any zone or structure.
    #[serde(default)]
    pub god: bool,
    /// Action queued by cognition for the next arbitration pass.
    #[serde(default)]
    pub pending_action: Option<String>,
    /// Bounded introspection hints injected by safety interventions.
    #[serde(default)]
    pub hints: Vec<String>,
}

impl Actor {
    /// Creates a live actor at a position with default state.
    #[must_use]
    pub fn spawn(name: impl Into<String>, position: Position, birth_tick: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            position,
            facing: Facing::default(),
            needs: Needs::default(),
            inventory: Vec::new(),
            behavior: BehaviorMode::Neutral,
            personality: Personality::default(),
            emotional: EmotionalState::default(),
            safety: SafetyState::default(),
            meta_awareness: 0.0,
            alive: true,
            birth_tick,
            death_tick: None,
            god: false,
            pending_action: None,
            hints: Vec::new(),
        }
    }

    /// Soft-deletes the actor; the record stays for history.
    pub fn die(&mut self, tick: u64) {
        self.alive = false;
        self.death_tick = Some(tick);
    }

    /// Pushes an introspection hint, keeping only the most recent few.
    pub fn push_hint(&mut self, hint: impl Into<String>) {
        const MAX_HINTS: usize = 8;
        self.hints.push(hint.into());
        if self.hints.len() > MAX_HINTS {
            let drop = self.hints.len() - MAX_HINTS;
            self.hints.drain(0..drop);
        }
    }
}
