//! Configuration management for world parameters.
//!
//! Strongly-typed structures that map to the `config.toml` file. Defaults
//! are hardcoded in the `Default` impls and overridden by the file.
//!
//! ## Example `config.toml`
//!
//! ```toml
//! [world]
//! half_extent = 256
//! build_height = 64
//! seed = 42
//! deterministic = true
//!
//! [safety]
//! loop_threshold = 10
//! stuck_threshold = 30
//! ```

use serde::{Deserialize, Serialize};

/// World-level parameters: spatial bounds and determinism.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorldConfig {
    /// Horizontal half-extent; valid x and y lie in [-half_extent, half_extent].
    pub half_extent: i32,
    /// Maximum build height; valid z lies in [0, build_height].
    pub build_height: i32,
    pub initial_actors: usize,
    pub seed: Option<u64>,
    pub deterministic: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            half_extent: 256,
            build_height: 64,
            initial_actors: 8,
            seed: None,
            deterministic: false,
        }
    }
}

/// Limits the arbiter enforces on individual proposals.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ArbitrationConfig {
    /// Maximum voxels in a single place or structure proposal.
    pub max_voxels_per_action: usize,
    /// Maximum cells a zone's bounding box may span.
    pub max_zone_cells: u64,
    /// Maximum Euclidean distance a single move may cover.
    pub max_move_distance: f64,
    /// Maximum distance at which an interact verb reaches its target.
    pub interact_range: f64,
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            max_voxels_per_action: 64,
            max_zone_cells: 4096,
            max_move_distance: 10.0,
            interact_range: 5.0,
        }
    }
}

/// Proximity detection parameters.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EncounterConfig {
    /// Base encounter radius in world units.
    pub radius: f64,
    /// Radius multiplier applied near architecture landmarks.
    pub landmark_multiplier: f64,
}

impl Default for EncounterConfig {
    fn default() -> Self {
        Self {
            radius: 8.0,
            landmark_multiplier: 1.5,
        }
    }
}

/// Thresholds for the behavioral safety monitor, measured in ticks.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SafetyConfig {
    /// Identical consecutive actions before a loop intervention.
    pub loop_threshold: u32,
    /// Ticks without net movement before an unstick intervention.
    pub stuck_threshold: u32,
    /// Ticks of sustained hostility before a pacify intervention.
    pub rampage_threshold: u32,
    /// Cooldown window applied after any intervention.
    pub cooldown_ticks: u64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            loop_threshold: 10,
            stuck_threshold: 30,
            rampage_threshold: 100,
            cooldown_ticks: 20,
        }
    }
}

/// Cadence of periodic maintenance jobs, in ticks.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SchedulerConfig {
    /// Base wall-clock seconds per tick at speed 1.0.
    pub tick_seconds: f64,
    /// Initial speed multiplier; fractional values slow the world down.
    pub speed: f64,
    pub memory_cleanup_interval: u64,
    pub relationship_decay_interval: u64,
    pub god_observation_interval: u64,
    pub world_update_interval: u64,
    pub saga_check_interval: u64,
    pub death_check_interval: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 1.0,
            speed: 1.0,
            memory_cleanup_interval: 600,
            relationship_decay_interval: 100,
            god_observation_interval: 900,
            world_update_interval: 3600,
            saga_check_interval: 50,
            death_check_interval: 10,
        }
    }
}

/// Social dynamics parameters.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RelationshipConfig {
    /// Fraction of affinity removed per decay pass.
    pub decay_rate: f32,
    /// Relationships idle longer than this many ticks decay faster.
    pub idle_ticks: u64,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.02,
            idle_ticks: 1000,
        }
    }
}

/// Language-model routing and spending limits.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LlmConfig {
    /// Daily spend ceiling for the top tier, in integer cents.
    pub god_daily_budget_cents: i64,
    /// Daily spend ceiling for the premium tier, in integer cents.
    pub premium_daily_budget_cents: i64,
    /// Estimated cost charged per top-tier call, in cents.
    pub god_call_cost_cents: i64,
    /// Estimated cost charged per premium call, in cents.
    pub premium_call_cost_cents: i64,
    pub god_model: String,
    pub premium_model: String,
    pub local_model: String,
    pub god_endpoint: String,
    pub premium_endpoint: String,
    pub local_endpoint: String,
    /// Request timeout in seconds for remote backends.
    pub request_timeout_secs: u64,
    /// Ledger rows older than this many days are purged.
    pub ledger_expiry_days: i64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            god_daily_budget_cents: 500,
            premium_daily_budget_cents: 200,
            god_call_cost_cents: 5,
            premium_call_cost_cents: 1,
            god_model: "gpt-4o".into(),
            premium_model: "gpt-4o-mini".into(),
            local_model: "llama3.2".into(),
            god_endpoint: "https://api.openai.com/v1/chat/completions".into(),
            premium_endpoint: "https://api.openai.com/v1/chat/completions".into(),
            local_endpoint: "http://localhost:11434/api/chat".into(),
            request_timeout_secs: 30,
            ledger_expiry_days: 7,
        }
    }
}

/// Top-level configuration. Missing sections fall back to defaults.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub world: WorldConfig,
    pub arbitration: ArbitrationConfig,
    pub encounter: EncounterConfig,
    pub safety: SafetyConfig,
    pub scheduler: SchedulerConfig,
    pub relationship: RelationshipConfig,
    pub llm: LlmConfig,
}

impl AppConfig {
    /// Validates all configuration parameters, returning the first failure.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.world.half_extent > 0, "World half-extent must be positive");
        anyhow::ensure!(
            self.world.half_extent <= 100_000,
            "World half-extent too large (max 100000)"
        );
        anyhow::ensure!(self.world.build_height > 0, "Build height must be positive");
        anyhow::ensure!(
            self.world.build_height <= 1024,
            "Build height too large (max 1024)"
        );

        anyhow::ensure!(
            self.arbitration.max_voxels_per_action > 0,
            "Max voxels per action must be positive"
        );
        anyhow::ensure!(
            self.arbitration.max_zone_cells > 0,
            "Max zone cells must be positive"
        );
        anyhow::ensure!(
            self.arbitration.max_move_distance > 0.0,
            "Max move distance must be positive"
        );
        anyhow::ensure!(
            self.arbitration.interact_range > 0.0,
            "Interact range must be positive"
        );

        anyhow::ensure!(self.encounter.radius > 0.0, "Encounter radius must be positive");
        anyhow::ensure!(
            self.encounter.landmark_multiplier >= 1.0,
            "Landmark multiplier must be at least 1.0"
        );

        anyhow::ensure!(self.safety.loop_threshold > 0, "Loop threshold must be positive");
        anyhow::ensure!(self.safety.stuck_threshold > 0, "Stuck threshold must be positive");
        anyhow::ensure!(
            self.safety.rampage_threshold > 0,
            "Rampage threshold must be positive"
        );

        anyhow::ensure!(
            self.scheduler.tick_seconds > 0.0,
            "Tick duration must be positive"
        );
        anyhow::ensure!(self.scheduler.speed > 0.0, "Speed must be positive");
        anyhow::ensure!(self.scheduler.speed <= 64.0, "Speed too high (max 64)");

        anyhow::ensure!(
            (0.0..=1.0).contains(&self.relationship.decay_rate),
            "Relationship decay rate must be in [0.0, 1.0]"
        );

        anyhow::ensure!(
            self.llm.god_daily_budget_cents >= 0,
            "Top-tier budget must be non-negative"
        );
        anyhow::ensure!(
            self.llm.premium_daily_budget_cents >= 0,
            "Premium budget must be non-negative"
        );
        anyhow::ensure!(
            self.llm.request_timeout_secs > 0,
            "Request timeout must be positive"
        );
        anyhow::ensure!(
            self.llm.ledger_expiry_days > 0,
            "Ledger expiry must be positive"
        );

        Ok(())
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config = toml::from_str::<Self>(content)?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}", self.world).as_bytes());
        hasher.update(format!("{:?}", self.arbitration).as_bytes());
        hasher.update(format!("{:?}", self.encounter).as_bytes());
        hasher.update(format!("{:?}", self.safety).as_bytes());
        hasher.update(format!("{:?}", self.scheduler).as_bytes());
        hasher.update(format!("{:?}", self.relationship).as_bytes());
        hex::encode(hasher.finalize())
    }
}
