//! Per-actor anomaly detection and automatic correction.
//!
//! Three independent detectors share one rolling state blob on the
//! actor: identical-action loops, stuck positions, and sustained
//! hostility. Detectors never fail; they only mutate actor state and
//! return intervention tags for logging.

use microcosm_data::{Actor, BehaviorMode, Intervention, Position};
use rand::Rng;

use crate::config::{SafetyConfig, WorldConfig};

/// Outcome of one safety sweep over an actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyCheck {
    /// Actor is inside a post-intervention cooldown window; all
    /// detectors were skipped.
    Cooldown,
    /// Counters advanced, no threshold crossed.
    Clear,
    /// One or more detectors fired this tick.
    Intervened(Vec<Intervention>),
}

pub struct SafetyMonitor {
    config: SafetyConfig,
    half_extent: i32,
}

impl SafetyMonitor {
    #[must_use]
    pub fn new(config: SafetyConfig, world: &WorldConfig) -> Self {
        Self {
            config,
            half_extent: world.half_extent,
        }
    }

    /// Runs all detectors for `actor` at `tick`.
    ///
    /// Cooldown is checked first and short-circuits everything else.
    /// Any intervention resets the rolling counters and opens a new
    /// cooldown window, so an immediate re-check reports `Cooldown`
    /// with no further mutation.
    pub fn check(&self, actor: &mut Actor, tick: u64, rng: &mut impl Rng) -> SafetyCheck {
        if actor.safety.in_cooldown(tick) {
            return SafetyCheck::Cooldown;
        }

        let mut fired = Vec::new();

        if self.detect_loop(actor) {
            actor.pending_action = None;
            actor.push_hint("You keep doing the same thing. Try something different.");
            fired.push(Intervention::BreakLoop);
        }

        if self.detect_stuck(actor) {
            let x = rng.gen_range(-self.half_extent..=self.half_extent);
            let y = rng.gen_range(-self.half_extent..=self.half_extent);
            actor.position = Position::new(f64::from(x), f64::from(y), 0.0);
            actor.push_hint("You were going nowhere, so the world moved you somewhere new.");
            fired.push(Intervention::Unstick);
        }

        if self.detect_rampage(actor) {
            actor.behavior = BehaviorMode::Neutral;
            actor.emotional.calm_until = Some(tick + self.config.cooldown_ticks);
            actor.emotional.mood = 0.0;
            actor.push_hint("Your anger has burned itself out.");
            fired.push(Intervention::PacifyRampage);
        }

        if fired.is_empty() {
            SafetyCheck::Clear
        } else {
            actor.safety.reset_counters();
            actor.safety.cooldown_until = Some(tick + self.config.cooldown_ticks);
            SafetyCheck::Intervened(fired)
        }
    }

    /// Advances the repeat counter; true once it reaches the threshold.
    fn detect_loop(&self, actor: &mut Actor) -> bool {
        let Some(current) = actor.pending_action.clone() else {
            actor.safety.repeat_count = 0;
            actor.safety.last_action = None;
            return false;
        };
        if actor.safety.last_action.as_deref() == Some(current.as_str()) {
            actor.safety.repeat_count += 1;
        } else {
            actor.safety.repeat_count = 1;
            actor.safety.last_action = Some(current);
        }
        actor.safety.repeat_count >= self.config.loop_threshold
    }

    fn detect_stuck(&self, actor: &mut Actor) -> bool {
        let here = actor.position.rounded();
        if actor.safety.last_position == Some(here) {
            actor.safety.stuck_ticks += 1;
        } else {
            actor.safety.stuck_ticks = 0;
            actor.safety.last_position = Some(here);
        }
        actor.safety.stuck_ticks >= self.config.stuck_threshold
    }

    fn detect_rampage(&self, actor: &mut Actor) -> bool {
        if actor.behavior.is_hostile() {
            actor.safety.rampage_ticks += 1;
        } else {
            actor.safety.rampage_ticks = 0;
        }
        actor.safety.rampage_ticks >= self.config.rampage_threshold
    }
}
