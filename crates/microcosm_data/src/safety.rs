use serde::{Deserialize, Serialize};

/// Corrective action the safety monitor applies to a misbehaving actor.
/// Application is idempotent per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intervention {
    /// Identical-action loop: clear the pending action and inject a hint.
    BreakLoop,
    /// No net movement for too long: nudge the actor to a nearby free spot.
    Unstick,
    /// Sustained hostility: force a calm-down and cooldown window.
    PacifyRampage,
}

impl Intervention {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Intervention::BreakLoop => "break_loop",
            Intervention::Unstick => "unstick",
            Intervention::PacifyRampage => "pacify_rampage",
        }
    }
}

/// Per-actor rolling counters the safety monitor maintains each tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafetyState {
    /// Consecutive repetitions of the same action signature.
    pub repeat_count: u32,
    /// Signature of the last observed action, if any.
    pub last_action: Option<String>,
    /// Consecutive ticks without meaningful movement.
    pub stuck_ticks: u32,
    /// Rounded position at the last stuck check.
    pub last_position: Option<(i64, i64, i64)>,
    /// Consecutive ticks spent in a hostile behavior mode.
    pub rampage_ticks: u32,
    /// Tick until which the actor is in post-intervention cooldown.
    pub cooldown_until: Option<u64>,
}

impl SafetyState {
    #[must_use]
    pub fn in_cooldown(&self, tick: u64) -> bool {
        self.cooldown_until.is_some_and(|until| tick < until)
    }

    /// Resets rolling counters after an intervention, leaving the
    /// cooldown window untouched.
    pub fn reset_counters(&mut self) {
        self.repeat_count = 0;
        self.last_action = None;
        self.stuck_ticks = 0;
        self.rampage_ticks = 0;
    }
}
