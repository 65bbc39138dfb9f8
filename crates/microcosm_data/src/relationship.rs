use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Directed social tie from one actor to another. Affinity drifts toward
/// zero over time unless reinforced by interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub actor_id: Uuid,
    pub target_id: Uuid,
    /// Signed strength in [-1, 1]; positive is friendly.
    pub affinity: f32,
    /// Familiarity in [0, 1]; grows with repeated contact.
    pub familiarity: f32,
    pub last_interaction_tick: u64,
}

impl Relationship {
    #[must_use]
    pub fn new(actor_id: Uuid, target_id: Uuid, tick: u64) -> Self {
        Self {
            actor_id,
            target_id,
            affinity: 0.0,
            familiarity: 0.0,
            last_interaction_tick: tick,
        }
    }

    /// Records an interaction of the given valence at `tick`.
    pub fn reinforce(&mut self, valence: f32, tick: u64) {
        self.affinity = (self.affinity + valence).clamp(-1.0, 1.0);
        self.familiarity = (self.familiarity + 0.05).min(1.0);
        self.last_interaction_tick = tick;
    }

    /// Applies one decay step, pulling affinity toward zero.
    pub fn decay(&mut self, rate: f32) {
        self.affinity *= 1.0 - rate;
        if self.affinity.abs() < 0.01 {
            self.affinity = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reinforce_clamps_affinity() {
        let mut r = Relationship::new(Uuid::new_v4(), Uuid::new_v4(), 0);
        r.reinforce(0.8, 1);
        r.reinforce(0.8, 2);
        assert_eq!(r.affinity, 1.0);
        assert_eq!(r.last_interaction_tick, 2);
    }

    #[test]
    fn test_decay_snaps_to_zero() {
        let mut r = Relationship::new(Uuid::new_v4(), Uuid::new_v4(), 0);
        r.affinity = 0.02;
        r.decay(0.5);
        assert_eq!(r.affinity, 0.0);
    }
}
