//! Indexed relationship table keyed by (actor, target) pairs.

use std::collections::HashMap;

use microcosm_data::Relationship;
use uuid::Uuid;

use crate::config::RelationshipConfig;

/// Arena of directed social ties. Actors reference each other by id
/// only; no cycles of ownership.
#[derive(Debug, Default)]
pub struct RelationshipTable {
    ties: HashMap<(Uuid, Uuid), Relationship>,
}

impl RelationshipTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, actor: Uuid, target: Uuid) -> Option<&Relationship> {
        self.ties.get(&(actor, target))
    }

    pub fn get_or_create(&mut self, actor: Uuid, target: Uuid, tick: u64) -> &mut Relationship {
        self.ties
            .entry((actor, target))
            .or_insert_with(|| Relationship::new(actor, target, tick))
    }

    /// Records an interaction in both directions.
    pub fn reinforce_mutual(&mut self, a: Uuid, b: Uuid, valence: f32, tick: u64) {
        self.get_or_create(a, b, tick).reinforce(valence, tick);
        self.get_or_create(b, a, tick).reinforce(valence, tick);
    }

    /// All ties originating at `actor`.
    #[must_use]
    pub fn of_actor(&self, actor: Uuid) -> Vec<&Relationship> {
        self.ties
            .values()
            .filter(|r| r.actor_id == actor)
            .collect()
    }

    /// One decay pass over every tie. Ties idle longer than the
    /// configured window decay at double rate; fully faded unfamiliar
    /// ties are dropped.
    pub fn decay_all(&mut self, config: &RelationshipConfig, tick: u64) {
        for tie in self.ties.values_mut() {
            let idle = tick.saturating_sub(tie.last_interaction_tick) > config.idle_ticks;
            let rate = if idle {
                (config.decay_rate * 2.0).min(1.0)
            } else {
                config.decay_rate
            };
            tie.decay(rate);
        }
        self.ties
            .retain(|_, tie| tie.affinity != 0.0 || tie.familiarity >= 0.1);
    }

    /// Drops every tie involving `actor`, in either direction.
    pub fn remove_actor(&mut self, actor: Uuid) {
        self.ties
            .retain(|(a, b), _| *a != actor && *b != actor);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ties.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutual_reinforcement_creates_both_directions() {
        let mut table = RelationshipTable::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        table.reinforce_mutual(a, b, 0.3, 5);
        assert!(table.get(a, b).is_some());
        assert!(table.get(b, a).is_some());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_decay_drops_faded_ties() {
        let mut table = RelationshipTable::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        table.get_or_create(a, b, 0).affinity = 0.005;
        let config = RelationshipConfig::default();
        table.decay_all(&config, 1);
        assert!(table.is_empty());
    }

    #[test]
    fn test_remove_actor_clears_both_directions() {
        let mut table = RelationshipTable::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        table.reinforce_mutual(a, b, 0.5, 0);
        table.reinforce_mutual(b, c, 0.5, 0);
        table.remove_actor(a);
        assert!(table.get(a, b).is_none());
        assert!(table.get(b, a).is_none());
        assert!(table.get(b, c).is_some());
    }
}
