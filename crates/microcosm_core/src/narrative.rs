//! Narrative pressure: cognition gating, drama scoring, and
//! meta-awareness drift.
//!
//! Language-model calls are slow and metered, so most actor decisions
//! fall back to cheap deterministic behavior. This module decides when
//! a tick is interesting enough to spend a call on, and tracks the
//! world-level tension that the top-tier narrator reacts to.

use microcosm_data::{Actor, EventOutcome, EventType};
use rand::Rng;

use crate::world::World;

/// Why a cognition call was judged worthwhile this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CognitionCue {
    /// Someone spoke to or near the actor recently.
    Conversation,
    /// A safety intervention or other surprise left hints to process.
    NovelSituation,
    /// The pending decision carries high importance.
    HighImportance,
    /// Needs have collapsed far enough that death is close.
    ImminentDeath,
    /// Rare spontaneous narrative beat.
    NarrativeEvent,
}

impl CognitionCue {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CognitionCue::Conversation => "conversation",
            CognitionCue::NovelSituation => "novel_situation",
            CognitionCue::HighImportance => "high_importance",
            CognitionCue::ImminentDeath => "imminent_death",
            CognitionCue::NarrativeEvent => "narrative_beat",
        }
    }
}

/// Ticks within which speech counts as an active conversation.
const CONVERSATION_WINDOW: u64 = 20;

/// Odds denominator for a spontaneous narrative beat.
const NARRATIVE_BEAT_ODDS: u32 = 500;

/// Decides whether `actor` warrants a language-model call this tick.
///
/// Returns the strongest applicable cue, or None when the actor should
/// run its deterministic policy instead. This bound keeps call volume
/// roughly proportional to how much is actually happening.
pub fn should_use_llm(
    world: &World,
    actor: &Actor,
    decision_importance: f32,
    rng: &mut impl Rng,
) -> Option<CognitionCue> {
    if actor.needs.hunger >= 90.0 || actor.needs.energy <= 10.0 {
        return Some(CognitionCue::ImminentDeath);
    }
    if decision_importance >= 0.7 {
        return Some(CognitionCue::HighImportance);
    }
    let talked_recently = world
        .events
        .of_type(EventType::Speech, 32)
        .iter()
        .any(|e| {
            world.tick.saturating_sub(e.tick) <= CONVERSATION_WINDOW
                && e.actor_id != Some(actor.id)
        });
    if talked_recently {
        return Some(CognitionCue::Conversation);
    }
    if !actor.hints.is_empty() {
        return Some(CognitionCue::NovelSituation);
    }
    if rng.gen_ratio(1, NARRATIVE_BEAT_ODDS) {
        return Some(CognitionCue::NarrativeEvent);
    }
    None
}

/// World tension in [0, 1], derived from the recent journal: deaths,
/// interventions, and rejections all raise it. Feeds the importance of
/// narrator observations.
#[must_use]
pub fn drama_score(world: &World) -> f32 {
    let recent = world.events.recent(256);
    if recent.is_empty() {
        return 0.0;
    }
    let mut score = 0.0f32;
    for event in &recent {
        score += match event.event_type {
            EventType::Death => 0.15,
            EventType::Intervention => 0.08,
            _ if event.result == EventOutcome::Rejected => 0.02,
            EventType::Speech => 0.01,
            _ => 0.0,
        };
    }
    (score / (recent.len() as f32).sqrt()).clamp(0.0, 1.0)
}

/// Nudges how aware an actor is of the simulation around it.
/// Interventions raise it; quiet ticks let it fade.
pub fn drift_meta_awareness(actor: &mut Actor, intervened: bool) {
    if intervened {
        actor.meta_awareness = (actor.meta_awareness + 5.0).min(100.0);
    } else {
        actor.meta_awareness = (actor.meta_awareness - 0.05).max(0.0);
    }
}
