//! Append-only event journal with bounded in-memory history.

use std::collections::VecDeque;

use microcosm_data::{EventType, WorldEvent};
use uuid::Uuid;

/// Receiver for committed events, e.g. durable storage or a live feed.
/// Sinks must not block the simulation thread.
pub trait EventSink: Send {
    fn record(&self, event: &WorldEvent);
}

/// In-memory journal. Assigns strictly increasing ids at append time and
/// fans committed events out to registered sinks. Only a bounded recent
/// window is retained in memory; sinks keep the full history.
pub struct EventLog {
    recent: VecDeque<WorldEvent>,
    capacity: usize,
    next_id: i64,
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            recent: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            next_id: 1,
            sinks: Vec::new(),
        }
    }

    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Commits an event: assigns the next id, retains it in the recent
    /// window, and notifies sinks. Returns the assigned id.
    pub fn append(&mut self, mut event: WorldEvent) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        event.id = id;
        for sink in &self.sinks {
            sink.record(&event);
        }
        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(event);
        id
    }

    #[must_use]
    pub fn last_id(&self) -> i64 {
        self.next_id - 1
    }

    /// The most recent `n` events, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<&WorldEvent> {
        let skip = self.recent.len().saturating_sub(n);
        self.recent.iter().skip(skip).collect()
    }

    /// Retained events with id greater than `after`, oldest first.
    #[must_use]
    pub fn since(&self, after: i64) -> Vec<&WorldEvent> {
        self.recent.iter().filter(|e| e.id > after).collect()
    }

    /// Retained events attributed to `actor_id`, most recent last.
    #[must_use]
    pub fn for_actor(&self, actor_id: Uuid, n: usize) -> Vec<&WorldEvent> {
        let mut out: Vec<&WorldEvent> = self
            .recent
            .iter()
            .rev()
            .filter(|e| e.actor_id == Some(actor_id))
            .take(n)
            .collect();
        out.reverse();
        out
    }

    /// Retained events of one type, most recent last.
    #[must_use]
    pub fn of_type(&self, event_type: EventType, n: usize) -> Vec<&WorldEvent> {
        let mut out: Vec<&WorldEvent> = self
            .recent
            .iter()
            .rev()
            .filter(|e| e.event_type == event_type)
            .take(n)
            .collect();
        out.reverse();
        out
    }

    /// Retained events at or above an importance floor, used when
    /// assembling prompt context.
    #[must_use]
    pub fn important(&self, floor: f32, n: usize) -> Vec<&WorldEvent> {
        let mut out: Vec<&WorldEvent> = self
            .recent
            .iter()
            .rev()
            .filter(|e| e.importance >= floor)
            .take(n)
            .collect();
        out.reverse();
        out
    }
}
