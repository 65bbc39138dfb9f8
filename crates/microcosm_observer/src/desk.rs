//! Background narration worker.
//!
//! Narrative requests are queued and completed off the simulation
//! thread; finished narrations accumulate in a bounded history that the
//! tick loop drains when convenient.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::backend::{LlmRequest, RequestKind};
use crate::orchestrator::Orchestrator;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Narration {
    pub tick: u64,
    pub kind: String,
    pub text: String,
    pub importance: f32,
}

struct NarrationJob {
    tick: u64,
    kind: RequestKind,
    prompt: String,
    importance: f32,
}

pub struct NarrationDesk {
    narrations: Arc<Mutex<Vec<Narration>>>,
    tx: mpsc::UnboundedSender<NarrationJob>,
}

const MAX_HISTORY: usize = 100;

impl NarrationDesk {
    /// Spawns the worker task. Must be called from within a tokio
    /// runtime.
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let narrations = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = mpsc::unbounded_channel::<NarrationJob>();

        let history = Arc::clone(&narrations);
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let request = LlmRequest {
                    kind: job.kind,
                    prompt: job.prompt,
                    importance: job.importance,
                    actor_id: None,
                };
                let response = orchestrator.complete(&request).await;
                let narration = Narration {
                    tick: job.tick,
                    kind: kind_name(job.kind).to_string(),
                    text: response.text,
                    importance: job.importance,
                };
                if let Ok(mut list) = history.lock() {
                    if list.len() >= MAX_HISTORY {
                        list.remove(0);
                    }
                    list.push(narration);
                }
            }
        });

        Self { narrations, tx }
    }

    /// Queues a narration; never blocks the caller.
    pub fn request(&self, tick: u64, kind: RequestKind, prompt: &str, importance: f32) {
        let _ = self.tx.send(NarrationJob {
            tick,
            kind,
            prompt: prompt.to_string(),
            importance,
        });
    }

    /// Takes every finished narration, leaving the history empty.
    #[must_use]
    pub fn drain(&self) -> Vec<Narration> {
        match self.narrations.lock() {
            Ok(mut list) => std::mem::take(&mut *list),
            Err(_) => Vec::new(),
        }
    }
}

fn kind_name(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::GodObservation => "god_observation",
        RequestKind::WorldUpdate => "world_update",
        RequestKind::SagaChapter => "saga_chapter",
        RequestKind::ActorCognition => "cognition",
    }
}
