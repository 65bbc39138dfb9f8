//! Language-model backends behind a uniform attempt contract.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// Cost/quality level of a backend. Ordering is expensive first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Reserved for the world's singular narrative authority.
    God,
    /// Mid tier for high-importance cognition.
    Premium,
    /// Unmetered local default.
    Local,
}

impl Tier {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::God => "god",
            Tier::Premium => "premium",
            Tier::Local => "local",
        }
    }

    /// The next cheaper tier, if any.
    #[must_use]
    pub fn downgrade(&self) -> Option<Tier> {
        match self {
            Tier::God => Some(Tier::Premium),
            Tier::Premium => Some(Tier::Local),
            Tier::Local => None,
        }
    }
}

/// What kind of work is being requested; drives tier selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Periodic narrator observation of the whole world.
    GodObservation,
    /// Full narrative world refresh.
    WorldUpdate,
    /// Saga chapter generation at an era boundary.
    SagaChapter,
    /// Per-actor cognition.
    ActorCognition,
}

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub kind: RequestKind,
    pub prompt: String,
    /// Decision importance in [0, 1].
    pub importance: f32,
    pub actor_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    /// The tier that actually produced the text.
    pub tier: Tier,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed completion payload")]
    Malformed,
}

/// A single backend. Implementations must be time-boxed internally so
/// a stalled call never blocks the tick loop.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    fn tier(&self) -> Tier;
    async fn attempt(&self, request: &LlmRequest) -> Result<LlmResponse, BackendError>;
}

/// Terminal fallback: a hardcoded neutral response that never fails,
/// so a total backend outage degrades instead of blocking.
pub struct NeutralBackend;

#[async_trait]
impl LlmBackend for NeutralBackend {
    fn tier(&self) -> Tier {
        Tier::Local
    }

    async fn attempt(&self, request: &LlmRequest) -> Result<LlmResponse, BackendError> {
        let text = match request.kind {
            RequestKind::ActorCognition => "I pause, take in my surroundings, and wait.",
            RequestKind::GodObservation => "The world turns quietly.",
            RequestKind::WorldUpdate => "The world endures, much as it was.",
            RequestKind::SagaChapter => "An uneventful age passes into memory.",
        };
        Ok(LlmResponse {
            text: text.to_string(),
            tier: Tier::Local,
        })
    }
}

/// Chat-completion backend over HTTP with an explicit request timeout.
pub struct HttpBackend {
    tier: Tier,
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl HttpBackend {
    pub fn new(
        tier: Tier,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            tier,
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
        })
    }
}

#[async_trait]
impl LlmBackend for HttpBackend {
    fn tier(&self) -> Tier {
        self.tier
    }

    async fn attempt(&self, request: &LlmRequest) -> Result<LlmResponse, BackendError> {
        let payload = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": request.prompt }],
        });
        let mut req = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let completion: ChatCompletion = response.json().await?;
        let text = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(BackendError::Malformed)?;
        Ok(LlmResponse {
            text,
            tier: self.tier,
        })
    }
}
