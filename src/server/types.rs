use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::config::Config;
use crate::core::conversation::TranscriptOutcome;
use crate::core::producer::EngineKind;
use crate::core::scheduler::{clamp_turns, normalize_topic};

/// Raw request body for `/api/simulate` and `/api/transcript`.
///
/// Anything that is not a JSON object is read as `{}` so defaults apply.
#[derive(Debug, Default, Clone)]
pub struct SimulateRequest {
    fields: Map<String, Value>,
}

impl SimulateRequest {
    pub fn from_body(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => Self { fields },
            _ => Self::default(),
        }
    }

    /// Apply request overrides on top of the configured defaults.
    pub fn resolve(&self, config: &Config) -> RunSettings {
        let engine = self
            .fields
            .get("engine")
            .and_then(Value::as_str)
            .and_then(EngineKind::parse)
            .unwrap_or_else(|| config.engine());
        let deltas = matches!(self.fields.get("deltas"), Some(Value::Bool(true)));

        RunSettings {
            topic: normalize_topic(self.fields.get("topic"), config.default_topic()),
            turns: clamp_turns(self.fields.get("turns"), config.default_turns()),
            engine,
            deltas,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub topic: String,
    pub turns: usize,
    pub engine: EngineKind,
    pub deltas: bool,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub topic: String,
    pub turns: usize,
    /// Producer that actually ran (`llm` or `template`)
    pub engine: &'static str,
    #[serde(flatten)]
    pub outcome: TranscriptOutcome,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub engine: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct DeltaPayload<'a> {
    pub id: &'a str,
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct FailurePayload<'a> {
    pub error: &'a str,
    pub details: &'a str,
}
