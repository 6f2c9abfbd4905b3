//! Strategies that turn a [`TurnPlan`] into spoken text.

use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::{ChatCompletion, ChatMessage, ChatRequest, MessagesRequest, MessagesResponse};
use crate::core::chat_stream::{collect_stream, format_api_error};
use crate::core::config::Config;
use crate::core::generator::generate_turn;
use crate::core::message::Transcript;
use crate::core::providers::{ProviderMode, ProviderResolutionError, ProviderSession};
use crate::core::scheduler::TurnPlan;

/// Receives incremental text while a turn is being written.
pub type DeltaSender = mpsc::UnboundedSender<String>;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_ANTHROPIC_MAX_TOKENS: u32 = 250;

/// Which producer a request asks for.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// LLM when a provider key is present, templates otherwise
    #[default]
    Auto,
    Llm,
    Template,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Auto => "auto",
            EngineKind::Llm => "llm",
            EngineKind::Template => "template",
        }
    }

    /// Lenient parse for request bodies; unknown names yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(EngineKind::Auto),
            "llm" => Some(EngineKind::Llm),
            "template" => Some(EngineKind::Template),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum ProducerError {
    Http(reqwest::Error),
    /// Upstream answered with an error payload.
    Api(String),
    Status {
        status: u16,
        message: String,
    },
    EmptyResponse,
}

impl fmt::Display for ProducerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProducerError::Http(err) => write!(f, "Request failed: {err}"),
            ProducerError::Api(message) => write!(f, "{message}"),
            ProducerError::Status { status, message } => {
                write!(f, "{message} (HTTP {status})")
            }
            ProducerError::EmptyResponse => write!(f, "Response missing content"),
        }
    }
}

impl Error for ProducerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProducerError::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProducerError {
    fn from(err: reqwest::Error) -> Self {
        ProducerError::Http(err)
    }
}

#[async_trait]
pub trait ResponseProducer: Send + Sync {
    /// Short label reported to clients (`llm` or `template`).
    fn name(&self) -> &'static str;

    /// Write the text for one turn. When `deltas` is set, partial text is
    /// forwarded there as it becomes available.
    async fn produce(
        &self,
        plan: &TurnPlan,
        history: &Transcript,
        deltas: Option<&DeltaSender>,
    ) -> Result<String, ProducerError>;
}

/// Local phrase-table engine. Never fails.
pub struct TemplateProducer {
    rng: Mutex<StdRng>,
}

impl TemplateProducer {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for TemplateProducer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseProducer for TemplateProducer {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn produce(
        &self,
        plan: &TurnPlan,
        history: &Transcript,
        deltas: Option<&DeltaSender>,
    ) -> Result<String, ProducerError> {
        let text = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            generate_turn(&plan.persona, &plan.topic, history, &mut *rng)
        };
        if let Some(deltas) = deltas {
            let _ = deltas.send(text.clone());
        }
        Ok(text)
    }
}

/// One upstream chat call per turn.
pub struct LlmProducer {
    client: reqwest::Client,
    session: ProviderSession,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl LlmProducer {
    pub fn new(client: reqwest::Client, session: ProviderSession, config: &Config) -> Self {
        Self {
            client,
            session,
            temperature: config.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: config.max_tokens,
        }
    }

    pub fn session(&self) -> &ProviderSession {
        &self.session
    }

    fn request(&self, plan: &TurnPlan, stream: bool) -> reqwest::RequestBuilder {
        let builder = match self.session.mode {
            ProviderMode::OpenAi => {
                let body = ChatRequest {
                    model: self.session.model.clone(),
                    messages: vec![
                        ChatMessage::system(plan.system_prompt.as_str()),
                        ChatMessage::user(plan.user_prompt.as_str()),
                    ],
                    stream,
                    temperature: Some(self.temperature),
                    max_tokens: self.max_tokens,
                };
                self.client
                    .post(self.session.endpoint("chat/completions"))
                    .json(&body)
            }
            ProviderMode::Anthropic => {
                let body = MessagesRequest {
                    model: self.session.model.clone(),
                    max_tokens: self.max_tokens.unwrap_or(DEFAULT_ANTHROPIC_MAX_TOKENS),
                    temperature: self.temperature,
                    messages: vec![ChatMessage::user(format!(
                        "{}\n\n{}",
                        plan.system_prompt, plan.user_prompt
                    ))],
                    stream,
                };
                self.client
                    .post(self.session.endpoint("messages"))
                    .json(&body)
            }
        };
        self.session.authorize(builder)
    }
}

#[async_trait]
impl ResponseProducer for LlmProducer {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn produce(
        &self,
        plan: &TurnPlan,
        _history: &Transcript,
        deltas: Option<&DeltaSender>,
    ) -> Result<String, ProducerError> {
        debug!(
            turn = plan.index,
            persona = %plan.persona.id,
            provider = self.session.mode.as_str(),
            model = %self.session.model,
            streaming = deltas.is_some(),
            "Requesting turn from upstream"
        );

        let response = self.request(plan, deltas.is_some()).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(ProducerError::Status {
                status: status.as_u16(),
                message: format_api_error(&body),
            });
        }

        if let Some(deltas) = deltas {
            return collect_stream(response, self.session.mode, deltas).await;
        }

        let text = match self.session.mode {
            ProviderMode::OpenAi => response
                .json::<ChatCompletion>()
                .await?
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .map(|content| content.trim().to_string())
                .unwrap_or_default(),
            ProviderMode::Anthropic => response.json::<MessagesResponse>().await?.text(),
        };

        if text.is_empty() {
            return Err(ProducerError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Pick the producer for `engine`. `session` is the provider resolved from
/// the environment, if any.
pub fn select_producer(
    engine: EngineKind,
    session: Option<&ProviderSession>,
    client: &reqwest::Client,
    config: &Config,
) -> Result<Arc<dyn ResponseProducer>, ProviderResolutionError> {
    match (engine, session) {
        (EngineKind::Template, _) | (EngineKind::Auto, None) => {
            Ok(Arc::new(TemplateProducer::new()))
        }
        (EngineKind::Llm | EngineKind::Auto, Some(session)) => Ok(Arc::new(LlmProducer::new(
            client.clone(),
            session.clone(),
            config,
        ))),
        (EngineKind::Llm, None) => Err(ProviderResolutionError::missing_authentication()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::persona::PersonaRegistry;
    use crate::core::scheduler::Scheduler;
    use crate::utils::test_utils::{spawn_mock_upstream, test_client, MockReply};

    fn plan() -> TurnPlan {
        Scheduler::new(PersonaRegistry::builtin(), "Civic AI").plan(0, &Transcript::new())
    }

    fn session(mode: ProviderMode, base_url: String) -> ProviderSession {
        ProviderSession {
            mode,
            api_key: "test-key".to_string(),
            base_url,
            model: "test-model".to_string(),
        }
    }

    #[test]
    fn engine_names_parse_leniently() {
        assert_eq!(EngineKind::parse(" LLM "), Some(EngineKind::Llm));
        assert_eq!(EngineKind::parse("template"), Some(EngineKind::Template));
        assert_eq!(EngineKind::parse("gpt"), None);
        assert_eq!(EngineKind::Auto.as_str(), "auto");
    }

    #[tokio::test]
    async fn template_producer_forwards_whole_text_as_one_delta() {
        let producer = TemplateProducer::seeded(5);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let text = producer
            .produce(&plan(), &Transcript::new(), Some(&tx))
            .await
            .expect("template never fails");
        assert!(text.contains("civic ai"));
        assert_eq!(rx.try_recv().ok(), Some(text));
    }

    #[test]
    fn select_producer_honours_engine_and_session() {
        let client = reqwest::Client::new();
        let config = Config::default();
        let live = session(ProviderMode::OpenAi, "http://127.0.0.1:9".to_string());

        let pick = |engine: EngineKind, session: Option<&ProviderSession>| {
            select_producer(engine, session, &client, &config).map(|producer| producer.name())
        };
        assert_eq!(pick(EngineKind::Auto, None), Ok("template"));
        assert_eq!(pick(EngineKind::Auto, Some(&live)), Ok("llm"));
        assert_eq!(pick(EngineKind::Template, Some(&live)), Ok("template"));
        assert_eq!(pick(EngineKind::Llm, Some(&live)), Ok("llm"));
        assert_eq!(
            pick(EngineKind::Llm, None),
            Err(ProviderResolutionError::missing_authentication())
        );
    }

    #[tokio::test]
    async fn openai_completion_sends_system_and_user_messages() {
        let upstream = spawn_mock_upstream(vec![MockReply::json(
            200,
            r#"{"choices":[{"message":{"role":"assistant","content":"  Picture this.  "}}]}"#,
        )])
        .await;
        let producer = LlmProducer::new(
            test_client(),
            session(ProviderMode::OpenAi, upstream.base_url()),
            &Config::default(),
        );

        let text = producer
            .produce(&plan(), &Transcript::new(), None)
            .await
            .expect("completion succeeds");
        assert_eq!(text, "Picture this.");

        let requests = upstream.requests().await;
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert!(request.request_line.starts_with("POST /chat/completions"));
        assert_eq!(request.header("authorization").as_deref(), Some("Bearer test-key"));
        let body: serde_json::Value = serde_json::from_slice(&request.body).expect("json body");
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body["temperature"].as_f64().is_some());
    }

    #[tokio::test]
    async fn anthropic_completion_folds_system_prompt_into_user_turn() {
        let upstream = spawn_mock_upstream(vec![MockReply::json(
            200,
            r#"{"content":[{"type":"text","text":"Reality check."}]}"#,
        )])
        .await;
        let producer = LlmProducer::new(
            test_client(),
            session(ProviderMode::Anthropic, upstream.base_url()),
            &Config::default(),
        );

        let text = producer
            .produce(&plan(), &Transcript::new(), None)
            .await
            .expect("completion succeeds");
        assert_eq!(text, "Reality check.");

        let requests = upstream.requests().await;
        let request = &requests[0];
        assert!(request.request_line.starts_with("POST /messages"));
        assert_eq!(request.header("x-api-key").as_deref(), Some("test-key"));
        let body: serde_json::Value = serde_json::from_slice(&request.body).expect("json body");
        assert_eq!(body["max_tokens"], 250);
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
        let content = body["messages"][0]["content"].as_str().unwrap_or_default();
        assert!(content.starts_with("You are Nova (Optimistic Futurist)."));
        assert!(content.contains("\n\nTopic: Civic AI"));
    }

    #[tokio::test]
    async fn streaming_completion_forwards_chunks() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Here's \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"the upside.\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let upstream = spawn_mock_upstream(vec![MockReply::event_stream(body)]).await;
        let producer = LlmProducer::new(
            test_client(),
            session(ProviderMode::OpenAi, upstream.base_url()),
            &Config::default(),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        let text = producer
            .produce(&plan(), &Transcript::new(), Some(&tx))
            .await
            .expect("stream succeeds");
        assert_eq!(text, "Here's the upside.");
        assert_eq!(rx.try_recv().ok().as_deref(), Some("Here's "));
        assert_eq!(rx.try_recv().ok().as_deref(), Some("the upside."));

        let requests = upstream.requests().await;
        let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).expect("json");
        assert_eq!(sent["stream"], true);
    }

    #[tokio::test]
    async fn anthropic_stream_forwards_text_deltas() {
        let body = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"model\":\"test-model\"}}\n\n",
            "event: content_block_start\n",
            "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
            "event: ping\n",
            "data: {\"type\":\"ping\"}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Grid first, \"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"models second.\"}}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );
        let upstream = spawn_mock_upstream(vec![MockReply::event_stream(body)]).await;
        let producer = LlmProducer::new(
            test_client(),
            session(ProviderMode::Anthropic, upstream.base_url()),
            &Config::default(),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        let text = producer
            .produce(&plan(), &Transcript::new(), Some(&tx))
            .await
            .expect("stream succeeds");
        assert_eq!(text, "Grid first, models second.");
        assert_eq!(rx.try_recv().ok().as_deref(), Some("Grid first, "));
        assert_eq!(rx.try_recv().ok().as_deref(), Some("models second."));
        assert!(rx.try_recv().is_err());

        let requests = upstream.requests().await;
        assert!(requests[0].request_line.starts_with("POST /messages"));
        let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).expect("json");
        assert_eq!(sent["stream"], true);
    }

    #[tokio::test]
    async fn error_event_mid_stream_aborts_the_turn() {
        let body = concat!(
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Half a \"}}\n\n",
            "event: error\n",
            "data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"thought.\"}}\n\n",
        );
        let upstream = spawn_mock_upstream(vec![MockReply::event_stream(body)]).await;
        let producer = LlmProducer::new(
            test_client(),
            session(ProviderMode::Anthropic, upstream.base_url()),
            &Config::default(),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        let err = producer
            .produce(&plan(), &Transcript::new(), Some(&tx))
            .await
            .unwrap_err();
        match &err {
            ProducerError::Api(message) => {
                assert!(message.starts_with("API Error: Overloaded"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(rx.try_recv().ok().as_deref(), Some("Half a "));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn error_status_is_reported_with_summary() {
        let upstream = spawn_mock_upstream(vec![MockReply::json(
            429,
            r#"{"error":{"message":"Rate limit reached"}}"#,
        )])
        .await;
        let producer = LlmProducer::new(
            test_client(),
            session(ProviderMode::OpenAi, upstream.base_url()),
            &Config::default(),
        );

        let err = producer
            .produce(&plan(), &Transcript::new(), None)
            .await
            .unwrap_err();
        match &err {
            ProducerError::Status { status, message } => {
                assert_eq!(*status, 429);
                assert!(message.starts_with("API Error: Rate limit reached"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().ends_with("(HTTP 429)"));
    }

    #[tokio::test]
    async fn missing_content_is_an_error() {
        let upstream = spawn_mock_upstream(vec![MockReply::json(
            200,
            r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#,
        )])
        .await;
        let producer = LlmProducer::new(
            test_client(),
            session(ProviderMode::OpenAi, upstream.base_url()),
            &Config::default(),
        );

        let err = producer
            .produce(&plan(), &Transcript::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProducerError::EmptyResponse));
    }
}
