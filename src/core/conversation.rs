//! Drives a debate turn by turn and reports progress as [`TurnEvent`]s.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::message::{message_id, ConversationMessage, Transcript};
use crate::core::producer::{ProducerError, ResponseProducer};
use crate::core::scheduler::{Scheduler, TurnPlan};

pub const TURN_FAILED: &str = "LLM call failed";

#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// Partial text for the message that will carry `id`.
    Delta { id: String, text: String },
    Message(ConversationMessage),
    Error { error: String, details: String },
    Done,
}

/// Result of a non-streaming run. `error` is set when the run stopped early.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TranscriptOutcome {
    pub messages: Vec<ConversationMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct Conversation {
    producer: Arc<dyn ResponseProducer>,
    scheduler: Scheduler,
    turns: usize,
    stream_deltas: bool,
}

impl Conversation {
    pub fn new(producer: Arc<dyn ResponseProducer>, scheduler: Scheduler, turns: usize) -> Self {
        Self {
            producer,
            scheduler,
            turns,
            stream_deltas: false,
        }
    }

    /// Also emit [`TurnEvent::Delta`] while each turn is being written.
    pub fn with_deltas(mut self, enabled: bool) -> Self {
        self.stream_deltas = enabled;
        self
    }

    pub fn turns(&self) -> usize {
        self.turns
    }

    pub fn topic(&self) -> &str {
        self.scheduler.topic()
    }

    /// Run every turn in order, sending events as they happen.
    ///
    /// Always finishes with [`TurnEvent::Done`] unless the receiver has gone
    /// away, in which case the loop stops at the next send.
    pub async fn run(self, events: mpsc::Sender<TurnEvent>) {
        let mut transcript = Transcript::new();

        for index in 0..self.turns {
            if events.is_closed() {
                debug!(turn = index, "Event receiver closed; stopping");
                return;
            }

            let plan = self.scheduler.plan(index, &transcript);
            let content = match self.produce_turn(&plan, &transcript, &events).await {
                Some(Ok(content)) => content,
                Some(Err(err)) => {
                    warn!(
                        turn = index,
                        producer = self.producer.name(),
                        error = %err,
                        "Turn failed"
                    );
                    let _ = events
                        .send(TurnEvent::Error {
                            error: TURN_FAILED.to_string(),
                            details: err.to_string(),
                        })
                        .await;
                    break;
                }
                None => return,
            };

            let message = ConversationMessage::new(index, &plan.persona, content);
            transcript.push(message.clone());
            if events.send(TurnEvent::Message(message)).await.is_err() {
                return;
            }
        }

        let _ = events.send(TurnEvent::Done).await;
    }

    /// Run to completion and gather the transcript. A failure truncates it.
    pub async fn collect(self) -> TranscriptOutcome {
        let (tx, mut rx) = mpsc::channel(16);
        let gather = async move {
            let mut outcome = TranscriptOutcome::default();
            while let Some(event) = rx.recv().await {
                match event {
                    TurnEvent::Message(message) => outcome.messages.push(message),
                    TurnEvent::Error { details, .. } => outcome.error = Some(details),
                    TurnEvent::Delta { .. } | TurnEvent::Done => {}
                }
            }
            outcome
        };

        let ((), outcome) = tokio::join!(self.with_deltas(false).run(tx), gather);
        outcome
    }

    /// `None` means the receiver went away mid-turn.
    async fn produce_turn(
        &self,
        plan: &TurnPlan,
        history: &Transcript,
        events: &mpsc::Sender<TurnEvent>,
    ) -> Option<Result<String, ProducerError>> {
        if !self.stream_deltas {
            return Some(self.producer.produce(plan, history, None).await);
        }

        let id = message_id(&plan.persona, plan.index);
        let (delta_tx, mut delta_rx) = mpsc::unbounded_channel();
        let produce = self.producer.produce(plan, history, Some(&delta_tx));
        tokio::pin!(produce);

        let result = loop {
            tokio::select! {
                result = &mut produce => break result,
                Some(text) = delta_rx.recv() => {
                    let event = TurnEvent::Delta { id: id.clone(), text };
                    if events.send(event).await.is_err() {
                        return None;
                    }
                }
            }
        };

        while let Ok(text) = delta_rx.try_recv() {
            let event = TurnEvent::Delta {
                id: id.clone(),
                text,
            };
            if events.send(event).await.is_err() {
                return None;
            }
        }
        Some(result)
    }
}
