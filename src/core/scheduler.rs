//! Turn planning: who speaks next and what they are asked.

use serde_json::Value;

use crate::core::message::Transcript;
use crate::core::persona::{Persona, PersonaRegistry};

pub const MIN_TURNS: usize = 4;
pub const MAX_TURNS: usize = 20;
pub const DEFAULT_TURNS: usize = 8;
pub const DEFAULT_TOPIC: &str = "How should society steer frontier AI?";

/// Clamp a requested turn count into `[MIN_TURNS, MAX_TURNS]`.
///
/// Fractional counts round up, so `4.5` asks for five turns.
///
/// Accepts JSON numbers and numeric strings. Anything else, including
/// NaN and infinities, falls back to `fallback`.
pub fn clamp_turns(input: Option<&Value>, fallback: usize) -> usize {
    let requested = match input {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };

    match requested {
        Some(value) if value.is_finite() => {
            value.clamp(MIN_TURNS as f64, MAX_TURNS as f64).ceil() as usize
        }
        _ => fallback.clamp(MIN_TURNS, MAX_TURNS),
    }
}

/// Trimmed topic text, or `fallback` when the input is blank or not a string.
pub fn normalize_topic(input: Option<&Value>, fallback: &str) -> String {
    match input.and_then(Value::as_str).map(str::trim) {
        Some(topic) if !topic.is_empty() => topic.to_string(),
        _ => fallback.to_string(),
    }
}

/// Everything a producer needs to write one turn.
#[derive(Debug, Clone)]
pub struct TurnPlan {
    pub index: usize,
    pub persona: Persona,
    pub topic: String,
    pub system_prompt: String,
    pub user_prompt: String,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    personas: PersonaRegistry,
    topic: String,
}

impl Scheduler {
    pub fn new(personas: PersonaRegistry, topic: impl Into<String>) -> Self {
        Self {
            personas,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn personas(&self) -> &PersonaRegistry {
        &self.personas
    }

    pub fn plan(&self, index: usize, history: &Transcript) -> TurnPlan {
        let persona = self.personas.for_turn(index).clone();
        let user_prompt = format!(
            "Topic: {topic}\n\n\
             Conversation so far:\n{history}\n\n\
             Guidelines for {name}:\n\
             - Reply in under 90 words.\n\
             - Stay in first person.\n\
             - Reference the topic explicitly.\n\
             - End with a forward-looking suggestion or concern.\n\
             - Adopt your verbal style and tics.\n\
             - Do not invent the other agent's lines.",
            topic = self.topic,
            history = history.history_markdown(),
            name = persona.name,
        );

        TurnPlan {
            index,
            system_prompt: persona.system_prompt(),
            persona,
            topic: self.topic.clone(),
            user_prompt,
        }
    }
}
