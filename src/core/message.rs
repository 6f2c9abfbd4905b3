use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::core::persona::Persona;

/// One spoken turn. Created once and never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// `{persona id}-{turn index}`
    pub id: String,
    pub author: Persona,
    pub content: String,
    #[serde(with = "rfc3339_millis")]
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn new(turn_index: usize, author: &Persona, content: impl Into<String>) -> Self {
        Self {
            id: message_id(author, turn_index),
            author: author.clone(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// `Name (Role): content`, as written to transcript logs and the terminal.
    pub fn attributed_line(&self) -> String {
        format!(
            "{} ({}): {}",
            self.author.name, self.author.role, self.content
        )
    }
}

pub fn message_id(author: &Persona, turn_index: usize) -> String {
    format!("{}-{}", author.id, turn_index)
}

/// Append-only record of a debate.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<ConversationMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ConversationMessage) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationMessage> {
        self.messages.last()
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<ConversationMessage> {
        self.messages
    }

    /// Prior turns rendered as `**Name:** content` lines for the next prompt.
    pub fn history_markdown(&self) -> String {
        if self.messages.is_empty() {
            return "(no prior messages)".to_string();
        }
        self.messages
            .iter()
            .map(|message| format!("**{}:** {}", message.author.name, message.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

mod rfc3339_millis {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::persona::PersonaRegistry;

    #[test]
    fn empty_history_has_placeholder() {
        assert_eq!(Transcript::new().history_markdown(), "(no prior messages)");
    }

    #[test]
    fn history_lists_each_turn_in_order() {
        let registry = PersonaRegistry::builtin();
        let mut transcript = Transcript::new();
        transcript.push(ConversationMessage::new(0, registry.for_turn(0), "First."));
        transcript.push(ConversationMessage::new(1, registry.for_turn(1), "Second."));

        assert_eq!(
            transcript.history_markdown(),
            "**Nova:** First.\n**Quill:** Second."
        );
        assert_eq!(transcript.last().map(|m| m.id.as_str()), Some("quill-1"));
    }

    #[test]
    fn serializes_timestamp_as_utc_millis() {
        let registry = PersonaRegistry::builtin();
        let message = ConversationMessage::new(2, registry.for_turn(2), "Hello");
        let json = serde_json::to_value(&message).expect("serializes");

        assert_eq!(json["id"], "nova-2");
        assert_eq!(json["author"]["name"], "Nova");
        let stamp = json["timestamp"].as_str().expect("timestamp string");
        assert!(stamp.ends_with('Z'), "{stamp}");

        let back: ConversationMessage = serde_json::from_value(json).expect("round trips");
        assert_eq!(back.content, "Hello");
    }

    #[test]
    fn attributed_line_names_speaker_and_role() {
        let registry = PersonaRegistry::builtin();
        let message = ConversationMessage::new(1, registry.for_turn(1), "Who pays?");
        assert_eq!(
            message.attributed_line(),
            "Quill (Grounded Systems Thinker): Who pays?"
        );
    }
}
