//! Incremental decoding of upstream `text/event-stream` bodies.

use futures_util::StreamExt;
use memchr::memchr;
use tracing::debug;

use crate::api::{ChatResponse, MessagesDelta, MessagesStreamEvent};
use crate::core::producer::{DeltaSender, ProducerError};
use crate::core::providers::ProviderMode;

#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    Chunk(String),
    Error(String),
    End,
}

/// Splits a byte stream into complete lines, keeping any partial tail.
#[derive(Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete line, trimmed. Lines that are not UTF-8 are dropped.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let newline_pos = memchr(b'\n', &self.buffer)?;
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            match std::str::from_utf8(&line) {
                Ok(text) => return Some(text.trim().to_string()),
                Err(err) => debug!(error = %err, "Dropping non UTF-8 stream line"),
            }
        }
    }

    /// Whatever is left once the body ends without a trailing newline.
    pub fn take_remainder(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let text = String::from_utf8(rest).ok()?;
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Interpret one SSE line for the given dialect.
///
/// Returns `None` for lines that carry nothing (comments, `event:` lines,
/// keep-alives, role-only deltas).
pub fn parse_sse_line(mode: ProviderMode, line: &str) -> Option<StreamMessage> {
    let payload = extract_data_payload(line)?;
    if payload.is_empty() {
        return None;
    }
    if payload == "[DONE]" {
        return Some(StreamMessage::End);
    }

    match mode {
        ProviderMode::OpenAi => match serde_json::from_str::<ChatResponse>(payload) {
            Ok(response) => response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .filter(|content| !content.is_empty())
                .map(StreamMessage::Chunk),
            Err(_) => Some(StreamMessage::Error(format_api_error(payload))),
        },
        ProviderMode::Anthropic => match serde_json::from_str::<MessagesStreamEvent>(payload) {
            Ok(MessagesStreamEvent::ContentBlockDelta {
                delta: MessagesDelta::TextDelta { text },
            }) => Some(StreamMessage::Chunk(text)),
            Ok(MessagesStreamEvent::MessageStop) => Some(StreamMessage::End),
            Ok(MessagesStreamEvent::Error { .. }) | Err(_) => {
                Some(StreamMessage::Error(format_api_error(payload)))
            }
            Ok(_) => None,
        },
    }
}

/// Drain a streaming response, forwarding each chunk and returning the full text.
pub async fn collect_stream(
    response: reqwest::Response,
    mode: ProviderMode,
    deltas: &DeltaSender,
) -> Result<String, ProducerError> {
    let mut stream = response.bytes_stream();
    let mut lines = SseLineBuffer::default();
    let mut text = String::new();

    let handle = |line: &str, text: &mut String| -> Result<bool, ProducerError> {
        match parse_sse_line(mode, line) {
            Some(StreamMessage::Chunk(chunk)) => {
                text.push_str(&chunk);
                // A closed receiver only means nobody is watching the deltas.
                let _ = deltas.send(chunk);
                Ok(false)
            }
            Some(StreamMessage::Error(message)) => Err(ProducerError::Api(message)),
            Some(StreamMessage::End) => Ok(true),
            None => Ok(false),
        }
    };

    'body: while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(ProducerError::Http)?;
        lines.extend(&bytes);
        while let Some(line) = lines.next_line() {
            if handle(&line, &mut text)? {
                break 'body;
            }
        }
    }
    if let Some(line) = lines.take_remainder() {
        handle(&line, &mut text)?;
    }

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(ProducerError::EmptyResponse);
    }
    Ok(text)
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value
                .get("error")
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        });

    summary
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
}

/// Render an upstream error body as a one-line summary plus the raw payload.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();
    if trimmed.is_empty() {
        return "API Error: <empty>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let body = serde_json::to_string(&json_value).unwrap_or_else(|_| trimmed.to_string());
        return match extract_error_summary(&json_value) {
            Some(summary) => format!("API Error: {summary} {body}"),
            None => format!("API Error: {body}"),
        };
    }

    format!("API Error: {trimmed}")
}
