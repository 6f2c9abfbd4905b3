use std::time::Duration;

use crate::core::config::data::Config;
use crate::core::producer::EngineKind;
use crate::core::scheduler::{DEFAULT_TOPIC, DEFAULT_TURNS, MAX_TURNS, MIN_TURNS};

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

impl Config {
    pub fn bind_address(&self) -> &str {
        self.bind
            .as_deref()
            .map(str::trim)
            .filter(|bind| !bind.is_empty())
            .unwrap_or(DEFAULT_BIND)
    }

    pub fn engine(&self) -> EngineKind {
        self.engine.unwrap_or_default()
    }

    pub fn default_topic(&self) -> &str {
        self.default_topic
            .as_deref()
            .map(str::trim)
            .filter(|topic| !topic.is_empty())
            .unwrap_or(DEFAULT_TOPIC)
    }

    /// Configured turn count, clamped like a request value would be.
    pub fn default_turns(&self) -> usize {
        self.default_turns
            .unwrap_or(DEFAULT_TURNS)
            .clamp(MIN_TURNS, MAX_TURNS)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }
}
