use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::persona::Persona;
use crate::core::producer::EngineKind;

/// On-disk settings. Every field is optional; see `defaults.rs` for the
/// values used when one is missing.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Listen address for `serve`, e.g. "127.0.0.1:3000"
    pub bind: Option<String>,
    pub engine: Option<EngineKind>,
    pub default_topic: Option<String>,
    pub default_turns: Option<usize>,
    pub openai_model: Option<String>,
    pub anthropic_model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Upper bound for a single upstream call
    pub request_timeout_secs: Option<u64>,
    /// Replaces the built-in pair when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub personas: Vec<Persona>,
}

pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
