use crate::core::builtin_personas::load_builtin_personas;
use crate::core::config::Config;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use tracing::warn;

/// A scripted debater.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub role: String,
    /// Character brief handed to the model as part of the system prompt
    pub prompt: String,
    /// Stock openers; the template engine draws from these
    pub verbal_tics: Vec<String>,
    /// CSS classes the browser client uses for this persona's bubbles
    #[serde(default)]
    pub accent: String,
}

impl Persona {
    /// System prompt sent ahead of every turn this persona speaks.
    pub fn system_prompt(&self) -> String {
        format!("You are {} ({}). {}", self.name, self.role, self.prompt)
    }

    /// First stock opener, used when answering the previous speaker.
    pub fn signature_tic(&self) -> &str {
        self.verbal_tics.first().map(String::as_str).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonaLoadError {
    /// Fewer than two personas leaves nobody to argue with.
    TooFew(usize),
    DuplicateId(String),
    MissingTics(String),
}

impl fmt::Display for PersonaLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersonaLoadError::TooFew(count) => {
                write!(f, "At least two personas are required, found {count}")
            }
            PersonaLoadError::DuplicateId(id) => write!(f, "Persona id '{id}' is defined twice"),
            PersonaLoadError::MissingTics(id) => {
                write!(f, "Persona '{id}' must define at least one verbal tic")
            }
        }
    }
}

impl Error for PersonaLoadError {}

/// Immutable, ordered set of debaters. Turn order follows list order.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: Vec<Persona>,
}

impl PersonaRegistry {
    pub fn new(personas: Vec<Persona>) -> Result<Self, PersonaLoadError> {
        if personas.len() < 2 {
            return Err(PersonaLoadError::TooFew(personas.len()));
        }
        for (index, persona) in personas.iter().enumerate() {
            if persona.verbal_tics.is_empty() {
                return Err(PersonaLoadError::MissingTics(persona.id.clone()));
            }
            if personas[..index].iter().any(|p| p.id == persona.id) {
                return Err(PersonaLoadError::DuplicateId(persona.id.clone()));
            }
        }
        Ok(Self { personas })
    }

    pub fn builtin() -> Self {
        Self {
            personas: load_builtin_personas(),
        }
    }

    /// Personas from the config file when it lists at least two, otherwise the
    /// built-in pair.
    pub fn from_config(config: &Config) -> Result<Self, PersonaLoadError> {
        match config.personas.len() {
            0 => Ok(Self::builtin()),
            1 => {
                warn!(
                    persona = %config.personas[0].id,
                    "Config defines a single persona; using the built-in pair"
                );
                Ok(Self::builtin())
            }
            _ => Self::new(config.personas.clone()),
        }
    }

    /// Round-robin speaker for a zero-based turn index.
    pub fn for_turn(&self, index: usize) -> &Persona {
        &self.personas[index % self.personas.len()]
    }

    pub fn find(&self, id: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.id == id)
    }

    pub fn list(&self) -> &[Persona] {
        &self.personas
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
