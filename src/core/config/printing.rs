use crate::core::config::data::Config;

impl Config {
    /// Effective settings, one `key: value` per line.
    pub fn print_all(&self) {
        println!("Current configuration:");
        println!("  bind: {}", self.bind_address());
        println!("  engine: {}", self.engine().as_str());
        println!("  default-topic: {}", self.default_topic());
        println!("  default-turns: {}", self.default_turns());
        print_optional("openai-model", self.openai_model.as_deref());
        print_optional("anthropic-model", self.anthropic_model.as_deref());
        match self.temperature {
            Some(temperature) => println!("  temperature: {temperature}"),
            None => println!("  temperature: (provider default)"),
        }
        match self.max_tokens {
            Some(max_tokens) => println!("  max-tokens: {max_tokens}"),
            None => println!("  max-tokens: (provider default)"),
        }
        println!("  request-timeout: {}s", self.request_timeout().as_secs());
        if self.personas.is_empty() {
            println!("  personas: (built-in)");
        } else {
            println!("  personas:");
            for persona in &self.personas {
                println!("    {}: {} ({})", persona.id, persona.name, persona.role);
            }
        }
    }
}

fn print_optional(key: &str, value: Option<&str>) {
    match value {
        Some(value) => println!("  {key}: {value}"),
        None => println!("  {key}: (unset)"),
    }
}
