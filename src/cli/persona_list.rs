use std::error::Error;
use std::path::Path;

use crate::core::config::{path_display, Config};
use crate::core::persona::PersonaRegistry;

pub fn list_personas(config: &Config, config_path: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let registry = PersonaRegistry::from_config(config)?;

    if config.personas.is_empty() {
        println!("Personas (built-in):\n");
    } else {
        let source = config_path
            .map(Path::to_path_buf)
            .or_else(Config::get_config_path)
            .map(path_display)
            .unwrap_or_else(|| "config".to_string());
        println!("Personas (from {source}):\n");
    }

    for (index, persona) in registry.list().iter().enumerate() {
        println!(
            "  {}. {} ({}) [{}]",
            index + 1,
            persona.name,
            persona.role,
            persona.id
        );
        println!("     tics: {}", persona.verbal_tics.join(", "));
    }
    println!("\nSpeakers alternate in this order, starting with the first.");

    Ok(())
}
