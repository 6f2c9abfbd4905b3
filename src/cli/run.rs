//! Headless `run` command: one debate printed to the terminal

use std::error::Error;
use std::io::{self, Write};

use tokio::sync::mpsc;

use crate::core::config::Config;
use crate::core::conversation::{Conversation, TurnEvent};
use crate::core::persona::PersonaRegistry;
use crate::core::producer::{select_producer, EngineKind};
use crate::core::providers::resolve_env_session;
use crate::core::scheduler::{Scheduler, MAX_TURNS, MIN_TURNS};
use crate::utils::logging::LoggingState;

pub struct RunOptions {
    pub topic: Vec<String>,
    pub turns: Option<usize>,
    pub engine: Option<EngineKind>,
    pub log: Option<String>,
}

impl RunOptions {
    fn topic(&self, config: &Config) -> String {
        let topic = self.topic.join(" ");
        let topic = topic.trim();
        if topic.is_empty() {
            config.default_topic().to_string()
        } else {
            topic.to_string()
        }
    }

    fn turns(&self, config: &Config) -> usize {
        self.turns
            .map(|turns| turns.clamp(MIN_TURNS, MAX_TURNS))
            .unwrap_or_else(|| config.default_turns())
    }
}

pub async fn run_debate(
    config: &Config,
    client: reqwest::Client,
    options: RunOptions,
) -> Result<(), Box<dyn Error>> {
    let logging = LoggingState::new(options.log.clone())?;
    let personas = PersonaRegistry::from_config(config)?;
    let session = resolve_env_session(config).ok();
    let engine = options.engine.unwrap_or_else(|| config.engine());

    let producer = match select_producer(engine, session.as_ref(), &client, config) {
        Ok(producer) => producer,
        Err(err) => {
            eprintln!("❌ {err}");
            std::process::exit(1);
        }
    };

    let topic = options.topic(config);
    let turns = options.turns(config);
    eprintln!("Topic: {topic}");
    eprintln!("Engine: {} | Turns: {turns}", producer.name());
    if logging.is_active() {
        eprintln!("Log: {}", logging.get_status_string());
    }
    eprintln!();

    let conversation = Conversation::new(producer, Scheduler::new(personas.clone(), topic), turns)
        .with_deltas(true);
    let (tx, mut rx) = mpsc::channel(32);
    let driver = tokio::spawn(conversation.run(tx));

    let mut stdout = io::stdout();
    let mut open_turn: Option<String> = None;
    let mut spoken = 0usize;
    let mut failed = false;

    while let Some(event) = rx.recv().await {
        match event {
            TurnEvent::Delta { id, text } => {
                if open_turn.as_deref() != Some(id.as_str()) {
                    let speaker = personas.for_turn(spoken);
                    write!(stdout, "{} ({}): ", speaker.name, speaker.role)?;
                    open_turn = Some(id);
                }
                write!(stdout, "{text}")?;
                stdout.flush()?;
            }
            TurnEvent::Message(message) => {
                if open_turn.take().as_deref() == Some(message.id.as_str()) {
                    writeln!(stdout)?;
                } else {
                    writeln!(stdout, "{}", message.attributed_line())?;
                }
                writeln!(stdout)?;
                logging.log_message(&message.attributed_line())?;
                spoken += 1;
            }
            TurnEvent::Error { error, details } => {
                if open_turn.take().is_some() {
                    writeln!(stdout)?;
                }
                eprintln!("❌ {error}: {details}");
                failed = true;
            }
            TurnEvent::Done => break,
        }
    }
    driver.await?;

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
