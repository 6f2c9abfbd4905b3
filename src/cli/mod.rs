//! Command-line interface parsing and handling
//!
//! `serve` is the default command; `run` stages a debate in the terminal.

pub mod persona_list;
pub mod run;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::warn;

use crate::cli::persona_list::list_personas;
use crate::cli::run::{run_debate, RunOptions};
use crate::core::config::Config;
use crate::core::producer::EngineKind;
use crate::core::providers::resolve_env_session;
use crate::server::{self, AppState};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ")"
);

#[derive(Parser)]
#[command(name = "duologue", version = VERSION)]
#[command(about = "Stage a turn-based debate between two personas")]
#[command(
    long_about = "Duologue stages a short debate between two scripted personas on any topic \
and streams each turn as it is written. Turns come from an LLM when a provider key is \
available, otherwise from a local phrase engine.\n\n\
Environment Variables:\n\
  OPENAI_API_KEY      Use an OpenAI-compatible provider (checked first)\n\
  OPENAI_BASE_URL     Custom API base URL (defaults to https://api.openai.com/v1)\n\
  OPENAI_MODEL        Model override for the OpenAI-compatible provider\n\
  ANTHROPIC_API_KEY   Use Anthropic when no OpenAI key is set\n\
  ANTHROPIC_BASE_URL  Custom Anthropic base URL\n\
  RUST_LOG            Log filter (defaults to info)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Read settings from this file instead of the platform config dir
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the HTTP API and browser client (default)
    Serve {
        /// Address to listen on, e.g. 127.0.0.1:3000
        #[arg(short = 'b', long)]
        bind: Option<String>,
        /// Default engine for requests that do not pick one
        #[arg(short = 'e', long, value_enum)]
        engine: Option<EngineKind>,
    },
    /// Run one debate in the terminal
    Run {
        /// Topic to debate (can be multiple words)
        #[arg(trailing_var_arg = true)]
        topic: Vec<String>,
        /// Number of turns, clamped to 4-20
        #[arg(short = 't', long)]
        turns: Option<usize>,
        #[arg(short = 'e', long, value_enum)]
        engine: Option<EngineKind>,
        /// Append the transcript to this file
        #[arg(short = 'l', long)]
        log: Option<String>,
    },
    /// List the personas that will take part
    Personas,
    /// Show the effective configuration
    Config,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;

    match args.command.unwrap_or(Commands::Serve {
        bind: None,
        engine: None,
    }) {
        Commands::Serve { bind, engine } => {
            if let Some(bind) = bind {
                config.bind = Some(bind);
            }
            if let Some(engine) = engine {
                config.engine = Some(engine);
            }
            let session = resolve_env_session(&config).ok();
            if session.is_none() && config.engine() == EngineKind::Llm {
                warn!("Engine is llm but no provider key is set; requests will fail");
            }

            let bind = config.bind_address().to_string();
            let client = build_client(&config)?;
            let state = AppState::new(config, session, client)?;
            server::serve(state, &bind).await?;
            Ok(())
        }
        Commands::Run {
            topic,
            turns,
            engine,
            log,
        } => {
            let client = build_client(&config)?;
            run_debate(
                &config,
                client,
                RunOptions {
                    topic,
                    turns,
                    engine,
                    log,
                },
            )
            .await
        }
        Commands::Personas => list_personas(&config, args.config.as_deref()),
        Commands::Config => {
            config.print_all();
            Ok(())
        }
    }
}

fn build_client(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
}
