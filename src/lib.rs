//! Duologue stages a short, turn-based debate between two scripted personas.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the persona registry, turn scheduling, the response
//!   producers (upstream LLM or local templates), and the conversation driver
//!   that turns a topic into a stream of events.
//! - [`server`] exposes the driver over HTTP, streaming turns as server-sent
//!   events and serving the embedded browser client.
//! - [`api`] defines the upstream chat payloads for OpenAI-compatible and
//!   Anthropic providers.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod server;
pub mod utils;
