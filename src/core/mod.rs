pub mod builtin_personas;
pub mod chat_stream;
pub mod config;
pub mod conversation;
pub mod generator;
pub mod message;
pub mod persona;
pub mod producer;
pub mod providers;
pub mod scheduler;
