//! Reply gateway: email reply evaluation and chat queue routing over HTTP.

pub mod chat;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod queue;
pub mod reply;
pub mod server;
