//! Palaver is a conversation and session engine for chat backends, covering
//! both standard (single-reply) and multi-agent (multi-reply) conversations.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns conversation state: the turn log, session metadata, the
//!   orchestrator that drives the send/receive/persist cycle, configuration
//!   and one-shot service construction.
//! - [`transport`] exchanges turn logs with the chat backend over HTTP,
//!   including the multi-agent event-stream contract, or serves canned
//!   replies offline.
//! - [`history`] persists sessions and their turn logs behind one trait with
//!   in-memory, file-backed and REST-backed implementations.
//! - [`api`] defines the wire payloads shared by the transports.
//!
//! The binary crate (`src/main.rs`) wires these together into a small
//! line-oriented chat client.

pub mod api;
pub mod core;
pub mod error;
pub mod history;
pub mod transport;
pub mod utils;
