pub mod config;
pub mod factory;
pub mod message;
pub mod orchestrator;
pub mod session;
pub mod transcript;
