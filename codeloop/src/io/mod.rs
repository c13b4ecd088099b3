//! Side-effecting collaborators used by the agent loop and CLI.

pub mod config;
pub mod human;
pub mod process;
pub mod prompt;
pub mod transcript;
pub mod workspace;
