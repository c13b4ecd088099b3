//! Deterministic, pure logic shared by the agent loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod budget;
pub mod clarification;
pub mod conversation;
pub mod errors;
pub mod normalize;
pub mod path;
pub mod schema;
pub mod types;
