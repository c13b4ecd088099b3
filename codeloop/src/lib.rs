//! Autonomous coding-agent loop.
//!
//! A run drives an LLM through repeated "decide, execute, observe" rounds
//! until it answers in plain text or a bound is hit. The crate keeps a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (normalization, error taxonomy,
//!   argument validation, path confinement). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (config, filesystem, processes,
//!   prompts, human channels, transcripts). Isolated behind traits for tests.
//! - **[`llm`]** and **[`tools`]**: the injected LLM client and the tool
//!   contract, registry, and built-in tools.
//!
//! Orchestration modules ([`step`], [`agent_loop`], [`agents`]) compose these
//! into the runner the CLI exposes.

pub mod agent_loop;
pub mod agents;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod llm;
pub mod logging;
pub mod step;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
