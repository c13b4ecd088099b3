//! Stable exit codes for codeloop CLI commands.

use crate::core::types::TerminalStatus;

/// Command succeeded or the run ended with a final response.
pub const OK: i32 = 0;
/// Invalid input/config, or the run ended with an error.
pub const FAILED: i32 = 1;
/// The run hit its iteration bound without a final response.
pub const MAX_ITERATIONS: i32 = 2;
/// The run was cancelled (Ctrl-C).
pub const CANCELLED: i32 = 3;

pub fn for_status(status: TerminalStatus) -> i32 {
    match status {
        TerminalStatus::Success => OK,
        TerminalStatus::Error => FAILED,
        TerminalStatus::MaxIterations => MAX_ITERATIONS,
        TerminalStatus::Cancelled => CANCELLED,
    }
}
