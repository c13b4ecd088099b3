//! Standardized, LLM-actionable tool errors.
//!
//! Every self-correctable tool failure carries a code from the closed
//! [`ErrorCode`] set, a message, and a concrete next step for the model. The
//! rendered form becomes the content of the tool message reinjected into the
//! conversation.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Domain an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Parameter,
    Filesystem,
    Content,
    VersionControl,
    TestLint,
    Command,
    System,
}

/// Closed taxonomy of tool error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingParameter,
    InvalidParameter,
    InvalidParameterType,

    FileNotFound,
    DirectoryNotFound,
    NotAFile,
    NotADirectory,
    PathOutsideWorkspace,
    PermissionDenied,
    FileTooLarge,

    InvalidLineRange,
    InvalidEncoding,
    InvalidPattern,

    VcsNotRepository,
    VcsCommandFailed,
    VcsConflict,

    TestsFailed,
    LintFailed,
    TestRunnerNotFound,

    CommandFailed,
    CommandTimeout,
    CommandNotFound,

    InternalError,
    UnsupportedOperation,
    Timeout,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 25] = [
        ErrorCode::MissingParameter,
        ErrorCode::InvalidParameter,
        ErrorCode::InvalidParameterType,
        ErrorCode::FileNotFound,
        ErrorCode::DirectoryNotFound,
        ErrorCode::NotAFile,
        ErrorCode::NotADirectory,
        ErrorCode::PathOutsideWorkspace,
        ErrorCode::PermissionDenied,
        ErrorCode::FileTooLarge,
        ErrorCode::InvalidLineRange,
        ErrorCode::InvalidEncoding,
        ErrorCode::InvalidPattern,
        ErrorCode::VcsNotRepository,
        ErrorCode::VcsCommandFailed,
        ErrorCode::VcsConflict,
        ErrorCode::TestsFailed,
        ErrorCode::LintFailed,
        ErrorCode::TestRunnerNotFound,
        ErrorCode::CommandFailed,
        ErrorCode::CommandTimeout,
        ErrorCode::CommandNotFound,
        ErrorCode::InternalError,
        ErrorCode::UnsupportedOperation,
        ErrorCode::Timeout,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MissingParameter => "MISSING_PARAMETER",
            ErrorCode::InvalidParameter => "INVALID_PARAMETER",
            ErrorCode::InvalidParameterType => "INVALID_PARAMETER_TYPE",
            ErrorCode::FileNotFound => "FILE_NOT_FOUND",
            ErrorCode::DirectoryNotFound => "DIRECTORY_NOT_FOUND",
            ErrorCode::NotAFile => "NOT_A_FILE",
            ErrorCode::NotADirectory => "NOT_A_DIRECTORY",
            ErrorCode::PathOutsideWorkspace => "PATH_OUTSIDE_WORKSPACE",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::FileTooLarge => "FILE_TOO_LARGE",
            ErrorCode::InvalidLineRange => "INVALID_LINE_RANGE",
            ErrorCode::InvalidEncoding => "INVALID_ENCODING",
            ErrorCode::InvalidPattern => "INVALID_PATTERN",
            ErrorCode::VcsNotRepository => "VCS_NOT_REPOSITORY",
            ErrorCode::VcsCommandFailed => "VCS_COMMAND_FAILED",
            ErrorCode::VcsConflict => "VCS_CONFLICT",
            ErrorCode::TestsFailed => "TESTS_FAILED",
            ErrorCode::LintFailed => "LINT_FAILED",
            ErrorCode::TestRunnerNotFound => "TEST_RUNNER_NOT_FOUND",
            ErrorCode::CommandFailed => "COMMAND_FAILED",
            ErrorCode::CommandTimeout => "COMMAND_TIMEOUT",
            ErrorCode::CommandNotFound => "COMMAND_NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::UnsupportedOperation => "UNSUPPORTED_OPERATION",
            ErrorCode::Timeout => "TIMEOUT",
        }
    }

    pub fn category(self) -> ErrorCategory {
        match self {
            ErrorCode::MissingParameter
            | ErrorCode::InvalidParameter
            | ErrorCode::InvalidParameterType => ErrorCategory::Parameter,
            ErrorCode::FileNotFound
            | ErrorCode::DirectoryNotFound
            | ErrorCode::NotAFile
            | ErrorCode::NotADirectory
            | ErrorCode::PathOutsideWorkspace
            | ErrorCode::PermissionDenied
            | ErrorCode::FileTooLarge => ErrorCategory::Filesystem,
            ErrorCode::InvalidLineRange | ErrorCode::InvalidEncoding | ErrorCode::InvalidPattern => {
                ErrorCategory::Content
            }
            ErrorCode::VcsNotRepository | ErrorCode::VcsCommandFailed | ErrorCode::VcsConflict => {
                ErrorCategory::VersionControl
            }
            ErrorCode::TestsFailed | ErrorCode::LintFailed | ErrorCode::TestRunnerNotFound => {
                ErrorCategory::TestLint
            }
            ErrorCode::CommandFailed | ErrorCode::CommandTimeout | ErrorCode::CommandNotFound => {
                ErrorCategory::Command
            }
            ErrorCode::InternalError | ErrorCode::UnsupportedOperation | ErrorCode::Timeout => {
                ErrorCategory::System
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured, LLM-actionable failure description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct StandardizedToolError {
    pub code: ErrorCode,
    pub message: String,
    pub suggestion_for_llm: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
}

impl StandardizedToolError {
    pub fn new(
        code: ErrorCode,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            suggestion_for_llm: suggestion.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Render message, suggestion, and details as one string for the LLM.
    pub fn render(&self) -> String {
        let mut out = format!("Error [{}]: {}", self.code, self.message);
        if !self.suggestion_for_llm.is_empty() {
            out.push_str("\nSuggestion: ");
            out.push_str(&self.suggestion_for_llm);
        }
        if !self.details.is_empty() {
            out.push_str("\nDetails:");
            for (key, value) in &self.details {
                match value {
                    Value::String(text) => out.push_str(&format!("\n- {key}: {text}")),
                    other => out.push_str(&format!("\n- {key}: {other}")),
                }
            }
        }
        out
    }

    pub fn missing_parameter(tool: &str, parameter: &str) -> Self {
        Self::new(
            ErrorCode::MissingParameter,
            format!("missing required parameter '{parameter}' for {tool}"),
            format!("Call {tool} again and include the '{parameter}' parameter."),
        )
        .with_detail("tool", tool)
        .with_detail("parameter", parameter)
    }

    pub fn invalid_parameter(tool: &str, parameter: &str, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidParameter,
            format!("invalid parameter '{parameter}' for {tool}: {}", reason.into()),
            format!("Check the parameter schema of {tool} and correct '{parameter}'."),
        )
        .with_detail("tool", tool)
        .with_detail("parameter", parameter)
    }

    pub fn invalid_parameter_type(tool: &str, parameter: &str, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidParameterType,
            format!(
                "parameter '{parameter}' for {tool} has the wrong type: {}",
                reason.into()
            ),
            format!("Pass '{parameter}' using the JSON type declared in the {tool} schema."),
        )
        .with_detail("tool", tool)
        .with_detail("parameter", parameter)
    }

    pub fn file_not_found(path: &str) -> Self {
        Self::new(
            ErrorCode::FileNotFound,
            format!("file not found: {path}"),
            "Use list_directory to verify the path before retrying.",
        )
        .with_detail("path", path)
    }

    pub fn directory_not_found(path: &str) -> Self {
        Self::new(
            ErrorCode::DirectoryNotFound,
            format!("directory not found: {path}"),
            "Use list_directory on a parent directory to find the correct path.",
        )
        .with_detail("path", path)
    }

    pub fn not_a_file(path: &str) -> Self {
        Self::new(
            ErrorCode::NotAFile,
            format!("path is a directory, not a file: {path}"),
            "Use list_directory to inspect directories and read_file for files.",
        )
        .with_detail("path", path)
    }

    pub fn not_a_directory(path: &str) -> Self {
        Self::new(
            ErrorCode::NotADirectory,
            format!("path is a file, not a directory: {path}"),
            "Use read_file to read files; list_directory only accepts directories.",
        )
        .with_detail("path", path)
    }

    pub fn path_outside_workspace(path: &str) -> Self {
        Self::new(
            ErrorCode::PathOutsideWorkspace,
            format!("path escapes the workspace root: {path}"),
            "Use a path relative to the workspace root without '..' segments.",
        )
        .with_detail("path", path)
    }

    pub fn permission_denied(path: &str) -> Self {
        Self::new(
            ErrorCode::PermissionDenied,
            format!("permission denied: {path}"),
            "Choose a different path inside the workspace.",
        )
        .with_detail("path", path)
    }

    pub fn file_too_large(path: &str, size: u64, limit: u64) -> Self {
        Self::new(
            ErrorCode::FileTooLarge,
            format!("{path} is {size} bytes, above the {limit} byte limit"),
            "Request a smaller line range or split the content into several files.",
        )
        .with_detail("path", path)
        .with_detail("size_bytes", size)
        .with_detail("limit_bytes", limit)
    }

    pub fn invalid_line_range(path: &str, start: u64, end: u64, total: u64) -> Self {
        Self::new(
            ErrorCode::InvalidLineRange,
            format!("line range {start}-{end} is invalid for {path} ({total} lines)"),
            "Use 1-based line numbers with start_line <= end_line <= the file's line count.",
        )
        .with_detail("path", path)
        .with_detail("start_line", start)
        .with_detail("end_line", end)
        .with_detail("total_lines", total)
    }

    pub fn invalid_encoding(path: &str) -> Self {
        Self::new(
            ErrorCode::InvalidEncoding,
            format!("{path} is not valid UTF-8 text"),
            "Only text files can be read; skip binary files.",
        )
        .with_detail("path", path)
    }

    pub fn invalid_pattern(pattern: &str, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidPattern,
            format!("invalid search pattern: {}", reason.into()),
            "Escape regex metacharacters or simplify the pattern.",
        )
        .with_detail("pattern", pattern)
    }

    pub fn tests_failed(exit_code: Option<i32>, output: &str) -> Self {
        Self::new(
            ErrorCode::TestsFailed,
            format!("tests failed (exit code {})", render_exit_code(exit_code)),
            "Read the failing test output, fix the code, and run the tests again.",
        )
        .with_detail("output", output)
    }

    pub fn lint_failed(exit_code: Option<i32>, output: &str) -> Self {
        Self::new(
            ErrorCode::LintFailed,
            format!("lint failed (exit code {})", render_exit_code(exit_code)),
            "Address the reported lint findings and run the linter again.",
        )
        .with_detail("output", output)
    }

    pub fn command_timeout(command: &str, timeout: Duration) -> Self {
        Self::new(
            ErrorCode::CommandTimeout,
            format!("`{command}` timed out after {}s", timeout.as_secs()),
            "Narrow the command's scope or ask whether a longer timeout is acceptable.",
        )
        .with_detail("command", command)
        .with_detail("timeout_secs", timeout.as_secs())
    }

    pub fn command_not_found(command: &str, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::CommandNotFound,
            format!("could not start `{command}`: {}", reason.into()),
            "The command is not available in this environment; continue without it.",
        )
        .with_detail("command", command)
    }

    pub fn unsupported_operation(tool: &str, available: &[String]) -> Self {
        Self::new(
            ErrorCode::UnsupportedOperation,
            format!("unknown tool '{tool}'"),
            "Call one of the available tools listed in the details.",
        )
        .with_detail("tool", tool)
        .with_detail("available_tools", json!(available))
    }

    pub fn internal_error(tool: &str, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalError,
            format!("{tool} failed internally: {}", detail.into()),
            "This is not caused by your parameters. Try a different approach or tool.",
        )
        .with_detail("tool", tool)
    }

    pub fn timeout(tool: &str, timeout: Duration) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("{tool} did not finish within {}s", timeout.as_secs()),
            "Retry with a narrower request, or use a different tool.",
        )
        .with_detail("tool", tool)
        .with_detail("timeout_secs", timeout.as_secs())
    }
}

fn render_exit_code(code: Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |code| code.to_string())
}
