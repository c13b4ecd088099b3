//! Workspace file tools: list, read, write, search.
//!
//! Every path argument goes through [`Workspace::resolve`]; every size is
//! bounded by [`ToolLimits`].

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::errors::StandardizedToolError;
use crate::core::types::ToolResult;
use crate::io::config::ToolLimits;
use crate::io::workspace::{Workspace, classify_io_error};
use crate::tools::{Tool, parse_params};

pub const LIST_DIRECTORY: &str = "list_directory";
pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const SEARCH_FILES: &str = "search_files";

/// Directories `search_files` never descends into.
const SKIPPED_DIRS: [&str; 3] = [".git", "target", "node_modules"];

fn default_dot() -> String {
    ".".to_string()
}

/// Convert an I/O failure into a tool result when the LLM can act on it.
fn io_failure(err: io::Error, shown: &str, expect_dir: bool, action: &str) -> Result<ToolResult> {
    match classify_io_error(&err, shown, expect_dir) {
        Some(tool_err) => Ok(ToolResult::from_error(tool_err)),
        None => Err(err).with_context(|| format!("{action} {shown}")),
    }
}

macro_rules! try_param {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(err) => return Ok(ToolResult::from_error(err)),
        }
    };
}

// ---------------------------------------------------------------------------
// list_directory

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default = "default_dot")]
    path: String,
}

#[derive(Debug, Clone)]
pub struct ListDirectoryTool {
    workspace: Workspace,
    limits: ToolLimits,
}

impl ListDirectoryTool {
    pub fn new(workspace: Workspace, limits: ToolLimits) -> Self {
        Self { workspace, limits }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        LIST_DIRECTORY
    }

    fn description(&self) -> &str {
        "List the entries of a workspace directory.
Directories are shown with a trailing '/', files with their size in bytes.
Use '.' (the default) for the workspace root. Example: {\"path\": \"src\"}"
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory relative to the workspace root."}
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, _cancel: &CancellationToken, params: Value) -> Result<ToolResult> {
        let params: ListParams = try_param!(parse_params(self.name(), params));
        let path = try_param!(self.workspace.resolve(&params.path));
        let shown = self.workspace.display(&path);
        let fs = self.workspace.fs();

        match fs.metadata(&path) {
            Ok(meta) if !meta.is_dir => {
                return Ok(ToolResult::from_error(StandardizedToolError::not_a_directory(
                    &shown,
                )));
            }
            Ok(_) => {}
            Err(err) => return io_failure(err, &shown, true, "stat"),
        }
        let entries = match fs.list(&path) {
            Ok(entries) => entries,
            Err(err) => return io_failure(err, &shown, true, "list"),
        };

        let total = entries.len();
        let mut out = String::new();
        for entry in entries.iter().take(self.limits.max_list_entries) {
            if entry.is_dir {
                let _ = writeln!(out, "{}/", entry.name);
            } else {
                let _ = writeln!(out, "{} ({} bytes)", entry.name, entry.size);
            }
        }
        if total > self.limits.max_list_entries {
            let _ = writeln!(
                out,
                "[{} more entries not shown]",
                total - self.limits.max_list_entries
            );
        }
        if total == 0 {
            let _ = writeln!(out, "(empty directory: {shown})");
        }
        debug!(path = %shown, entries = total, "listed directory");
        Ok(ToolResult::ok(Value::String(out)))
    }
}

// ---------------------------------------------------------------------------
// read_file

#[derive(Debug, Deserialize)]
struct ReadParams {
    path: String,
    #[serde(default)]
    start_line: Option<u64>,
    #[serde(default)]
    end_line: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ReadFileTool {
    workspace: Workspace,
    limits: ToolLimits,
}

impl ReadFileTool {
    pub fn new(workspace: Workspace, limits: ToolLimits) -> Self {
        Self { workspace, limits }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        READ_FILE
    }

    fn description(&self) -> &str {
        "Read a UTF-8 text file from the workspace.
Optionally pass a 1-based inclusive line range with start_line and end_line.
Precondition: the path names an existing file (use list_directory first if unsure).
Example: {\"path\": \"src/main.rs\", \"start_line\": 10, \"end_line\": 40}"
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "minLength": 1},
                "start_line": {"type": "integer", "minimum": 1},
                "end_line": {"type": "integer", "minimum": 1}
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, _cancel: &CancellationToken, params: Value) -> Result<ToolResult> {
        let params: ReadParams = try_param!(parse_params(self.name(), params));
        let path = try_param!(self.workspace.resolve(&params.path));
        let shown = self.workspace.display(&path);
        let fs = self.workspace.fs();

        let meta = match fs.metadata(&path) {
            Ok(meta) => meta,
            Err(err) => return io_failure(err, &shown, false, "stat"),
        };
        if meta.is_dir {
            return Ok(ToolResult::from_error(StandardizedToolError::not_a_file(
                &shown,
            )));
        }
        // Ranged reads may open files up to 8x the limit; the selection is
        // bounded again below.
        let ranged = params.start_line.is_some() || params.end_line.is_some();
        let read_cap = if ranged {
            self.limits.max_file_bytes.saturating_mul(8)
        } else {
            self.limits.max_file_bytes
        };
        if meta.len > read_cap {
            return Ok(ToolResult::from_error(StandardizedToolError::file_too_large(
                &shown,
                meta.len,
                self.limits.max_file_bytes,
            )));
        }

        let bytes = match fs.read(&path) {
            Ok(bytes) => bytes,
            Err(err) => return io_failure(err, &shown, false, "read"),
        };
        let Ok(text) = String::from_utf8(bytes) else {
            return Ok(ToolResult::from_error(
                StandardizedToolError::invalid_encoding(&shown),
            ));
        };

        if !ranged {
            return Ok(ToolResult::ok(Value::String(text)));
        }

        let lines: Vec<&str> = text.lines().collect();
        let total = lines.len() as u64;
        let start = params.start_line.unwrap_or(1);
        let end = params.end_line.unwrap_or(total).min(total);
        if start == 0 || start > total || end < start {
            return Ok(ToolResult::from_error(
                StandardizedToolError::invalid_line_range(
                    &shown,
                    start,
                    params.end_line.unwrap_or(total),
                    total,
                ),
            ));
        }
        // Bounds checked above; both fit in usize because they index `lines`.
        let selected = lines[(start - 1) as usize..end as usize].join("\n");
        if selected.len() as u64 > self.limits.max_file_bytes {
            return Ok(ToolResult::from_error(StandardizedToolError::file_too_large(
                &shown,
                selected.len() as u64,
                self.limits.max_file_bytes,
            )));
        }
        Ok(ToolResult::ok(Value::String(selected)))
    }
}

// ---------------------------------------------------------------------------
// write_file

#[derive(Debug, Deserialize)]
struct WriteParams {
    path: String,
    content: String,
}

#[derive(Debug, Clone)]
pub struct WriteFileTool {
    workspace: Workspace,
    limits: ToolLimits,
}

impl WriteFileTool {
    pub fn new(workspace: Workspace, limits: ToolLimits) -> Self {
        Self { workspace, limits }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        WRITE_FILE
    }

    fn description(&self) -> &str {
        "Create or overwrite a text file in the workspace with the given content.
Missing parent directories are created. The whole file is replaced.
Postcondition: reading the file returns exactly `content`.
Example: {\"path\": \"hello.go\", \"content\": \"package main\\n\"}"
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "minLength": 1},
                "content": {"type": "string"}
            },
            "required": ["path", "content"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, _cancel: &CancellationToken, params: Value) -> Result<ToolResult> {
        let params: WriteParams = try_param!(parse_params(self.name(), params));
        let path = try_param!(self.workspace.resolve(&params.path));
        let shown = self.workspace.display(&path);
        let size = params.content.len() as u64;
        if size > self.limits.max_file_bytes {
            return Ok(ToolResult::from_error(StandardizedToolError::file_too_large(
                &shown,
                size,
                self.limits.max_file_bytes,
            )));
        }
        if path == self.workspace.root() {
            return Ok(ToolResult::from_error(StandardizedToolError::not_a_file(
                &shown,
            )));
        }

        let fs = self.workspace.fs();
        if let Ok(meta) = fs.metadata(&path)
            && meta.is_dir
        {
            return Ok(ToolResult::from_error(StandardizedToolError::not_a_file(
                &shown,
            )));
        }
        if let Err(err) = fs.write(&path, params.content.as_bytes()) {
            return io_failure(err, &shown, false, "write");
        }
        debug!(path = %shown, bytes = size, "wrote file");
        Ok(ToolResult::ok(Value::String(format!(
            "wrote {size} bytes to {shown}"
        ))))
    }
}

// ---------------------------------------------------------------------------
// search_files

#[derive(Debug, Deserialize)]
struct SearchParams {
    pattern: String,
    #[serde(default = "default_dot")]
    path: String,
}

#[derive(Debug, Clone)]
pub struct SearchFilesTool {
    workspace: Workspace,
    limits: ToolLimits,
}

impl SearchFilesTool {
    pub fn new(workspace: Workspace, limits: ToolLimits) -> Self {
        Self { workspace, limits }
    }

    /// Files under `start` in depth-first, name-sorted order. Entries whose
    /// links resolve outside the workspace are skipped.
    fn collect_files(&self, start: &Path, cancel: &CancellationToken) -> io::Result<Vec<PathBuf>> {
        let fs = self.workspace.fs();
        let mut files = Vec::new();
        let mut stack = vec![start.to_path_buf()];
        while let Some(dir) = stack.pop() {
            if cancel.is_cancelled() {
                break;
            }
            let entries = fs.list(&dir)?;
            let mut subdirs = Vec::new();
            for entry in entries {
                let path = dir.join(&entry.name);
                if !self.workspace.contains(&path) {
                    continue;
                }
                if entry.is_dir {
                    if !SKIPPED_DIRS.contains(&entry.name.as_str()) {
                        subdirs.push(path);
                    }
                } else if entry.size <= self.limits.max_file_bytes {
                    files.push(path);
                }
            }
            stack.extend(subdirs.into_iter().rev());
        }
        Ok(files)
    }
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        SEARCH_FILES
    }

    fn description(&self) -> &str {
        "Search workspace text files for lines matching a regular expression.
Results are `path:line: text`. Binary files and .git/target/node_modules are skipped.
Pass `path` to restrict the search to a directory or a single file.
Example: {\"pattern\": \"fn\\\\s+main\", \"path\": \"src\"}"
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "minLength": 1},
                "path": {"type": "string"}
            },
            "required": ["pattern"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, cancel: &CancellationToken, params: Value) -> Result<ToolResult> {
        let params: SearchParams = try_param!(parse_params(self.name(), params));
        let regex = match Regex::new(&params.pattern) {
            Ok(regex) => regex,
            Err(err) => {
                return Ok(ToolResult::from_error(
                    StandardizedToolError::invalid_pattern(&params.pattern, err.to_string()),
                ));
            }
        };
        let start = try_param!(self.workspace.resolve(&params.path));
        let shown = self.workspace.display(&start);
        let fs = self.workspace.fs();

        let files = match fs.metadata(&start) {
            Ok(meta) if meta.is_dir => match self.collect_files(&start, cancel) {
                Ok(files) => files,
                Err(err) => return io_failure(err, &shown, true, "walk"),
            },
            Ok(_) => vec![start.clone()],
            Err(err) => return io_failure(err, &shown, true, "stat"),
        };

        let max = self.limits.max_search_matches;
        let mut matches = Vec::new();
        let mut truncated = false;
        'files: for file in &files {
            let Ok(bytes) = fs.read(file) else {
                continue;
            };
            let Ok(text) = std::str::from_utf8(&bytes) else {
                continue;
            };
            let rel = self.workspace.display(file);
            for (idx, line) in text.lines().enumerate() {
                if regex.is_match(line) {
                    if matches.len() == max {
                        truncated = true;
                        break 'files;
                    }
                    matches.push(format!("{rel}:{}: {}", idx + 1, line.trim_end()));
                }
            }
        }

        debug!(pattern = %params.pattern, files = files.len(), matches = matches.len(), "searched files");
        if matches.is_empty() {
            return Ok(ToolResult::ok(Value::String(format!(
                "no matches for /{}/ under {shown}",
                params.pattern
            ))));
        }
        let mut out = matches.join("\n");
        if truncated {
            let _ = write!(out, "\n[stopped after {max} matches; narrow the pattern or path]");
        }
        Ok(ToolResult::ok(Value::String(out)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorCode;
    use std::fs;

    fn setup() -> (tempfile::TempDir, Workspace) {
        let temp = tempfile::tempdir().expect("tempdir");
        let workspace = Workspace::local(temp.path()).expect("workspace");
        (temp, workspace)
    }

    fn text(result: &ToolResult) -> &str {
        result
            .data
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or_else(|| panic!("expected text data, got {result:?}"))
    }

    fn code(result: &ToolResult) -> ErrorCode {
        result
            .standardized_error
            .as_ref()
            .map(|err| err.code)
            .unwrap_or_else(|| panic!("expected standardized error, got {result:?}"))
    }

    async fn run(tool: &dyn Tool, params: Value) -> ToolResult {
        tool.execute(&CancellationToken::new(), params)
            .await
            .expect("execute")
    }

    #[tokio::test]
    async fn list_directory_shows_dirs_and_sizes() {
        let (temp, workspace) = setup();
        fs::create_dir(temp.path().join("src")).expect("mkdir");
        fs::write(temp.path().join("go.mod"), "module x\n").expect("write");

        let tool = ListDirectoryTool::new(workspace, ToolLimits::default());
        let result = run(&tool, json!({})).await;
        assert!(result.success);
        assert_eq!(text(&result), "go.mod (9 bytes)\nsrc/\n");
    }

    #[tokio::test]
    async fn list_directory_reports_missing_and_truncates() {
        let (temp, workspace) = setup();
        for name in ["a", "b", "c"] {
            fs::write(temp.path().join(name), "").expect("write");
        }
        let limits = ToolLimits {
            max_list_entries: 2,
            ..ToolLimits::default()
        };
        let tool = ListDirectoryTool::new(workspace, limits);

        let result = run(&tool, json!({"path": "nope"})).await;
        assert_eq!(code(&result), ErrorCode::DirectoryNotFound);

        let result = run(&tool, json!({"path": "a"})).await;
        assert_eq!(code(&result), ErrorCode::NotADirectory);

        let result = run(&tool, json!({"path": "."})).await;
        assert!(text(&result).contains("[1 more entries not shown]"));
    }

    #[tokio::test]
    async fn read_file_supports_line_ranges() {
        let (temp, workspace) = setup();
        fs::write(temp.path().join("a.txt"), "one\ntwo\nthree\n").expect("write");
        let tool = ReadFileTool::new(workspace, ToolLimits::default());

        let whole = run(&tool, json!({"path": "a.txt"})).await;
        assert_eq!(text(&whole), "one\ntwo\nthree\n");

        let range = run(&tool, json!({"path": "a.txt", "start_line": 2, "end_line": 3})).await;
        assert_eq!(text(&range), "two\nthree");

        let clamped = run(&tool, json!({"path": "a.txt", "start_line": 3, "end_line": 99})).await;
        assert_eq!(text(&clamped), "three");

        let bad = run(&tool, json!({"path": "a.txt", "start_line": 5})).await;
        assert_eq!(code(&bad), ErrorCode::InvalidLineRange);

        let inverted = run(&tool, json!({"path": "a.txt", "start_line": 3, "end_line": 2})).await;
        assert_eq!(code(&inverted), ErrorCode::InvalidLineRange);
    }

    #[tokio::test]
    async fn read_file_classifies_failures() {
        let (temp, workspace) = setup();
        fs::create_dir(temp.path().join("dir")).expect("mkdir");
        fs::write(temp.path().join("bin"), [0xff, 0xfe, 0x00]).expect("write");
        fs::write(temp.path().join("big"), "x".repeat(32)).expect("write");
        let limits = ToolLimits {
            max_file_bytes: 16,
            ..ToolLimits::default()
        };
        let tool = ReadFileTool::new(workspace, limits);

        let missing = run(&tool, json!({"path": "missing.go"})).await;
        assert_eq!(code(&missing), ErrorCode::FileNotFound);
        assert!(missing.render_for_llm().contains("list_directory"));

        assert_eq!(code(&run(&tool, json!({"path": "dir"})).await), ErrorCode::NotAFile);
        assert_eq!(code(&run(&tool, json!({"path": "bin"})).await), ErrorCode::InvalidEncoding);
        assert_eq!(code(&run(&tool, json!({"path": "big"})).await), ErrorCode::FileTooLarge);
        assert_eq!(
            code(&run(&tool, json!({"path": "../etc/passwd"})).await),
            ErrorCode::PathOutsideWorkspace
        );
    }

    #[tokio::test]
    async fn write_file_creates_parents_and_enforces_limits() {
        let (temp, workspace) = setup();
        let limits = ToolLimits {
            max_file_bytes: 64,
            ..ToolLimits::default()
        };
        let tool = WriteFileTool::new(workspace, limits);

        let result = run(
            &tool,
            json!({"path": "cmd/hello/main.go", "content": "package main\n"}),
        )
        .await;
        assert!(result.success, "{result:?}");
        assert_eq!(
            fs::read_to_string(temp.path().join("cmd/hello/main.go")).expect("read"),
            "package main\n"
        );

        let big = run(&tool, json!({"path": "big.txt", "content": "x".repeat(65)})).await;
        assert_eq!(code(&big), ErrorCode::FileTooLarge);
        assert!(!temp.path().join("big.txt").exists());

        let dir = run(&tool, json!({"path": "cmd", "content": ""})).await;
        assert_eq!(code(&dir), ErrorCode::NotAFile);

        let escape = run(&tool, json!({"path": "../x.txt", "content": ""})).await;
        assert_eq!(code(&escape), ErrorCode::PathOutsideWorkspace);
    }

    #[tokio::test]
    async fn search_files_finds_matches_in_order() {
        let (temp, workspace) = setup();
        fs::create_dir_all(temp.path().join("src/nested")).expect("mkdir");
        fs::create_dir_all(temp.path().join("target")).expect("mkdir");
        fs::write(temp.path().join("src/a.rs"), "fn main() {}\nlet x = 1;\n").expect("write");
        fs::write(temp.path().join("src/nested/b.rs"), "fn helper() {}\n").expect("write");
        fs::write(temp.path().join("target/gen.rs"), "fn generated() {}\n").expect("write");

        let tool = SearchFilesTool::new(workspace, ToolLimits::default());
        let result = run(&tool, json!({"pattern": r"^fn \w+"})).await;
        assert_eq!(
            text(&result),
            "src/a.rs:1: fn main() {}\nsrc/nested/b.rs:1: fn helper() {}"
        );

        let none = run(&tool, json!({"pattern": "zzz", "path": "src"})).await;
        assert!(text(&none).starts_with("no matches"));
    }

    #[tokio::test]
    async fn search_files_rejects_bad_pattern_and_bounds_matches() {
        let (temp, workspace) = setup();
        fs::write(temp.path().join("a.txt"), "x\nx\nx\n").expect("write");
        let limits = ToolLimits {
            max_search_matches: 2,
            ..ToolLimits::default()
        };
        let tool = SearchFilesTool::new(workspace, limits);

        let bad = run(&tool, json!({"pattern": "("})).await;
        assert_eq!(code(&bad), ErrorCode::InvalidPattern);

        let bounded = run(&tool, json!({"pattern": "x", "path": "a.txt"})).await;
        let out = text(&bounded);
        assert_eq!(out.lines().filter(|l| l.starts_with("a.txt:")).count(), 2);
        assert!(out.contains("[stopped after 2 matches"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn write_file_refuses_dangling_symlink() {
        let (temp, workspace) = setup();
        let outside = tempfile::tempdir().expect("outside");
        let target = outside.path().join("created.txt");
        std::os::unix::fs::symlink(&target, temp.path().join("evil")).expect("symlink");

        let tool = WriteFileTool::new(workspace, ToolLimits::default());
        let result = run(&tool, json!({"path": "evil", "content": "pwned"})).await;
        assert_eq!(code(&result), ErrorCode::PathOutsideWorkspace);
        assert!(!target.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn search_files_skips_links_leaving_workspace() {
        let (temp, workspace) = setup();
        let outside = tempfile::tempdir().expect("outside");
        fs::write(outside.path().join("secret.txt"), "TOPSECRET\n").expect("write");
        fs::write(temp.path().join("notes.txt"), "TOPSECRET copy\n").expect("write");
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), temp.path().join("link"))
            .expect("symlink");
        std::os::unix::fs::symlink(outside.path(), temp.path().join("dir_link"))
            .expect("symlink");

        let tool = SearchFilesTool::new(workspace, ToolLimits::default());
        let result = run(&tool, json!({"pattern": "TOPSECRET"})).await;
        assert_eq!(text(&result), "notes.txt:1: TOPSECRET copy");
    }
}
