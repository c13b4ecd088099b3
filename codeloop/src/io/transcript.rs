//! Run transcripts persisted as JSON.
//!
//! Transcripts are product output and are written whenever requested,
//! independent of `RUST_LOG`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::types::AgentResult;

/// Write `result` as pretty JSON with a trailing newline, creating parents.
pub fn write_transcript(path: &Path, result: &AgentResult) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create transcript dir {}", parent.display()))?;
    }
    let mut buf = serde_json::to_string_pretty(result).context("serialize transcript")?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write transcript {}", path.display()))?;
    Ok(())
}

pub fn load_transcript(path: &Path) -> Result<AgentResult> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read transcript {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse transcript {}", path.display()))
}
