// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session transcripts stored as one JSONL file per session.
//!
//! Each line is a [`TranscriptEntry`]. Before indexing, a transcript is
//! flattened into plain `Role: content` lines.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use memdex_core::MemdexError;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// File extension of transcript files.
pub const TRANSCRIPT_EXTENSION: &str = "jsonl";

const MAX_KEY_LEN: usize = 128;

/// A tool invocation recorded alongside a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// One message of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl TranscriptEntry {
    /// A message stamped with the current time.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: Utc::now(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.tool_calls.push(call);
        self
    }
}

/// Map an arbitrary session key onto a safe file stem.
///
/// ASCII letters, digits, `-`, `_` and `.` are kept; everything else becomes
/// `_`. Leading dots are dropped so keys can't produce hidden files or `..`.
pub fn sanitize_session_key(key: &str) -> String {
    let cleaned: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_KEY_LEN)
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "session".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Parse JSONL transcript text. Malformed lines are skipped.
pub fn parse_transcript(text: &str) -> Vec<TranscriptEntry> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(i, line)| match serde_json::from_str(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(line = i + 1, error = %e, "skipping malformed transcript line");
                None
            }
        })
        .collect()
}

fn capitalize(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Unknown".to_string(),
    }
}

/// Flatten entries into indexable text, one `Role: content` block per message
/// followed by `[tool name] arguments → output` lines for its tool calls.
pub fn flatten_transcript(entries: &[TranscriptEntry]) -> String {
    let mut lines = Vec::new();
    for entry in entries {
        let content = entry.content.trim();
        if !content.is_empty() {
            lines.push(format!("{}: {content}", capitalize(&entry.role)));
        }
        for call in &entry.tool_calls {
            let args = match &call.arguments {
                serde_json::Value::Null => String::new(),
                value => value.to_string(),
            };
            let mut line = format!("[tool {}] {args}", call.name);
            if let Some(output) = call.output.as_deref() {
                line.push_str(" → ");
                line.push_str(output.trim());
            }
            lines.push(line.trim_end().to_string());
        }
    }
    lines.join("\n")
}

/// Reads and writes session transcripts under one directory.
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    dir: PathBuf,
}

impl TranscriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file a session's transcript lives in.
    pub fn session_path(&self, session_key: &str) -> PathBuf {
        self.dir.join(format!(
            "{}.{TRANSCRIPT_EXTENSION}",
            sanitize_session_key(session_key)
        ))
    }

    /// Append one entry, creating the directory and file as needed.
    pub async fn append(&self, session_key: &str, entry: &TranscriptEntry) -> Result<(), MemdexError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| MemdexError::io(&self.dir, e))?;

        let path = self.session_path(session_key);
        let mut line = serde_json::to_string(entry)
            .map_err(|e| MemdexError::Internal(format!("failed to serialize transcript entry: {e}")))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| MemdexError::io(&path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| MemdexError::io(&path, e))?;
        file.flush().await.map_err(|e| MemdexError::io(&path, e))?;

        debug!(session = session_key, path = %path.display(), "transcript entry appended");
        Ok(())
    }

    /// All entries of a session. An unknown session has no entries.
    pub async fn load(&self, session_key: &str) -> Result<Vec<TranscriptEntry>, MemdexError> {
        let path = self.session_path(session_key);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(parse_transcript(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(MemdexError::io(&path, e)),
        }
    }

    /// Session keys (file stems) present on disk, sorted.
    pub async fn list_sessions(&self) -> Result<Vec<String>, MemdexError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MemdexError::io(&self.dir, e)),
        };

        let mut sessions = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| MemdexError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(TRANSCRIPT_EXTENSION)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                sessions.push(stem.to_string());
            }
        }
        sessions.sort();
        Ok(sessions)
    }

    /// Delete a session's transcript. Returns whether a file was removed.
    pub async fn delete(&self, session_key: &str) -> Result<bool, MemdexError> {
        let path = self.session_path(session_key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MemdexError::io(&path, e)),
        }
    }
}
