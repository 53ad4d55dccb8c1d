// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Throwaway memory roots for tests.

use std::path::{Path, PathBuf};

use memdex_config::MemdexConfig;
use tempfile::TempDir;

/// A temp directory with `memory/` and `sessions/` subdirectories and a
/// config pointing its database inside the directory.
///
/// Everything is deleted when the workspace is dropped.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    /// # Panics
    ///
    /// Panics if the temp directory can't be created.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        std::fs::create_dir_all(dir.path().join("memory")).expect("create memory dir");
        std::fs::create_dir_all(dir.path().join("sessions")).expect("create sessions dir");
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.root().join("memory")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.root().join("sessions")
    }

    pub fn database_path(&self) -> PathBuf {
        self.root().join("index.db")
    }

    /// Default config with the database inside the workspace and every
    /// search threshold relaxed so small test corpora always surface.
    pub fn config(&self) -> MemdexConfig {
        let mut config = MemdexConfig::default();
        config.storage.database_path = self.database_path().display().to_string();
        config.sources.memory_dirs = vec!["memory".to_string()];
        config.sources.sessions_dir = "sessions".to_string();
        config.search.min_score = 0.0;
        config
    }

    /// Write a memory document at `memory/<rel>`.
    pub fn write_memory(&self, rel: &str, text: &str) -> PathBuf {
        let path = self.memory_dir().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(&path, text).expect("write memory file");
        path
    }

    pub fn remove_memory(&self, rel: &str) {
        std::fs::remove_file(self.memory_dir().join(rel)).expect("remove memory file");
    }

    /// Write a transcript of `(role, content)` messages at `sessions/<key>.jsonl`.
    pub fn write_session(&self, key: &str, messages: &[(&str, &str)]) -> PathBuf {
        let lines: Vec<String> = messages
            .iter()
            .map(|(role, content)| {
                serde_json::json!({
                    "role": role,
                    "content": content,
                    "timestamp": "2026-01-01T00:00:00Z",
                })
                .to_string()
            })
            .collect();
        let path = self.sessions_dir().join(format!("{key}.jsonl"));
        std::fs::write(&path, lines.join("\n") + "\n").expect("write session file");
        path
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
