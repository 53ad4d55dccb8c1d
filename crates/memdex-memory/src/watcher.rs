// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filesystem watcher that flags the index as needing a sync.
//!
//! The watcher never syncs by itself; the owner decides when to run one.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use memdex_core::MemdexError;
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, DebouncedEvent, Debouncer, new_debouncer};
use tracing::{debug, error, warn};

/// Keeps the debouncer alive; dropping it stops watching.
pub struct SourceWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    watched: Vec<PathBuf>,
}

impl std::fmt::Debug for SourceWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceWatcher")
            .field("watched", &self.watched)
            .finish_non_exhaustive()
    }
}

impl SourceWatcher {
    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }
}

/// Watch `dirs` recursively and set `dirty` on every relevant change.
///
/// Directories that don't exist yet are skipped with a warning.
pub fn spawn_watcher(
    dirs: &[PathBuf],
    debounce: Duration,
    dirty: Arc<AtomicBool>,
) -> Result<SourceWatcher, MemdexError> {
    let flag = dirty.clone();
    let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
        handle_events(result, &flag);
    })
    .map_err(|e| MemdexError::Internal(format!("failed to create file watcher: {e}")))?;

    let mut watched = Vec::new();
    for dir in dirs {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "not watching missing directory");
            continue;
        }
        debouncer
            .watcher()
            .watch(dir, RecursiveMode::Recursive)
            .map_err(|e| {
                MemdexError::Internal(format!("failed to watch {}: {e}", dir.display()))
            })?;
        debug!(dir = %dir.display(), "watching for changes");
        watched.push(dir.clone());
    }

    Ok(SourceWatcher {
        _debouncer: debouncer,
        watched,
    })
}

fn handle_events(result: DebounceEventResult, dirty: &AtomicBool) {
    match result {
        Ok(events) => {
            if events.iter().any(is_relevant) {
                debug!(events = events.len(), "source change detected, index marked dirty");
                dirty.store(true, Ordering::SeqCst);
            }
        }
        Err(e) => error!(error = %e, "file watch error"),
    }
}

/// Changes to hidden files (editor swap files, `.git`) are ignored.
fn is_relevant(event: &DebouncedEvent) -> bool {
    !is_hidden_path(&event.path)
}

fn is_hidden_path(path: &Path) -> bool {
    let hidden_name = path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'));
    hidden_name || path.components().any(|c| c.as_os_str() == ".git")
}
