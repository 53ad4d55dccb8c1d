// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token counting with the `cl100k_base` BPE.

use std::sync::{Arc, OnceLock};

use memdex_core::MemdexError;
use tiktoken_rs::CoreBPE;

static CL100K: OnceLock<Arc<CoreBPE>> = OnceLock::new();

/// Counts tokens the way the chunker budgets them.
///
/// The BPE tables are loaded once per process and shared by every clone.
#[derive(Clone)]
pub struct Tokenizer {
    bpe: Arc<CoreBPE>,
}

impl Tokenizer {
    /// The `cl100k_base` encoding.
    pub fn cl100k() -> Result<Self, MemdexError> {
        if let Some(bpe) = CL100K.get() {
            return Ok(Self { bpe: bpe.clone() });
        }
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| MemdexError::Internal(format!("failed to load cl100k_base: {e}")))?;
        let bpe = CL100K.get_or_init(|| Arc::new(bpe));
        Ok(Self { bpe: bpe.clone() })
    }

    /// Number of tokens in `text`, treating special-token text as ordinary.
    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_ordinary(text).len()
    }
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer").field("encoding", &"cl100k_base").finish()
    }
}
