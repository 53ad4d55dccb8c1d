// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! BM25 keyword search over the store's FTS5 index.

use std::collections::HashSet;

use memdex_core::MemdexError;
use memdex_storage::IndexStore;

/// Turn free text into a safe FTS5 match expression.
///
/// Every alphanumeric run becomes a double-quoted term; terms are OR-ed so a
/// chunk matching any of them is a candidate and BM25 ranks by how many and
/// how rare. Repeated terms (case-insensitively) are kept once. Returns `None`
/// when the query holds no searchable term.
pub fn build_match_expression(query: &str) -> Option<String> {
    let mut seen = HashSet::new();
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .filter(|term| seen.insert(term.to_lowercase()))
        .map(|term| format!("\"{term}\""))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

/// Ranked full-text lookup producing higher-is-better scores.
#[derive(Clone)]
pub struct LexicalSearch {
    store: IndexStore,
}

impl LexicalSearch {
    pub fn new(store: IndexStore) -> Self {
        Self { store }
    }

    /// Up to `limit` `(chunk_id, score)` pairs, best first.
    ///
    /// The score is the negated BM25 cost, floored at zero.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<(i64, f32)>, MemdexError> {
        let Some(expr) = build_match_expression(query) else {
            return Ok(Vec::new());
        };
        let hits = self.store.search_fts(&expr, limit, &[]).await?;
        Ok(hits
            .into_iter()
            .map(|(id, bm25)| (id, (-bm25).max(0.0) as f32))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memdex_core::SourceKind;
    use memdex_storage::{FileMeta, NewChunk};

    #[test]
    fn expression_quotes_and_ors_terms() {
        assert_eq!(
            build_match_expression("deploy the service").as_deref(),
            Some("\"deploy\" OR \"the\" OR \"service\"")
        );
    }

    #[test]
    fn operators_and_punctuation_are_neutralized() {
        assert_eq!(
            build_match_expression("NOT (a* OR \"b\") -c:d").as_deref(),
            Some("\"NOT\" OR \"a\" OR \"OR\" OR \"b\" OR \"c\" OR \"d\"")
        );
        assert_eq!(build_match_expression("?? -- **"), None);
        assert_eq!(build_match_expression(""), None);
    }

    #[test]
    fn repeated_terms_are_collapsed() {
        assert_eq!(
            build_match_expression("Deploy deploy DEPLOY now").as_deref(),
            Some("\"Deploy\" OR \"now\"")
        );
    }

    #[test]
    fn unicode_terms_survive() {
        assert_eq!(
            build_match_expression("café über").as_deref(),
            Some("\"café\" OR \"über\"")
        );
    }

    #[tokio::test]
    async fn scores_are_positive_and_ranked() {
        let store = IndexStore::open_in_memory().await.unwrap();
        let chunks = ["rust async runtime", "rust rust rust", "python scripting"]
            .iter()
            .enumerate()
            .map(|(i, t)| NewChunk {
                start_line: i + 1,
                end_line: i + 1,
                hash: format!("h{i}"),
                text: t.to_string(),
            })
            .collect();
        let ids = store
            .replace_file(
                FileMeta {
                    path: "l.md".into(),
                    source: SourceKind::Memory,
                    hash: "h".into(),
                    size: 1,
                    mtime: 1,
                },
                chunks,
            )
            .await
            .unwrap()
            .inserted;

        let lexical = LexicalSearch::new(store);
        let hits = lexical.search("rust", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, ids[1]);
        assert!(hits[0].1 >= hits[1].1);
        assert!(hits.iter().all(|(_, s)| *s >= 0.0));

        assert!(lexical.search("!!!", 10).await.unwrap().is_empty());
        assert!(lexical.search("golang", 10).await.unwrap().is_empty());
    }
}
