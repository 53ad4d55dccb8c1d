// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token-bounded, line-aligned chunking with overlap.
//!
//! Markdown documents are first split into heading sections; each section is
//! then packed line by line into chunks of at most `max_tokens` tokens. When
//! a chunk is cut, the next one starts with an overlap window made of whole
//! trailing lines of the previous chunk. Finally, chunks under `min_tokens`
//! are folded into their successor when the result still fits.
//!
//! A single line longer than `max_tokens` is never split and is emitted as a
//! chunk on its own.

use memdex_config::ChunkingConfig;
use memdex_core::MemdexError;
use memdex_storage::NewChunk;

use crate::markdown;
use crate::tokenizer::Tokenizer;

/// A chunk of a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    /// First source line, 1-based.
    pub start_line: usize,
    /// Last source line, inclusive.
    pub end_line: usize,
    pub token_count: usize,
    /// blake3 hex digest of `text`.
    pub hash: String,
}

impl From<TextChunk> for NewChunk {
    fn from(chunk: TextChunk) -> Self {
        NewChunk {
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            hash: chunk.hash,
            text: chunk.text,
        }
    }
}

/// Content hash used for chunks and embedding cache keys.
pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// Whether a path or file name should be chunked by markdown sections.
pub fn is_markdown(source_hint: &str) -> bool {
    let hint = source_hint.to_ascii_lowercase();
    hint.ends_with(".md") || hint.ends_with(".markdown")
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    number: usize,
    text: &'a str,
    /// Tokens of the line plus one for its newline.
    cost: usize,
}

/// Splits documents into [`TextChunk`]s. Deterministic for a given config.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
    tokenizer: Tokenizer,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self, MemdexError> {
        Ok(Self::with_tokenizer(config, Tokenizer::cl100k()?))
    }

    pub fn with_tokenizer(config: ChunkingConfig, tokenizer: Tokenizer) -> Self {
        Self { config, tokenizer }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Chunk `text`. `source_hint` is the file name or path, used to decide
    /// whether markdown sectioning applies.
    pub fn chunk(&self, text: &str, source_hint: &str) -> Vec<TextChunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let lines: Vec<&str> = text.lines().collect();
        let spans = if self.config.markdown_aware && is_markdown(source_hint) {
            markdown::section_spans(text, lines.len())
        } else {
            vec![(1, lines.len())]
        };

        let mut chunks = Vec::new();
        for (start, end) in spans {
            self.chunk_span(&lines, start, end, &mut chunks);
        }
        self.merge_small(chunks)
    }

    fn chunk_span(&self, lines: &[&str], start: usize, end: usize, out: &mut Vec<TextChunk>) {
        let max = self.config.max_tokens.max(1);
        let mut buffer: Vec<Line<'_>> = Vec::new();
        let mut buffered = 0;

        for number in start..=end {
            let text = lines[number - 1];
            let line = Line {
                number,
                text,
                cost: self.tokenizer.count(text) + 1,
            };

            if !buffer.is_empty() && buffered + line.cost > max {
                self.emit(&buffer, out);
                buffer = self.overlap_window(&buffer, line.cost, max);
                buffered = buffer.iter().map(|l| l.cost).sum();
            }
            buffered += line.cost;
            buffer.push(line);
        }

        if !buffer.is_empty() {
            self.emit(&buffer, out);
        }
    }

    /// Trailing whole lines of `emitted` worth at least `overlap_tokens`,
    /// never the entire buffer, shrunk from the front until `next_cost` fits.
    fn overlap_window<'a>(&self, emitted: &[Line<'a>], next_cost: usize, max: usize) -> Vec<Line<'a>> {
        let target = self.config.overlap_tokens;
        if target == 0 || emitted.len() < 2 {
            return Vec::new();
        }

        let mut taken = 0;
        let mut tokens = 0;
        for line in emitted.iter().rev().take(emitted.len() - 1) {
            if tokens >= target {
                break;
            }
            tokens += line.cost;
            taken += 1;
        }

        let mut window = emitted[emitted.len() - taken..].to_vec();
        while !window.is_empty() && tokens + next_cost > max {
            tokens -= window.remove(0).cost;
        }
        window
    }

    fn emit(&self, buffer: &[Line<'_>], out: &mut Vec<TextChunk>) {
        let (Some(first), Some(last)) = (buffer.first(), buffer.last()) else {
            return;
        };
        let joined = buffer.iter().map(|l| l.text).collect::<Vec<_>>().join("\n");
        let text = joined.trim_end();
        if text.trim().is_empty() {
            return;
        }
        out.push(self.make_chunk(text.to_string(), first.number, last.number));
    }

    fn make_chunk(&self, text: String, start_line: usize, end_line: usize) -> TextChunk {
        TextChunk {
            token_count: self.tokenizer.count(&text),
            hash: content_hash(&text),
            text,
            start_line,
            end_line,
        }
    }

    /// Fold chunks under `min_tokens` into the following chunk while the
    /// combined text stays within `max_tokens`.
    fn merge_small(&self, chunks: Vec<TextChunk>) -> Vec<TextChunk> {
        let min = self.config.min_tokens;
        let max = self.config.max_tokens.max(1);
        let mut out = Vec::with_capacity(chunks.len());
        let mut pending: Option<TextChunk> = None;

        for chunk in chunks {
            let next = match pending.take() {
                None => chunk,
                Some(small) => {
                    let joined = format!("{}\n\n{}", small.text, chunk.text);
                    if self.tokenizer.count(&joined) <= max {
                        self.make_chunk(joined, small.start_line, chunk.end_line)
                    } else {
                        out.push(small);
                        chunk
                    }
                }
            };
            if next.token_count < min {
                pending = Some(next);
            } else {
                out.push(next);
            }
        }

        if let Some(small) = pending {
            out.push(small);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chunker(max: usize, overlap: usize, min: usize) -> Chunker {
        Chunker::new(ChunkingConfig {
            max_tokens: max,
            overlap_tokens: overlap,
            min_tokens: min,
            markdown_aware: true,
        })
        .unwrap()
    }

    #[test]
    fn empty_and_blank_input_produce_nothing() {
        let c = chunker(64, 8, 0);
        assert!(c.chunk("", "a.md").is_empty());
        assert!(c.chunk("   \n\n\t\n", "a.md").is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let c = chunker(512, 50, 0);
        let chunks = c.chunk("first line\nsecond line\n", "notes.txt");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "first line\nsecond line");
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 2));
        assert_eq!(chunks[0].hash, content_hash("first line\nsecond line"));
    }

    #[test]
    fn markdown_sections_are_chunked_separately() {
        let c = chunker(512, 0, 0);
        let text = "intro\n# Alpha\nalpha body\n# Beta\nbeta body\n";
        let chunks = c.chunk(text, "doc.md");
        let spans: Vec<(usize, usize)> = chunks.iter().map(|c| (c.start_line, c.end_line)).collect();
        assert_eq!(spans, vec![(1, 1), (2, 3), (4, 5)]);

        // The same text as plain text stays whole.
        assert_eq!(c.chunk(text, "doc.txt").len(), 1);
    }

    #[test]
    fn markdown_sectioning_can_be_disabled() {
        let c = Chunker::new(ChunkingConfig {
            max_tokens: 512,
            overlap_tokens: 0,
            min_tokens: 0,
            markdown_aware: false,
        })
        .unwrap();
        assert_eq!(c.chunk("# A\na\n# B\nb\n", "doc.md").len(), 1);
    }

    #[test]
    fn twelve_hundred_token_document_makes_three_chunks() {
        let c = chunker(512, 50, 32);
        let tok = c.tokenizer().clone();

        let mut lines = vec!["# Deployment notes".to_string()];
        let mut i = 0;
        while tok.count(&lines.join("\n")) < 1200 {
            lines.push(format!("step {i} of the rollout touches service number {i} today"));
            i += 1;
        }
        let doc = lines.join("\n");

        let chunks = c.chunk(&doc, "notes.md");
        assert_eq!(chunks.len(), 3, "spans: {:?}", chunks.iter().map(|c| (c.start_line, c.end_line)).collect::<Vec<_>>());

        // Chunk 2 opens with the tail lines of chunk 1.
        assert!(chunks[1].start_line <= chunks[0].end_line);
        let overlap = lines[chunks[1].start_line - 1..chunks[0].end_line].join("\n");
        assert!(chunks[0].text.ends_with(&overlap));
        assert!(chunks[1].text.starts_with(&overlap));
        let overlap_tokens = tok.count(&overlap);
        assert!(
            (40..=70).contains(&overlap_tokens),
            "overlap was {overlap_tokens} tokens"
        );
        for chunk in &chunks {
            assert!(chunk.token_count <= 512);
        }
    }

    #[test]
    fn oversized_single_line_is_emitted_alone() {
        let c = chunker(16, 4, 0);
        let huge = (0..80).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let text = format!("short before\n{huge}\nshort after");
        let chunks = c.chunk(&text, "big.txt");

        let big = chunks.iter().find(|c| c.text == huge).expect("huge line chunk");
        assert_eq!(big.start_line, 2);
        assert_eq!(big.end_line, 2);
        assert!(big.token_count > 16);
        assert_eq!(chunks.last().unwrap().end_line, 3);
    }

    #[test]
    fn small_chunks_merge_into_successor() {
        let c = chunker(512, 0, 8);
        let text = "# A\nx\n# B\nthis section has enough words to stand on its own easily\n";
        let chunks = c.chunk(text, "doc.md");
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 4));
        assert!(chunks[0].text.starts_with("# A\nx\n\n# B"));
    }

    #[test]
    fn trailing_small_chunk_is_kept() {
        let c = chunker(512, 0, 8);
        let text = "# A\nthis section has enough words to stand on its own easily\n# B\nx\n";
        let chunks = c.chunk(text, "doc.md");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text, "# B\nx");
    }

    #[test]
    fn blank_lines_between_content_are_not_chunks() {
        let c = chunker(512, 0, 0);
        let text = "# A\n\n\n\n# B\nb\n";
        let chunks = c.chunk(text, "doc.md");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "# A");
    }

    #[test]
    fn markdown_detection_by_extension() {
        assert!(is_markdown("memory/NOTES.MD"));
        assert!(is_markdown("a.markdown"));
        assert!(!is_markdown("session.jsonl"));
        assert!(!is_markdown("readme.txt"));
    }

    #[test]
    fn chunks_convert_into_store_rows() {
        let c = chunker(512, 0, 0);
        let chunk = c.chunk("alpha\nbeta", "a.txt").remove(0);
        let row: NewChunk = chunk.clone().into();
        assert_eq!(row.text, chunk.text);
        assert_eq!(row.hash, chunk.hash);
        assert_eq!((row.start_line, row.end_line), (1, 2));
    }

    fn word_lines() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(
            prop::collection::vec("[a-z]{1,8}", 1..12).prop_map(|words| words.join(" ")),
            1..60,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn spans_are_ordered_contiguous_and_covering(
            lines in word_lines(),
            max in 16usize..128,
            overlap in 0usize..12,
        ) {
            let c = chunker(max, overlap.min(max - 1), 0);
            let text = lines.join("\n");
            let chunks = c.chunk(&text, "doc.txt");

            prop_assert!(!chunks.is_empty());
            prop_assert_eq!(chunks[0].start_line, 1);
            prop_assert_eq!(chunks.last().unwrap().end_line, lines.len());
            for pair in chunks.windows(2) {
                prop_assert!(pair[1].start_line > pair[0].start_line);
                prop_assert!(pair[1].start_line <= pair[0].end_line + 1);
                prop_assert!(pair[1].end_line > pair[0].end_line);
            }
            for chunk in &chunks {
                prop_assert!(chunk.start_line <= chunk.end_line);
                prop_assert!(
                    chunk.token_count <= max || chunk.start_line == chunk.end_line,
                    "chunk of {} tokens over {}", chunk.token_count, max
                );
                let source = lines[chunk.start_line - 1..chunk.end_line].join("\n");
                prop_assert_eq!(&chunk.text, &source);
            }
        }

        #[test]
        fn chunking_is_deterministic(lines in word_lines(), max in 16usize..128) {
            let c = chunker(max, 4.min(max - 1), 8.min(max));
            let text = lines.join("\n");
            let first = c.chunk(&text, "doc.md");
            let second = c.chunk(&text, "doc.md");
            prop_assert_eq!(first, second);
        }
    }
}
