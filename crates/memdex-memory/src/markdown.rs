// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Markdown section boundaries.
//!
//! A section runs from one top-level heading to the line before the next.
//! Text before the first heading forms its own section.

use comrak::nodes::NodeValue;
use comrak::{Arena, Options, parse_document};

/// 1-based line numbers of the headings that are direct children of the document.
///
/// Headings nested in block quotes or list items do not start sections, and
/// `#` lines inside fenced code are not headings at all.
pub fn heading_lines(text: &str) -> Vec<usize> {
    let arena = Arena::new();
    let options = Options::default();
    let root = parse_document(&arena, text, &options);

    root.children()
        .filter_map(|node| {
            let ast = node.data.borrow();
            matches!(ast.value, NodeValue::Heading(_)).then_some(ast.sourcepos.start.line)
        })
        .collect()
}

/// Inclusive 1-based line spans of the sections of a document with `total_lines` lines.
///
/// A document without headings is a single section.
pub fn section_spans(text: &str, total_lines: usize) -> Vec<(usize, usize)> {
    if total_lines == 0 {
        return Vec::new();
    }

    let mut starts: Vec<usize> = heading_lines(text)
        .into_iter()
        .filter(|&line| line >= 1 && line <= total_lines)
        .collect();
    starts.dedup();
    if starts.first() != Some(&1) {
        starts.insert(0, 1);
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).map_or(total_lines, |next| next - 1);
            (start, end)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atx_and_setext_headings_are_found() {
        let text = "# One\nbody\n\nTwo\n---\nmore\n## Three\n";
        assert_eq!(heading_lines(text), vec![1, 4, 7]);
    }

    #[test]
    fn hash_lines_in_code_are_not_headings() {
        let text = "# Real\n```sh\n# comment in code\n```\n";
        assert_eq!(heading_lines(text), vec![1]);
    }

    #[test]
    fn preamble_becomes_first_section() {
        let text = "intro line\n\n# Heading\nbody\n";
        assert_eq!(section_spans(text, 4), vec![(1, 2), (3, 4)]);
    }

    #[test]
    fn sections_cover_all_lines() {
        let text = "# A\na\n# B\nb\nb\n# C\n";
        assert_eq!(section_spans(text, 6), vec![(1, 2), (3, 5), (6, 6)]);
    }

    #[test]
    fn no_headings_is_one_section() {
        let text = "just\nplain\ntext\n";
        assert_eq!(section_spans(text, 3), vec![(1, 3)]);
        assert!(section_spans("", 0).is_empty());
    }
}
