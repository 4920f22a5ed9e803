//! Line-bounded chunking under a token budget
//!
//! Files are packaged for the LLM by greedily accumulating whole lines until
//! the next line would push the estimate over `max_tokens`. Lines are never
//! split, reordered or dropped; a line that alone exceeds the budget becomes
//! its own oversized chunk.
//!
//! The token estimate is a cheap deterministic proxy, not a tokenizer:
//!
//! ```text
//! blank line      -> 0
//! otherwise       -> max(ceil(words * 4 / 3), ceil(chars / 4))
//! ```

use crate::models::{Chunk, SourceUnit};
use tracing::debug;

/// Estimated tokens for a single line.
pub fn estimate_line_tokens(line: &str) -> usize {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return 0;
    }
    let words = trimmed.split_whitespace().count();
    let chars = line.trim_end_matches(&['\r', '\n'][..]).chars().count();
    (words * 4).div_ceil(3).max(chars.div_ceil(4))
}

/// Estimated tokens for a block of text (sum of its lines).
pub fn estimate_tokens(text: &str) -> usize {
    text.split_inclusive('\n').map(estimate_line_tokens).sum()
}

/// Split a source unit into ordered chunks bounded by `max_tokens`.
pub fn chunk(source: &SourceUnit, max_tokens: usize) -> Vec<Chunk> {
    let source_path = source.key();
    let mut chunks: Vec<Chunk> = Vec::new();

    let mut buf = String::new();
    let mut buf_tokens = 0usize;
    let mut buf_lines = 0u32;
    let mut start_line = 1u32;

    for (idx, line) in source.full_text.split_inclusive('\n').enumerate() {
        let line_no = idx as u32 + 1;
        let tokens = estimate_line_tokens(line);

        if buf_lines > 0 && buf_tokens + tokens > max_tokens {
            chunks.push(make_chunk(
                &source_path,
                start_line,
                std::mem::take(&mut buf),
                buf_lines,
                buf_tokens,
                chunks.len(),
                max_tokens,
            ));
            buf_tokens = 0;
            buf_lines = 0;
            start_line = line_no;
        }

        buf.push_str(line);
        buf_tokens += tokens;
        buf_lines += 1;
    }

    if buf_lines > 0 {
        chunks.push(make_chunk(
            &source_path,
            start_line,
            buf,
            buf_lines,
            buf_tokens,
            chunks.len(),
            max_tokens,
        ));
    }

    debug!(
        "Chunked {} ({} lines) into {} chunk(s)",
        source_path,
        source.total_lines,
        chunks.len()
    );
    chunks
}

fn make_chunk(
    source_path: &str,
    start_line: u32,
    text: String,
    lines: u32,
    tokens: usize,
    sequence_index: usize,
    max_tokens: usize,
) -> Chunk {
    let oversized = tokens > max_tokens;
    if oversized {
        debug!(
            "{}:{} exceeds the token budget on its own ({} > {}), emitting oversized",
            source_path, start_line, tokens, max_tokens
        );
    }
    let trivial = text.trim().is_empty();
    Chunk {
        source_path: source_path.to_string(),
        start_line,
        end_line: start_line + lines - 1,
        text,
        sequence_index,
        estimated_tokens: tokens,
        oversized,
        trivial,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(text: &str) -> SourceUnit {
        SourceUnit::new("src/Foo.java", text)
    }

    fn sample_texts() -> Vec<String> {
        let mut texts = vec![
            "class Foo {\n    int x = 42;\n}\n".to_string(),
            "no trailing newline\nsecond line".to_string(),
            "a\n\n\nb\n\n".to_string(),
            "crlf line one\r\ncrlf line two\r\n".to_string(),
        ];
        let mut long = String::new();
        for i in 0..200 {
            long.push_str(&format!("    let value_{i} = compute({i}, \"label {i}\");\n"));
            if i % 17 == 0 {
                long.push('\n');
            }
        }
        texts.push(long);
        texts.push(format!("short\n{}\nshort again\n", "tok ".repeat(500)));
        texts
    }

    #[test]
    fn test_estimate_is_deterministic_and_monotone() {
        assert_eq!(estimate_line_tokens(""), 0);
        assert_eq!(estimate_line_tokens("   \n"), 0);
        assert_eq!(estimate_line_tokens("abc"), 2);
        assert!(estimate_tokens("fn a() {}\nfn b() {}\n") >= estimate_tokens("fn a() {}\n"));
        assert_eq!(estimate_tokens("x y z\n"), estimate_tokens("x y z\n"));
    }

    #[test]
    fn test_chunks_cover_file_in_order() {
        for text in sample_texts() {
            for budget in [1, 5, 20, 80, 10_000] {
                let source = unit(&text);
                let chunks = chunk(&source, budget);

                let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
                assert_eq!(joined, text, "budget {budget}");

                let mut expected_start = 1;
                for (i, c) in chunks.iter().enumerate() {
                    assert_eq!(c.sequence_index, i);
                    assert_eq!(c.start_line, expected_start);
                    assert!(c.end_line >= c.start_line);
                    assert_eq!(c.text.split_inclusive('\n').count() as u32, c.line_count());
                    expected_start = c.end_line + 1;
                }
                assert_eq!(expected_start as usize - 1, source.total_lines);
            }
        }
    }

    #[test]
    fn test_chunks_respect_budget_except_single_oversized_lines() {
        for text in sample_texts() {
            for budget in [1, 5, 20, 80] {
                for c in chunk(&unit(&text), budget) {
                    assert_eq!(c.estimated_tokens, estimate_tokens(&c.text));
                    if c.estimated_tokens > budget {
                        assert!(c.oversized);
                        let non_blank = c
                            .text
                            .split_inclusive('\n')
                            .filter(|l| !l.trim().is_empty())
                            .count();
                        assert_eq!(non_blank, 1, "oversized chunk must hold one real line");
                    } else {
                        assert!(!c.oversized);
                    }
                }
            }
        }
    }

    #[test]
    fn test_oversized_line_is_emitted_alone() {
        let text = format!("short\n{}\nshort again\n", "tok ".repeat(500));
        let chunks = chunk(&unit(&text), 50);
        assert_eq!(chunks.len(), 3);
        assert!(chunks[1].oversized);
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (2, 2));
        assert!(chunks[1].text.starts_with("tok tok"));
    }

    #[test]
    fn test_empty_file_yields_no_chunks() {
        assert!(chunk(&unit(""), 100).is_empty());
    }

    #[test]
    fn test_whitespace_file_yields_one_trivial_chunk() {
        let chunks = chunk(&unit("\n   \n\t\n"), 1);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].trivial);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 3));
    }

    #[test]
    fn test_large_budget_keeps_file_whole() {
        let text = "def a():\n    return 1\n\ndef b():\n    return 2\n";
        let chunks = chunk(&unit(text), 120_000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source_path, "src/Foo.java");
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 5));
    }
}
