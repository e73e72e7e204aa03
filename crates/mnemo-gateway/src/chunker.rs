//! Semantic text chunking for large memory submissions.
//!
//! Oversized text is split at paragraph boundaries first, then sentence
//! boundaries, then hard character positions, so no chunk's own content
//! exceeds the configured maximum. Each chunk after the first carries a
//! verbatim copy of the previous chunk's final characters as a prefix, which
//! preserves context across the boundary for downstream extraction.
//!
//! Sizes are measured in characters, never bytes; splitting is always safe
//! on multi-byte text.

use serde::{Deserialize, Serialize};

/// One chunk of a larger submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// The text to dispatch: overlap prefix (if any) plus this chunk's own
    /// content.
    pub text: String,
    /// Zero-based position within the run.
    pub index: usize,
    /// Total chunks in the run.
    pub total: usize,
    /// Characters of this chunk's own content, exclusive of the overlap
    /// prefix.
    pub size: usize,
    /// Whether `text` begins with a copy of the previous chunk's tail.
    pub has_overlap: bool,
}

/// Split `text` into chunks of at most `max_size` characters of content,
/// with exactly `overlap` characters of continuity between consecutive
/// chunks.
///
/// Text at or under the limit comes back as one chunk, untouched.
pub fn chunk_text(text: &str, max_size: usize, overlap: usize) -> Vec<Chunk> {
    let char_count = text.chars().count();
    if char_count <= max_size {
        return vec![Chunk {
            text: text.to_string(),
            index: 0,
            total: 1,
            size: char_count,
            has_overlap: false,
        }];
    }

    let pieces = split_pieces(text, max_size);
    let total = pieces.len();

    let mut chunks: Vec<Chunk> = Vec::with_capacity(total);
    for (index, piece) in pieces.into_iter().enumerate() {
        let size = piece.chars().count();
        let (text, has_overlap) = if index == 0 || overlap == 0 {
            (piece, false)
        } else {
            let prev_tail = tail_chars(&chunks[index - 1].text, overlap);
            (format!("{prev_tail}{piece}"), true)
        };
        chunks.push(Chunk {
            text,
            index,
            total,
            size,
            has_overlap,
        });
    }

    chunks
}

/// Split into content pieces of at most `max_size` characters, preferring
/// paragraph boundaries, then sentences, then hard character positions.
fn split_pieces(text: &str, max_size: usize) -> Vec<String> {
    let mut pieces: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    let mut flush = |current: &mut String, current_len: &mut usize, pieces: &mut Vec<String>| {
        if !current.trim().is_empty() {
            pieces.push(std::mem::take(current));
        } else {
            current.clear();
        }
        *current_len = 0;
    };

    for paragraph in text.split("\n\n").filter(|p| !p.trim().is_empty()) {
        let paragraph = paragraph.trim();
        let para_len = paragraph.chars().count();

        if para_len > max_size {
            // Oversized paragraph: emit what we have, then sentence-split it.
            flush(&mut current, &mut current_len, &mut pieces);
            for segment in split_oversized_paragraph(paragraph, max_size) {
                pieces.push(segment);
            }
            continue;
        }

        // +2 for the paragraph separator when the chunk is non-empty.
        let joined_len = if current_len == 0 {
            para_len
        } else {
            current_len + 2 + para_len
        };

        if joined_len > max_size {
            flush(&mut current, &mut current_len, &mut pieces);
            current.push_str(paragraph);
            current_len = para_len;
        } else {
            if current_len > 0 {
                current.push_str("\n\n");
            }
            current.push_str(paragraph);
            current_len = joined_len;
        }
    }

    flush(&mut current, &mut current_len, &mut pieces);
    pieces
}

fn split_oversized_paragraph(paragraph: &str, max_size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in split_sentences(paragraph) {
        let sentence_len = sentence.chars().count();

        if sentence_len > max_size {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            // A single unsplittable sentence: hard split by characters.
            pieces.extend(hard_split(&sentence, max_size));
            continue;
        }

        let joined_len = if current_len == 0 {
            sentence_len
        } else {
            current_len + 1 + sentence_len
        };

        if joined_len > max_size {
            pieces.push(std::mem::take(&mut current));
            current.push_str(&sentence);
            current_len = sentence_len;
        } else {
            if current_len > 0 {
                current.push(' ');
            }
            current.push_str(&sentence);
            current_len = joined_len;
        }
    }

    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Split on sentence terminators followed by whitespace.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            if chars.peek().map(|next| next.is_whitespace()).unwrap_or(true) {
                // Consume the separating whitespace.
                while chars.peek().map(|next| next.is_whitespace()).unwrap_or(false) {
                    chars.next();
                }
                sentences.push(std::mem::take(&mut current));
            }
        }
    }

    if !current.trim().is_empty() {
        sentences.push(current);
    }
    sentences
}

/// Hard split into pieces of exactly `max_size` characters (last one may be
/// shorter).
fn hard_split(text: &str, max_size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_size)
        .map(|piece| piece.iter().collect())
        .collect()
}

/// The last `n` characters of a string.
fn tail_chars(text: &str, n: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let start = chars.len().saturating_sub(n);
    chars[start..].iter().collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(count: usize, para_len: usize) -> String {
        (0..count)
            .map(|i| {
                let mut p = format!("Paragraph {i} ");
                while p.chars().count() < para_len {
                    p.push('x');
                }
                p
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn text_at_limit_is_single_chunk() {
        let text = "a".repeat(1000);
        let chunks = chunk_text(&text, 1000, 150);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].size, 1000);
        assert!(!chunks[0].has_overlap);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn text_over_limit_splits_in_two() {
        let text = "a".repeat(1001);
        let chunks = chunk_text(&text, 1000, 150);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].size, 1000);
        assert_eq!(chunks[1].size, 1);
        assert!(chunks[1].has_overlap);
    }

    #[test]
    fn five_thousand_chars_with_paragraphs_gives_five_chunks() {
        // 10 paragraphs of ~498 chars + separators ≈ 5000 characters; two
        // paragraphs pack into each 1000-char chunk.
        let text = paragraphs(10, 498);
        assert!(text.chars().count() >= 4990);

        let chunks = chunk_text(&text, 1000, 150);
        assert_eq!(chunks.len(), 5);

        assert!(!chunks[0].has_overlap);
        for chunk in &chunks[1..] {
            assert!(chunk.has_overlap);
        }
        for chunk in &chunks {
            assert!(chunk.size <= 1000);
        }
    }

    #[test]
    fn overlap_is_exactly_the_previous_tail() {
        let text = paragraphs(10, 498);
        let chunks = chunk_text(&text, 1000, 150);

        for pair in chunks.windows(2) {
            let prev_tail = tail_chars(&pair[0].text, 150);
            assert_eq!(prev_tail.chars().count(), 150);
            let next_head: String = pair[1].text.chars().take(150).collect();
            assert_eq!(prev_tail, next_head);
        }
    }

    #[test]
    fn chunks_share_nothing_without_overlap() {
        let text = paragraphs(4, 498);
        let chunks = chunk_text(&text, 1000, 0);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(!chunk.has_overlap);
        }
    }

    #[test]
    fn oversized_paragraph_splits_at_sentences() {
        let sentence = "This sentence is about thirty chars. ";
        let paragraph = sentence.repeat(10); // ~370 chars, one paragraph
        let chunks = chunk_text(&paragraph, 100, 10);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.size <= 100);
        }
        // Sentence boundaries respected: each chunk's own content ends with
        // a terminator.
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.text.trim_end().ends_with('.'));
        }
    }

    #[test]
    fn unsplittable_run_is_hard_split() {
        let text = "x".repeat(2500);
        let chunks = chunk_text(&text, 1000, 150);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].size, 1000);
        assert_eq!(chunks[1].size, 1000);
        assert_eq!(chunks[2].size, 500);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "é".repeat(1500);
        let chunks = chunk_text(&text, 1000, 150);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].size, 1000);
        assert_eq!(chunks[1].size, 500);
        // Would panic on a byte-boundary split; reaching here is the check.
        assert!(chunks[1].text.starts_with('é'));
    }

    #[test]
    fn indices_and_totals_are_consistent() {
        let text = paragraphs(10, 498);
        let chunks = chunk_text(&text, 1000, 150);
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.total, total);
        }
    }
}
