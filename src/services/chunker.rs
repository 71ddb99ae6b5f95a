//! Text chunking strategies for ingestion.

use regex::Regex;

use crate::error::ChunkError;
use crate::models::{Chunk, ChunkingStrategy};
use crate::utils::has_meaningful_content;

/// Splits document text into overlapping chunks under one of two strategies.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum chunk size in characters
    chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    chunk_overlap: usize,
    strategy: ChunkingStrategy,
}

impl TextChunker {
    pub fn new(
        chunk_size: u32,
        chunk_overlap: u32,
        strategy: ChunkingStrategy,
    ) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::InvalidConfiguration(
                "chunk_size must be positive".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkError::InvalidConfiguration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size: chunk_size as usize,
            chunk_overlap: chunk_overlap as usize,
            strategy,
        })
    }

    pub fn strategy(&self) -> ChunkingStrategy {
        self.strategy
    }

    /// Chunk the text. Empty input produces an empty result.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        match self.strategy {
            ChunkingStrategy::Characters => self.chunk_by_characters(text),
            ChunkingStrategy::Sentences => self.chunk_by_sentences(text),
        }
    }

    /// Fixed window of `chunk_size` chars advancing by
    /// `chunk_size - chunk_overlap`. May split mid-word; uniform size wins.
    fn chunk_by_characters(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();
        let step = self.chunk_size - self.chunk_overlap;

        let mut chunks = Vec::new();
        let mut chunk_index = 0u32;
        let mut start = 0;

        while start < total_chars {
            let end = (start + self.chunk_size).min(total_chars);
            let chunk_text: String = chars[start..end].iter().collect();

            // Whitespace-only windows are skipped, not emitted
            if has_meaningful_content(&chunk_text) {
                chunks.push(Chunk {
                    text: chunk_text,
                    chunk_index,
                    start_char: start,
                    end_char: end,
                    char_count: end - start,
                });
                chunk_index += 1;
            }

            start += step;
        }

        chunks
    }

    /// Greedy sentence accumulation up to `chunk_size`, re-including the
    /// previous chunk's trailing `chunk_overlap` chars. A single sentence
    /// longer than `chunk_size` is emitted as its own oversized chunk.
    fn chunk_by_sentences(&self, text: &str) -> Vec<Chunk> {
        let sentences = split_sentences(text);

        if sentences.is_empty() {
            // Nothing sentence-shaped to work with
            return self.chunk_by_characters(text);
        }

        let mut chunks = Vec::new();
        let mut chunk_index = 0u32;
        let mut current = String::new();
        // Position in the normalized sentence stream (sentences joined by
        // single spaces); sentence-strategy offsets are approximate by
        // construction.
        let mut stream_pos = 0usize;

        for sentence in &sentences {
            let sentence_len = sentence.chars().count();
            let current_len = current.chars().count();

            if !current.is_empty() && current_len + sentence_len + 1 > self.chunk_size {
                push_sentence_chunk(&mut chunks, &mut chunk_index, &current, stream_pos);

                if self.chunk_overlap > 0 && current_len > self.chunk_overlap {
                    let overlap = overlap_tail(&current, self.chunk_overlap);
                    current = format!("{} {}", overlap, sentence);
                } else {
                    current = sentence.clone();
                }
            } else if current.is_empty() {
                current = sentence.clone();
            } else {
                current.push(' ');
                current.push_str(sentence);
            }

            stream_pos += sentence_len + 1;
        }

        if has_meaningful_content(&current) {
            push_sentence_chunk(&mut chunks, &mut chunk_index, &current, stream_pos);
        }

        chunks
    }
}

fn push_sentence_chunk(chunks: &mut Vec<Chunk>, chunk_index: &mut u32, text: &str, end: usize) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    let char_count = trimmed.chars().count();
    chunks.push(Chunk {
        text: trimmed.to_string(),
        chunk_index: *chunk_index,
        start_char: end.saturating_sub(char_count),
        end_char: end,
        char_count,
    });
    *chunk_index += 1;
}

/// Trailing `max_chars` of `text`, snapped forward to a whitespace boundary
/// so the overlap never starts mid-word.
fn overlap_tail(text: &str, max_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let from = chars.len().saturating_sub(max_chars);
    let tail = &chars[from..];

    match tail.iter().position(|c| c.is_whitespace()) {
        Some(pos) if pos + 1 < tail.len() => tail[pos + 1..].iter().collect(),
        _ => tail.iter().collect(),
    }
}

/// Sentence boundary rule: `.`, `!` or `?` followed by whitespace.
fn split_sentences(text: &str) -> Vec<String> {
    // The regex crate has no lookbehind; match the boundary and split just
    // after the terminator instead.
    let boundary = Regex::new(r"[.!?]\s+").expect("static regex");

    let mut sentences = Vec::new();
    let mut last = 0;

    for m in boundary.find_iter(text) {
        // Keep the terminator with the sentence, drop the whitespace.
        let end = m.start() + 1;
        let sentence = text[last..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence.to_string());
        }
        last = m.end();
    }

    let rest = text[last..].trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    const FABLE: &str = "A Fox one day spied a beautiful bunch of ripe grapes hanging from a vine. \
        The grapes seemed ready to burst with juice, and the Fox's mouth watered. \
        The bunch hung from a high branch, and the Fox had to jump for it. \
        Again and again he tried, but in vain. \
        Moral: It is easy to despise what you cannot get.";

    #[test]
    fn test_rejects_overlap_ge_size() {
        assert!(TextChunker::new(100, 100, ChunkingStrategy::Characters).is_err());
        assert!(TextChunker::new(100, 150, ChunkingStrategy::Sentences).is_err());
        assert!(TextChunker::new(0, 0, ChunkingStrategy::Characters).is_err());
    }

    #[test]
    fn test_empty_input() {
        let chunker = TextChunker::new(500, 50, ChunkingStrategy::Sentences).unwrap();
        assert!(chunker.chunk("").is_empty());
    }

    #[test]
    fn test_character_chunks_cover_document() {
        let chunker = TextChunker::new(100, 20, ChunkingStrategy::Characters).unwrap();
        let text: String = "The quick brown fox jumps over the lazy dog. ".repeat(12);
        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 1);

        // Rebuild the document from chunk offsets; every position covered.
        let total = text.chars().count();
        let mut rebuilt: Vec<Option<char>> = vec![None; total];
        for chunk in &chunks {
            for (i, c) in chunk.text.chars().enumerate() {
                rebuilt[chunk.start_char + i] = Some(c);
            }
        }
        let rebuilt: String = rebuilt.into_iter().map(|c| c.unwrap()).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_character_chunk_invariants() {
        let chunker = TextChunker::new(80, 15, ChunkingStrategy::Characters).unwrap();
        let text: String = "abcdefghij ".repeat(40);
        let chunks = chunker.chunk(&text);

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as u32);
            assert_eq!(chunk.char_count, chunk.end_char - chunk.start_char);
            assert_eq!(chunk.char_count, chunk.text.chars().count());
            assert!(chunk.char_count <= 80);
        }
    }

    #[test]
    fn test_character_step_is_size_minus_overlap() {
        let chunker = TextChunker::new(100, 30, ChunkingStrategy::Characters).unwrap();
        let text = "x".repeat(400);
        let chunks = chunker.chunk(&text);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start_char - pair[0].start_char, 70);
        }
    }

    #[test]
    fn test_fable_fits_single_sentence_chunk() {
        let chunker = TextChunker::new(500, 50, ChunkingStrategy::Sentences).unwrap();
        let chunks = chunker.chunk(FABLE);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("Moral"));
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].char_count, chunks[0].text.chars().count());
    }

    #[test]
    fn test_sentence_chunks_keep_every_sentence() {
        let chunker = TextChunker::new(120, 30, ChunkingStrategy::Sentences).unwrap();
        let chunks = chunker.chunk(FABLE);
        assert!(chunks.len() > 1);

        for sentence in split_sentences(FABLE) {
            assert!(
                chunks.iter().any(|c| c.text.contains(&sentence)),
                "sentence not covered: {}",
                sentence
            );
        }
    }

    #[test]
    fn test_oversized_sentence_kept_whole() {
        let long_sentence = format!("{} end.", "word ".repeat(60));
        let chunker = TextChunker::new(50, 10, ChunkingStrategy::Sentences).unwrap();
        let chunks = chunker.chunk(&long_sentence);
        assert_eq!(chunks.len(), 1);
        // Never silently truncated mid-sentence
        assert!(chunks[0].text.ends_with("end."));
        assert!(chunks[0].char_count > 50);
    }

    #[test]
    fn test_sentence_indexes_strictly_increasing() {
        let chunker = TextChunker::new(100, 20, ChunkingStrategy::Sentences).unwrap();
        let text = "One sentence here. Another follows! A third? ".repeat(10);
        let chunks = chunker.chunk(&text);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as u32);
        }
    }

    #[test]
    fn test_sentence_overlap_snaps_to_word_boundary() {
        let tail = overlap_tail("the fox jumped over the fence", 10);
        assert!(!tail.starts_with(char::is_whitespace));
        assert!(tail.chars().count() <= 10);
        assert!("the fox jumped over the fence".ends_with(&tail));
    }

    #[test]
    fn test_split_sentences_boundaries() {
        let sentences = split_sentences("First one. Second one! Third? Trailing");
        assert_eq!(
            sentences,
            vec!["First one.", "Second one!", "Third?", "Trailing"]
        );
    }

    #[test]
    fn test_whitespace_only_input() {
        let chunker = TextChunker::new(100, 10, ChunkingStrategy::Sentences).unwrap();
        assert!(chunker.chunk("   \n\t  ").is_empty());
    }
}
