//! Paragraph-aware chunking with paragraph-count overlap.
//!
//! Token counts here are whitespace-separated word counts. This is an
//! approximation of a real tokenizer, and every budget decision downstream
//! (chunk boundaries, what the external services receive) is made in these
//! units.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::library::error::LibraryResult;

/// Paragraph separator in flattened text.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Configuration for chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Token budget for the greedy pass.
    pub chunk_size: usize,
    /// Number of trailing paragraphs of the previous chunk prepended to the
    /// next one. A paragraph count, not a token count.
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            overlap: 100,
        }
    }
}

/// One emitted chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Overlap paragraphs followed by the chunk's own paragraphs, joined by
    /// blank lines. May exceed the token budget once overlap is added.
    pub text: String,
    /// How many leading paragraphs of `text` were copied from the previous chunk.
    pub overlap_paragraphs: usize,
}

impl Chunk {
    /// All paragraphs of the chunk, overlap included.
    pub fn paragraphs(&self) -> Vec<&str> {
        self.text.split(PARAGRAPH_SEPARATOR).collect()
    }

    /// Paragraphs that belong to this chunk and not to its predecessor.
    pub fn own_paragraphs(&self) -> Vec<&str> {
        self.paragraphs()
            .into_iter()
            .skip(self.overlap_paragraphs)
            .collect()
    }

    pub fn token_count(&self) -> usize {
        count_tokens(&self.text)
    }
}

/// Whitespace-split word count.
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Greedy pass: accumulate blank-line-delimited paragraphs while the running
/// token count stays within `chunk_size`.
///
/// A paragraph that would push the running count over the budget closes the
/// current chunk and starts the next one, so a single paragraph larger than
/// the budget becomes a chunk of its own. Chunks are trimmed; chunks that
/// trim to nothing are not emitted.
pub fn greedy_chunks(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0usize;

    for paragraph in text.split(PARAGRAPH_SEPARATOR) {
        let tokens = count_tokens(paragraph);
        if current_tokens + tokens <= chunk_size {
            current.push(paragraph);
            current_tokens += tokens;
        } else {
            flush(&mut chunks, &current);
            current = vec![paragraph];
            current_tokens = tokens;
        }
    }
    flush(&mut chunks, &current);

    chunks
}

fn flush(chunks: &mut Vec<String>, paragraphs: &[&str]) {
    let joined = paragraphs.join(PARAGRAPH_SEPARATOR);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split text into chunks, then prepend to each chunk after the first the
/// last `overlap` paragraphs of its predecessor's greedy chunk.
///
/// The overlapped chunk is not re-truncated to the budget.
pub fn split_into_chunks(text: &str, config: &ChunkConfig) -> Vec<Chunk> {
    let greedy = greedy_chunks(text, config.chunk_size);
    let mut result = Vec::with_capacity(greedy.len());

    for (i, chunk) in greedy.iter().enumerate() {
        if i == 0 || config.overlap == 0 {
            result.push(Chunk {
                text: chunk.clone(),
                overlap_paragraphs: 0,
            });
            continue;
        }

        let previous: Vec<&str> = greedy[i - 1].split(PARAGRAPH_SEPARATOR).collect();
        let start = previous.len().saturating_sub(config.overlap);
        let overlap = &previous[start..];

        let mut paragraphs: Vec<&str> = overlap.to_vec();
        paragraphs.extend(chunk.split(PARAGRAPH_SEPARATOR));

        result.push(Chunk {
            text: paragraphs.join(PARAGRAPH_SEPARATOR),
            overlap_paragraphs: overlap.len(),
        });
    }

    result
}

/// Write each chunk to `{dir}/{prefix}_chunk_{NN}.txt` (1-based) and return
/// the written paths.
pub fn save_chunks(chunks: &[Chunk], dir: &Path, prefix: &str) -> LibraryResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut paths = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let path = dir.join(format!("{prefix}_chunk_{:02}.txt", i + 1));
        std::fs::write(&path, &chunk.text)?;
        paths.push(path);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize, tag: &str) -> String {
        (0..n).map(|i| format!("{tag}{i}")).collect::<Vec<_>>().join(" ")
    }

    fn document(paragraph_sizes: &[usize]) -> String {
        paragraph_sizes
            .iter()
            .enumerate()
            .map(|(i, n)| words(*n, &format!("p{i}w")))
            .collect::<Vec<_>>()
            .join(PARAGRAPH_SEPARATOR)
    }

    #[test]
    fn token_count_is_word_count() {
        assert_eq!(count_tokens("one two  three\nfour"), 4);
        assert_eq!(count_tokens("   "), 0);
    }

    #[test]
    fn greedy_respects_budget() {
        let text = document(&[4, 4, 4, 4, 4]);
        let chunks = greedy_chunks(&text, 10);
        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(count_tokens(chunk) <= 10);
        }
    }

    #[test]
    fn oversized_paragraph_gets_its_own_chunk() {
        let text = document(&[3, 50, 3]);
        let chunks = greedy_chunks(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(count_tokens(&chunks[1]), 50);
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        assert!(split_into_chunks("", &ChunkConfig::default()).is_empty());
        assert!(split_into_chunks("\n\n  \n\n", &ChunkConfig::default()).is_empty());
    }

    #[test]
    fn overlap_is_paragraph_count() {
        let text = document(&[2, 2, 2, 2, 2, 2]);
        let config = ChunkConfig {
            chunk_size: 6,
            overlap: 2,
        };
        let chunks = split_into_chunks(&text, &config);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].overlap_paragraphs, 0);
        assert_eq!(chunks[1].overlap_paragraphs, 2);
        assert_eq!(chunks[1].paragraphs().len(), 5);
        assert!(chunks[1].text.starts_with("p1w0"));
        // Overlap is not re-truncated to the budget.
        assert_eq!(chunks[1].token_count(), 10);
    }

    #[test]
    fn large_overlap_copies_whole_previous_chunk() {
        let text = document(&[2, 2, 2, 2]);
        let config = ChunkConfig {
            chunk_size: 4,
            overlap: 100,
        };
        let chunks = split_into_chunks(&text, &config);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].overlap_paragraphs, 2);
        assert_eq!(chunks[1].paragraphs().len(), 4);
    }

    #[test]
    fn zero_overlap_leaves_chunks_untouched() {
        let text = document(&[2, 2, 2, 2]);
        let config = ChunkConfig {
            chunk_size: 4,
            overlap: 0,
        };
        let chunks = split_into_chunks(&text, &config);
        assert_eq!(chunks[1].overlap_paragraphs, 0);
        assert_eq!(chunks[1].paragraphs().len(), 2);
    }

    #[test]
    fn budget_holds_before_overlap() {
        let sizes: Vec<usize> = (0..40).map(|i| 1 + (i * 7) % 13).collect();
        let text = document(&sizes);
        let config = ChunkConfig {
            chunk_size: 25,
            overlap: 3,
        };
        let chunks = split_into_chunks(&text, &config);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            let own: usize = chunk.own_paragraphs().iter().map(|p| count_tokens(p)).sum();
            assert!(own <= config.chunk_size);
        }
    }

    #[test]
    fn own_paragraphs_reconstruct_document() {
        let sizes: Vec<usize> = (0..30).map(|i| 2 + (i * 5) % 9).collect();
        let text = document(&sizes);
        let config = ChunkConfig {
            chunk_size: 20,
            overlap: 2,
        };
        let chunks = split_into_chunks(&text, &config);

        let mut rebuilt: Vec<&str> = chunks[0].paragraphs();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.own_paragraphs());
        }
        let original: Vec<&str> = text.split(PARAGRAPH_SEPARATOR).collect();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn save_chunks_names_files_sequentially() {
        let dir = tempfile::TempDir::new().unwrap();
        let chunks = split_into_chunks(&document(&[3, 3, 3]), &ChunkConfig {
            chunk_size: 3,
            overlap: 1,
        });
        let paths = save_chunks(&chunks, dir.path(), "novel").unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths[0].ends_with("novel_chunk_01.txt"));
        assert!(paths[2].ends_with("novel_chunk_03.txt"));
        let second = std::fs::read_to_string(&paths[1]).unwrap();
        assert_eq!(second, chunks[1].text);
    }
}
