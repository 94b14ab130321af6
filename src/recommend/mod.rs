//! Content-based recommendations from reading history.
//!
//! A reader's profile is the mean embedding of every book they have an
//! interaction with. Unread candidates are ranked by cosine similarity to
//! that profile.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::analysis::error::{AnalysisError, AnalysisResult};
use crate::analysis::vectorize::{EmbeddingVector, average_embedding};
use crate::library::model::{Book, UserLibrary};

/// Strategy label echoed when the caller does not pick one.
pub const DEFAULT_STRATEGY: &str = "hybrid";

/// Why an item was recommended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reasons {
    pub vector_similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub book_id: u64,
    pub title: String,
    pub author: Option<String>,
    pub score: f64,
    pub reasons: Reasons,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub user_id: u64,
    /// Passed through unchanged; only vector similarity is implemented.
    pub strategy: String,
    pub items: Vec<RecommendationItem>,
}

/// `dot(a, b) / (|a| * |b|)`, or 0.0 when either vector is zero-length,
/// has zero norm, or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Mean of the embeddings in a reader's library; `None` when no book in it
/// has one.
pub fn profile_vector(library: &UserLibrary) -> AnalysisResult<Option<EmbeddingVector>> {
    let read: Vec<EmbeddingVector> = library
        .entries
        .iter()
        .filter_map(|entry| entry.embedding.clone())
        .collect();
    average_embedding(&read)
}

/// Rank `candidates` for the reader.
///
/// Books the reader already interacted with, and books without an
/// embedding, are never returned. A reader with no embedded history gets an
/// empty list. Ties keep candidate order. A candidate embedding whose
/// dimension differs from the profile fails with `DimensionMismatch`, with
/// `index` pointing into `candidates`.
pub fn recommend(
    library: &UserLibrary,
    candidates: &[Book],
    top_k: usize,
    strategy: &str,
) -> AnalysisResult<RecommendationResponse> {
    let mut response = RecommendationResponse {
        user_id: library.user_id,
        strategy: strategy.to_string(),
        items: Vec::new(),
    };

    let Some(profile) = profile_vector(library)? else {
        tracing::debug!(user_id = library.user_id, "no embedded reading history");
        return Ok(response);
    };

    let seen: HashSet<u64> = library.entries.iter().map(|e| e.interaction.book_id).collect();
    let mut scored: Vec<(&Book, f64)> = Vec::new();
    for (index, book) in candidates.iter().enumerate() {
        if seen.contains(&book.id) {
            continue;
        }
        let Some(embedding) = book.embedding.as_ref() else {
            continue;
        };
        if embedding.len() != profile.len() {
            tracing::warn!(
                book_id = book.id,
                expected = profile.len(),
                actual = embedding.len(),
                "candidate embedding has a different dimension"
            );
            return Err(AnalysisError::DimensionMismatch {
                expected: profile.len(),
                actual: embedding.len(),
                index,
            });
        }
        scored.push((book, cosine_similarity(&profile, embedding)));
    }
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    response.items = scored
        .into_iter()
        .take(top_k)
        .map(|(book, score)| RecommendationItem {
            book_id: book.id,
            title: book.title.clone(),
            author: book.author.clone(),
            score,
            reasons: Reasons {
                vector_similarity: score,
            },
        })
        .collect();

    tracing::debug!(
        user_id = library.user_id,
        candidates = candidates.len(),
        returned = response.items.len(),
        "recommendations ranked"
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::model::{LibraryEntry, ReadingStatus, UserBookInteraction};

    fn book(id: u64, embedding: Option<Vec<f32>>) -> Book {
        Book {
            id,
            title: format!("Book {id}"),
            author: None,
            description: None,
            published_year: None,
            tags: None,
            embedding,
            created_at: 0,
        }
    }

    fn library(entries: &[(u64, Option<Vec<f32>>)]) -> UserLibrary {
        UserLibrary {
            user_id: 7,
            entries: entries
                .iter()
                .map(|(book_id, embedding)| LibraryEntry {
                    interaction: UserBookInteraction {
                        user_id: 7,
                        book_id: *book_id,
                        status: ReadingStatus::Finished,
                        rating: None,
                        progress: None,
                        last_read_at: 0,
                    },
                    embedding: embedding.clone(),
                })
                .collect(),
        }
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn profile_is_mean_of_read_embeddings() {
        let lib = library(&[(1, Some(vec![1.0, 0.0])), (2, Some(vec![0.0, 1.0])), (3, None)]);
        assert_eq!(profile_vector(&lib).unwrap(), Some(vec![0.5, 0.5]));
    }

    #[test]
    fn aligned_candidate_ranks_first() {
        let lib = library(&[(1, Some(vec![1.0, 0.0])), (2, Some(vec![0.0, 1.0]))]);
        let candidates = vec![book(10, Some(vec![1.0, -1.0])), book(11, Some(vec![1.0, 1.0]))];
        let response = recommend(&lib, &candidates, 10, DEFAULT_STRATEGY).unwrap();

        assert_eq!(response.user_id, 7);
        assert_eq!(response.strategy, "hybrid");
        assert_eq!(response.items.len(), 2);
        assert_eq!(response.items[0].book_id, 11);
        assert!((response.items[0].score - 1.0).abs() < 1e-6);
        assert!(response.items[1].score.abs() < 1e-6);
        assert_eq!(response.items[0].reasons.vector_similarity, response.items[0].score);
    }

    #[test]
    fn read_and_unembedded_books_excluded() {
        let lib = library(&[(1, Some(vec![1.0, 0.0]))]);
        let candidates = vec![book(1, Some(vec![1.0, 0.0])), book(2, None), book(3, Some(vec![0.5, 0.5]))];
        let response = recommend(&lib, &candidates, 10, "custom").unwrap();
        let ids: Vec<u64> = response.items.iter().map(|i| i.book_id).collect();
        assert_eq!(ids, vec![3]);
        assert_eq!(response.strategy, "custom");
    }

    #[test]
    fn mismatched_candidate_dimension_fails() {
        let lib = library(&[(1, Some(vec![1.0, 0.0]))]);
        let candidates = vec![book(2, Some(vec![-1.0, 0.0])), book(3, Some(vec![1.0, 0.0, 0.0]))];
        match recommend(&lib, &candidates, 10, DEFAULT_STRATEGY) {
            Err(AnalysisError::DimensionMismatch {
                expected,
                actual,
                index,
            }) => {
                assert_eq!((expected, actual, index), (2, 3, 1));
            }
            other => panic!("expected DimensionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn no_history_means_no_items() {
        let candidates = vec![book(1, Some(vec![1.0, 0.0]))];
        assert!(recommend(&library(&[]), &candidates, 5, DEFAULT_STRATEGY).unwrap().items.is_empty());
        assert!(recommend(&library(&[(9, None)]), &candidates, 5, DEFAULT_STRATEGY).unwrap().items.is_empty());
    }

    #[test]
    fn top_k_truncates() {
        let lib = library(&[(1, Some(vec![1.0, 0.0]))]);
        let candidates: Vec<Book> = (2..12).map(|id| book(id, Some(vec![1.0, id as f32]))).collect();
        let response = recommend(&lib, &candidates, 3, DEFAULT_STRATEGY).unwrap();
        assert_eq!(response.items.len(), 3);
        assert!(response.items.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn response_serializes_in_service_shape() {
        let lib = library(&[(1, Some(vec![1.0, 0.0]))]);
        let response = recommend(&lib, &[book(2, Some(vec![1.0, 0.0]))], 1, DEFAULT_STRATEGY).unwrap();
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["items"][0]["book_id"], 2);
        assert!(value["items"][0]["reasons"]["vector_similarity"].is_number());
    }
}
