//! Core data types for extracted books and the catalog.
//!
//! A book is extracted into `Chapter`s in spine order, analyzed into a tag
//! summary plus a representative embedding, and stored as a `Book`. Reading
//! history lives in `UserBookInteraction`s keyed by (user, book).

use serde::{Deserialize, Serialize};

use crate::analysis::aggregate::TagSummary;
use crate::analysis::vectorize::EmbeddingVector;

/// One spine document after cleaning.
///
/// `paragraphs` is never empty: chapters without surviving paragraphs are
/// dropped during extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// Text of the first `h1`–`h3` heading, or empty.
    pub title: String,
    /// Cleaned block-level paragraphs in document order.
    pub paragraphs: Vec<String>,
}

/// Package-level metadata read from the EPUB's OPF.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
}

/// Result of extracting one EPUB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedBook {
    pub metadata: BookMetadata,
    /// Non-empty chapters in spine order.
    pub chapters: Vec<Chapter>,
}

/// A stored book with its ingestion-time analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub published_year: Option<i32>,
    /// Aggregated tag counts; `None` when the book was never analyzed.
    #[serde(default)]
    pub tags: Option<TagSummary>,
    /// Mean embedding of the sampled chunks; `None` when every call failed.
    #[serde(default)]
    pub embedding: Option<EmbeddingVector>,
    /// Timestamp of ingestion (seconds since UNIX epoch).
    #[serde(default)]
    pub created_at: u64,
}

/// Fields supplied when creating a book; the catalog assigns id and timestamp.
#[derive(Debug, Clone, Default)]
pub struct NewBook {
    pub title: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub published_year: Option<i32>,
    pub tags: Option<TagSummary>,
    pub embedding: Option<EmbeddingVector>,
}

/// A registered reader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: u64,
}

/// Reading status of a book on a user's shelf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    Reading,
    #[default]
    Finished,
    Dropped,
}

impl ReadingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reading => "reading",
            Self::Finished => "finished",
            Self::Dropped => "dropped",
        }
    }
}

impl std::fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReadingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reading" => Ok(Self::Reading),
            "finished" => Ok(Self::Finished),
            "dropped" => Ok(Self::Dropped),
            other => Err(format!(
                "unknown status \"{other}\" (expected reading, finished, or dropped)"
            )),
        }
    }
}

/// One (user, book) reading record. Re-recording the same pair updates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBookInteraction {
    pub user_id: u64,
    pub book_id: u64,
    pub status: ReadingStatus,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub progress: Option<f32>,
    /// Last update (seconds since UNIX epoch).
    pub last_read_at: u64,
}

/// The mutable part of an interaction, as supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct InteractionUpdate {
    pub status: ReadingStatus,
    pub rating: Option<u8>,
    pub progress: Option<f32>,
}

/// A user's interaction joined with the stored embedding of that book.
#[derive(Debug, Clone)]
pub struct LibraryEntry {
    pub interaction: UserBookInteraction,
    pub embedding: Option<EmbeddingVector>,
}

/// Everything the recommender needs to know about one reader.
#[derive(Debug, Clone)]
pub struct UserLibrary {
    pub user_id: u64,
    pub entries: Vec<LibraryEntry>,
}

/// Seconds since the UNIX epoch, saturating to zero on a skewed clock.
pub(crate) fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
