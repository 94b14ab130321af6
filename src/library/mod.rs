//! Book library: EPUB extraction, chunking, and the persistent catalog.
//!
//! Extraction turns an EPUB into ordered `Chapter`s and flat text; the
//! chunker cuts that text into token-bounded, paragraph-overlapped chunks.
//! The catalog stores analyzed books, readers, and reading history.

pub mod catalog;
pub mod chunker;
pub mod error;
pub mod model;
pub mod parser;

pub use catalog::{Catalog, slugify};
pub use chunker::{Chunk, ChunkConfig, count_tokens, save_chunks, split_into_chunks};
pub use error::{LibraryError, LibraryResult};
pub use model::{
    Book, BookMetadata, Chapter, ExtractedBook, InteractionUpdate, LibraryEntry, NewBook,
    ReadingStatus, User, UserBookInteraction, UserLibrary,
};
pub use parser::{EpubExtractor, ExtractOptions, chapters_to_json, chapters_to_text, ensure_epub};
