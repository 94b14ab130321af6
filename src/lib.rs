// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # booklens
//!
//! Content analysis and recommendation for EPUB books.
//!
//! ## Architecture
//!
//! - **Library** (`library`): EPUB → chapters → flat text → overlapped chunks,
//!   plus a JSON catalog of books, readers and reading history
//! - **Analysis** (`analysis`): stratified chunk sampling, per-chunk tag
//!   extraction, count-based tag aggregation, and a mean embedding per book
//! - **Recommend** (`recommend`): profile vector and cosine ranking
//!
//! ## Library usage
//!
//! ```no_run
//! use std::path::Path;
//! use booklens::analysis::Analyzer;
//! use booklens::config::BookLensConfig;
//!
//! let config = BookLensConfig::default();
//! let mut analyzer = Analyzer::from_config(&config);
//! let outcome = analyzer.analyze_document(Path::new("book.epub")).unwrap();
//! println!("{} tag fields", outcome.tags.len());
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod library;
pub mod paths;
pub mod recommend;
