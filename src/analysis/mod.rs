//! Book analysis: stratified chunk sampling, tag extraction and aggregation,
//! and the representative embedding.
//!
//! `pipeline::Analyzer` drives the stages. The external services sit behind
//! the `TagExtractor` and `Embedder` traits so the pipeline can run against
//! test doubles.

pub mod aggregate;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod sampler;
pub mod service;
pub mod tagger;
pub mod vectorize;

pub use aggregate::{FieldSummary, TagAggregator, TagSummary, aggregate_dir, aggregate_records, write_summary};
pub use error::{AnalysisError, AnalysisResult};
pub use pipeline::{AnalysisOutcome, Analyzer};
pub use progress::{ProgressEvent, ProgressSink, Stage};
pub use sampler::{sample_indices, segment_bounds};
pub use tagger::{TagClient, TagExtractor, TagRecord, parse_tag_content};
pub use vectorize::{EmbeddingClient, Embedder, EmbeddingVector, average_embedding};
