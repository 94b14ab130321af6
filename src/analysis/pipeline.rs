//! Ingestion-time analysis: EPUB → text → sampled tags and a mean embedding.
//!
//! Every run works inside its own scratch directory, removed when the run
//! ends, whether it succeeds or fails. External calls are issued one at a
//! time with a fixed pause between them. A failed call drops that sample and
//! the run continues; only extraction failures and dimension mismatches end
//! the run with an error.

use std::path::Path;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::analysis::aggregate::{TagSummary, aggregate_dir, write_summary};
use crate::analysis::error::{AnalysisError, AnalysisResult};
use crate::analysis::progress::{ProgressEvent, ProgressSink, Stage, TracingSink};
use crate::analysis::sampler::sample_indices;
use crate::analysis::tagger::{TagClient, TagExtractor};
use crate::analysis::vectorize::{EmbeddingClient, Embedder, EmbeddingVector, average_embedding};
use crate::config::{AnalysisConfig, BookLensConfig};
use crate::library::catalog::slugify;
use crate::library::chunker::split_into_chunks;
use crate::library::parser::{EpubExtractor, ExtractOptions, chapters_to_text, ensure_epub};

/// What ingestion stores for a book.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    /// Aggregated counts; empty when every tagging call failed.
    pub tags: TagSummary,
    /// Mean of the sampled chunk embeddings; `None` when every call failed.
    pub embedding: Option<EmbeddingVector>,
}

/// Runs the analysis pipeline with injected services.
pub struct Analyzer {
    config: AnalysisConfig,
    extract: ExtractOptions,
    pause: Duration,
    tagger: Box<dyn TagExtractor>,
    embedder: Box<dyn Embedder>,
    sink: Box<dyn ProgressSink>,
    rng: StdRng,
}

impl Analyzer {
    /// Analyzer talking to the configured HTTP services.
    pub fn from_config(config: &BookLensConfig) -> Self {
        Self::with_services(
            config.analysis.clone(),
            config.extract.clone(),
            Box::new(TagClient::new(&config.service)),
            Box::new(EmbeddingClient::new(&config.service)),
        )
        .with_pause(Duration::from_millis(config.service.pause_ms))
    }

    /// Analyzer over arbitrary tag and embedding backends, with no pause
    /// between calls and progress forwarded to `tracing`.
    pub fn with_services(
        config: AnalysisConfig,
        extract: ExtractOptions,
        tagger: Box<dyn TagExtractor>,
        embedder: Box<dyn Embedder>,
    ) -> Self {
        Self {
            config,
            extract,
            pause: Duration::ZERO,
            tagger,
            embedder,
            sink: Box::new(TracingSink),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Fix the sampling draws.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze one EPUB file.
    ///
    /// Non-EPUB paths are rejected before any work starts. A book with no
    /// extractable text fails with `NoContentExtracted`.
    pub fn analyze_document(&mut self, path: &Path) -> AnalysisResult<AnalysisOutcome> {
        let started = Instant::now();
        ensure_epub(&path.to_string_lossy())?;
        let work = self.work_area()?;

        self.begin(Stage::Extract);
        let stage_start = Instant::now();
        let book = EpubExtractor::new(self.extract.clone()).extract_path(path)?;
        let text = chapters_to_text(&book.chapters);
        let content = work.path().join("content.txt");
        std::fs::write(&content, &text).map_err(|source| work_error(&content, source))?;
        self.finish(
            Stage::Extract,
            stage_start,
            format!("{} chapters, {} characters", book.chapters.len(), text.chars().count()),
        );

        let name = book
            .metadata
            .title
            .clone()
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_default();
        let outcome = self.run_stages(&text, work.path(), &name)?;
        self.sink.emit(&ProgressEvent::Finished {
            elapsed_ms: elapsed_ms(started),
        });
        Ok(outcome)
    }

    /// Analyze already-extracted text. `name` only labels scratch files.
    pub fn analyze_text(&mut self, text: &str, name: &str) -> AnalysisResult<AnalysisOutcome> {
        let started = Instant::now();
        let work = self.work_area()?;
        let outcome = self.run_stages(text, work.path(), name)?;
        self.sink.emit(&ProgressEvent::Finished {
            elapsed_ms: elapsed_ms(started),
        });
        Ok(outcome)
    }

    fn run_stages(&mut self, text: &str, work: &Path, name: &str) -> AnalysisResult<AnalysisOutcome> {
        let prefix = match slugify(name) {
            slug if slug.is_empty() => "book".to_string(),
            slug => slug,
        };
        let mut calls = 0usize;

        self.begin(Stage::Chunk);
        let stage_start = Instant::now();
        let tag_chunks = split_into_chunks(text, &self.config.tag_chunks());
        self.finish(Stage::Chunk, stage_start, format!("{} chunks", tag_chunks.len()));

        self.begin(Stage::Tag);
        let stage_start = Instant::now();
        let tags_dir = work.join("tags");
        std::fs::create_dir_all(&tags_dir).map_err(|source| work_error(&tags_dir, source))?;
        let picked = sample_indices(tag_chunks.len(), self.config.sample_count, &mut self.rng);
        let mut tagged = 0usize;
        for (position, &index) in picked.iter().enumerate() {
            self.pause_between(&mut calls);
            let record = self.tagger.tag_chunk(&tag_chunks[index].text);
            if let Some(record) = &record {
                let file = tags_dir.join(format!("{prefix}_tag_{tagged:02}.json"));
                let json = serde_json::to_string(record)
                    .map_err(|e| work_error(&file, std::io::Error::other(e)))?;
                std::fs::write(&file, json).map_err(|source| work_error(&file, source))?;
                tagged += 1;
            }
            self.sample_done(Stage::Tag, position, picked.len(), index, record.is_some());
        }
        if tagged < picked.len() {
            tracing::warn!(tagged, sampled = picked.len(), "some tag samples were dropped");
        }
        self.finish(
            Stage::Tag,
            stage_start,
            format!("tagged {tagged} of {} sampled chunks", picked.len()),
        );

        self.begin(Stage::Aggregate);
        let stage_start = Instant::now();
        let tags = aggregate_dir(&tags_dir)?;
        write_summary(&tags, &work.join("aggregated"), &prefix)?;
        self.finish(Stage::Aggregate, stage_start, format!("{} fields", tags.len()));

        self.begin(Stage::Embed);
        let stage_start = Instant::now();
        let vector_chunks = split_into_chunks(text, &self.config.vector_chunks());
        let picked = sample_indices(vector_chunks.len(), self.config.sample_count, &mut self.rng);
        let mut vectors = Vec::with_capacity(picked.len());
        for (position, &index) in picked.iter().enumerate() {
            self.pause_between(&mut calls);
            let vector = self.embedder.get_embedding(&vector_chunks[index].text);
            let succeeded = vector.is_some();
            vectors.extend(vector);
            self.sample_done(Stage::Embed, position, picked.len(), index, succeeded);
        }
        let embedding = average_embedding(&vectors)?;
        self.finish(
            Stage::Embed,
            stage_start,
            format!("embedded {} of {} sampled chunks", vectors.len(), picked.len()),
        );

        Ok(AnalysisOutcome { tags, embedding })
    }

    fn work_area(&self) -> AnalysisResult<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("booklens-");
        match &self.config.work_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent).map_err(|source| work_error(parent, source))?;
                builder.tempdir_in(parent).map_err(|source| work_error(parent, source))
            }
            None => builder
                .tempdir()
                .map_err(|source| work_error(&std::env::temp_dir(), source)),
        }
    }

    /// Sleep before every external call except the first of the run.
    fn pause_between(&self, calls: &mut usize) {
        if *calls > 0 && !self.pause.is_zero() {
            std::thread::sleep(self.pause);
        }
        *calls += 1;
    }

    fn begin(&self, stage: Stage) {
        self.sink.emit(&ProgressEvent::StageStarted { stage });
    }

    fn finish(&self, stage: Stage, started: Instant, detail: String) {
        self.sink.emit(&ProgressEvent::StageFinished {
            stage,
            elapsed_ms: elapsed_ms(started),
            detail,
        });
    }

    fn sample_done(&self, stage: Stage, position: usize, sampled: usize, chunk_index: usize, succeeded: bool) {
        self.sink.emit(&ProgressEvent::SampleProcessed {
            stage,
            position: position + 1,
            sampled,
            chunk_index,
            succeeded,
        });
    }
}

fn work_error(path: &Path, source: std::io::Error) -> AnalysisError {
    AnalysisError::WorkArea {
        path: path.display().to_string(),
        source,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
