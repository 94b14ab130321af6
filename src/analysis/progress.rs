//! Structured progress events for the analysis pipeline.
//!
//! The pipeline never prints. It emits `ProgressEvent`s into a
//! `ProgressSink`, which can log them, render them for a terminal, or
//! collect them in memory for tests.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Chunk,
    Tag,
    Aggregate,
    Embed,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Extract,
        Stage::Chunk,
        Stage::Tag,
        Stage::Aggregate,
        Stage::Embed,
    ];

    /// 1-based position in the pipeline.
    pub fn ordinal(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).map_or(0, |i| i + 1)
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Extract => "Converting EPUB to text",
            Stage::Chunk => "Splitting text into chunks",
            Stage::Tag => "Sampling and tagging",
            Stage::Aggregate => "Aggregating tags",
            Stage::Embed => "Generating vectors",
        }
    }
}

/// One observable step of an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEvent {
    StageStarted {
        stage: Stage,
    },
    /// One sampled chunk sent to a service.
    SampleProcessed {
        stage: Stage,
        /// 1-based position among the sampled chunks.
        position: usize,
        sampled: usize,
        chunk_index: usize,
        succeeded: bool,
    },
    StageFinished {
        stage: Stage,
        elapsed_ms: u64,
        detail: String,
    },
    Finished {
        elapsed_ms: u64,
    },
}

/// A destination for progress events.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &ProgressEvent);
}

/// Forwards events to `tracing`.
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::StageStarted { stage } => {
                tracing::info!(stage = ?stage, step = stage.ordinal(), "{}", stage.label());
            }
            ProgressEvent::SampleProcessed {
                stage,
                position,
                sampled,
                chunk_index,
                succeeded,
            } => {
                tracing::debug!(stage = ?stage, position, sampled, chunk_index, succeeded, "sample processed");
            }
            ProgressEvent::StageFinished {
                stage,
                elapsed_ms,
                detail,
            } => {
                tracing::info!(stage = ?stage, elapsed_ms, "{detail}");
            }
            ProgressEvent::Finished { elapsed_ms } => {
                tracing::info!(elapsed_ms, "analysis finished");
            }
        }
    }
}

/// Renders events as terminal lines on stderr.
pub struct StderrSink;

impl ProgressSink for StderrSink {
    fn emit(&self, event: &ProgressEvent) {
        if let Some(line) = render(event) {
            eprintln!("{line}");
        }
    }
}

/// Human-readable form of an event.
pub fn render(event: &ProgressEvent) -> Option<String> {
    let total = Stage::ALL.len();
    match event {
        ProgressEvent::StageStarted { stage } => {
            Some(format!("  [{}/{total}] {}...", stage.ordinal(), stage.label()))
        }
        ProgressEvent::SampleProcessed {
            position,
            sampled,
            succeeded,
            ..
        } => {
            let outcome = if *succeeded { "done" } else { "skipped" };
            Some(format!("    - chunk {position}/{sampled}: {outcome}"))
        }
        ProgressEvent::StageFinished {
            elapsed_ms, detail, ..
        } => Some(format!(
            "    > {detail} ({:.2}s)",
            *elapsed_ms as f64 / 1000.0
        )),
        ProgressEvent::Finished { elapsed_ms } => Some(format!(
            "Analysis finished in {:.2}s",
            *elapsed_ms as f64 / 1000.0
        )),
    }
}

/// Discards every event.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: &ProgressEvent) {}
}

/// Collects events in memory.
#[derive(Default)]
pub struct VecSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProgressSink for VecSink {
    fn emit(&self, event: &ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}
