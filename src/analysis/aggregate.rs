//! Merge per-chunk tag records into one count-based summary.
//!
//! Fields are discovered from whatever keys the records carry. Each field
//! accumulates as either flat value counts or, for object-valued fields such
//! as `content_warnings`, per-sub-field value counts. The accumulator is
//! flattened into plain nested maps (`TagSummary`) before it is stored.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::error::{AnalysisError, AnalysisResult};
use crate::analysis::tagger::TagRecord;

/// Sub-field that receives scalar values seen on an otherwise nested field.
pub const SCALAR_SUBFIELD: &str = "_value";

/// Observed value → number of occurrences.
pub type ValueCounts = BTreeMap<String, u64>;

/// Persisted counts for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSummary {
    /// `{value: count}`
    Counts(ValueCounts),
    /// `{sub_field: {value: count}}`
    Nested(BTreeMap<String, ValueCounts>),
}

/// Aggregated tags for one book, serialized as plain nested JSON objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSummary(BTreeMap<String, FieldSummary>);

impl TagSummary {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&FieldSummary> {
        self.0.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSummary)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Count for `value` on a flat field; 0 when absent or nested.
    pub fn count(&self, field: &str, value: &str) -> u64 {
        match self.0.get(field) {
            Some(FieldSummary::Counts(counts)) => counts.get(value).copied().unwrap_or(0),
            _ => 0,
        }
    }

    /// Count for `value` under `sub_field` of a nested field; 0 when absent.
    pub fn nested_count(&self, field: &str, sub_field: &str, value: &str) -> u64 {
        match self.0.get(field) {
            Some(FieldSummary::Nested(subs)) => subs
                .get(sub_field)
                .and_then(|counts| counts.get(value))
                .copied()
                .unwrap_or(0),
            _ => 0,
        }
    }

    /// Most frequent values of a flat field, highest first, ties by value.
    pub fn top_values(&self, field: &str, n: usize) -> Vec<(&str, u64)> {
        let Some(FieldSummary::Counts(counts)) = self.0.get(field) else {
            return Vec::new();
        };
        let mut ranked: Vec<(&str, u64)> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(n);
        ranked
    }
}

/// Accumulated counts for one field while folding.
#[derive(Debug, Clone)]
enum Counted {
    Scalar(ValueCounts),
    Nested(BTreeMap<String, ValueCounts>),
}

impl Counted {
    /// Turn flat counts into nested ones, keeping them under [`SCALAR_SUBFIELD`].
    fn promote(&mut self) {
        if let Counted::Scalar(counts) = self {
            let flat = std::mem::take(counts);
            let mut subs = BTreeMap::new();
            if !flat.is_empty() {
                subs.insert(SCALAR_SUBFIELD.to_string(), flat);
            }
            *self = Counted::Nested(subs);
        }
    }
}

/// Folds tag records into a `TagSummary`.
#[derive(Debug, Default)]
pub struct TagAggregator {
    fields: BTreeMap<String, Counted>,
    records: usize,
}

impl TagAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records folded so far.
    pub fn records(&self) -> usize {
        self.records
    }

    /// Fold one record.
    ///
    /// Scalars (string, number, bool, null) add one to `field[value]`; lists
    /// add one per element; objects add one to `field[sub_field][value]` per
    /// sub-field; empty objects are ignored. A field whose shape changes
    /// between records is kept
    /// nested, with scalar occurrences under [`SCALAR_SUBFIELD`].
    pub fn add(&mut self, record: &TagRecord) {
        self.records += 1;
        for (field, value) in record.iter() {
            match value {
                // No sub-fields, nothing to count.
                Value::Object(object) if object.is_empty() => {}
                Value::Object(object) => {
                    let slot = self
                        .fields
                        .entry(field.clone())
                        .or_insert_with(|| Counted::Nested(BTreeMap::new()));
                    slot.promote();
                    if let Counted::Nested(subs) = slot {
                        for (sub_field, sub_value) in object {
                            count_occurrences(subs.entry(sub_field.clone()).or_default(), sub_value);
                        }
                    }
                }
                other => match self
                    .fields
                    .entry(field.clone())
                    .or_insert_with(|| Counted::Scalar(ValueCounts::new()))
                {
                    Counted::Scalar(counts) => count_occurrences(counts, other),
                    Counted::Nested(subs) => count_occurrences(
                        subs.entry(SCALAR_SUBFIELD.to_string()).or_default(),
                        other,
                    ),
                },
            }
        }
    }

    /// Flatten into the persisted form.
    pub fn finish(self) -> TagSummary {
        TagSummary(
            self.fields
                .into_iter()
                .map(|(field, counted)| {
                    let summary = match counted {
                        Counted::Scalar(counts) => FieldSummary::Counts(counts),
                        Counted::Nested(subs) => FieldSummary::Nested(subs),
                    };
                    (field, summary)
                })
                .collect(),
        )
    }
}

/// One increment per scalar, one per list element.
fn count_occurrences(counts: &mut ValueCounts, value: &Value) {
    match value {
        Value::Array(items) => {
            for item in items {
                *counts.entry(value_key(item)).or_insert(0) += 1;
            }
        }
        scalar => *counts.entry(value_key(scalar)).or_insert(0) += 1,
    }
}

/// Map key for an observed value: strings verbatim, everything else as JSON.
fn value_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Aggregate in-memory records.
pub fn aggregate_records<'a>(records: impl IntoIterator<Item = &'a TagRecord>) -> TagSummary {
    let mut aggregator = TagAggregator::new();
    for record in records {
        aggregator.add(record);
    }
    aggregator.finish()
}

/// Whether a file name looks like a per-chunk tag file (`*_tag_*.json`,
/// excluding the `*_tag_all.json` summary).
pub fn is_tag_file(name: &str) -> bool {
    name.ends_with(".json") && name.contains("_tag_") && !name.ends_with("_tag_all.json")
}

/// Aggregate every per-chunk tag file in `dir`, in file-name order.
///
/// Files that cannot be read or parsed as a JSON object are logged and
/// skipped.
pub fn aggregate_dir(dir: &Path) -> AnalysisResult<TagSummary> {
    let entries = std::fs::read_dir(dir).map_err(|source| AnalysisError::WorkArea {
        path: dir.display().to_string(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_tag_file)
        })
        .collect();
    files.sort();

    if files.is_empty() {
        tracing::info!(dir = %dir.display(), "no tag files to aggregate");
    }

    let mut aggregator = TagAggregator::new();
    for path in &files {
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str::<TagRecord>(&raw).map_err(|e| e.to_string()));
        match parsed {
            Ok(record) => aggregator.add(&record),
            Err(error) => {
                tracing::warn!(file = %path.display(), %error, "skipping unreadable tag file");
            }
        }
    }

    tracing::debug!(files = files.len(), records = aggregator.records(), "tags aggregated");
    Ok(aggregator.finish())
}

/// Write `{dir}/{prefix}_tag_all.json` and return its path.
pub fn write_summary(summary: &TagSummary, dir: &Path, prefix: &str) -> AnalysisResult<PathBuf> {
    let work_area = |source| AnalysisError::WorkArea {
        path: dir.display().to_string(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(work_area)?;
    let path = dir.join(format!("{prefix}_tag_all.json"));
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| work_area(std::io::Error::other(e)))?;
    std::fs::write(&path, json).map_err(work_area)?;
    Ok(path)
}
