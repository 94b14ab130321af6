//! EPUB container reading using the `epub` crate.
//!
//! The manifest and spine are copied out of the container into plain
//! values, spine idrefs are resolved against document items, and each
//! resolved document is cleaned with `scraper` (see `html`).

use std::io::{Read, Seek};
use std::path::Path;

use ::epub::doc::EpubDoc;

use crate::library::error::{LibraryError, LibraryResult};
use crate::library::model::{BookMetadata, Chapter, ExtractedBook};
use crate::library::parser::ExtractOptions;
use crate::library::parser::html::html_to_chapter;

/// Media types of spine-eligible content documents.
const DOCUMENT_MIME_TYPES: [&str; 2] = ["application/xhtml+xml", "text/html"];

/// One manifest entry, detached from the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    pub path: String,
    pub mime: String,
}

impl ManifestItem {
    pub fn is_document(&self) -> bool {
        DOCUMENT_MIME_TYPES.contains(&self.mime.as_str())
    }
}

/// Resolve spine idrefs to document items, in spine order.
///
/// An idref that matches no document id is retried as a filename suffix
/// (some packages put a href where an id belongs). Unresolvable entries are
/// skipped. `manifest` should be in a stable order so the suffix fallback
/// is deterministic.
pub fn resolve_spine<'m>(spine: &[String], manifest: &'m [ManifestItem]) -> Vec<&'m ManifestItem> {
    let documents: Vec<&ManifestItem> = manifest.iter().filter(|m| m.is_document()).collect();

    spine
        .iter()
        .filter_map(|idref| {
            let found = documents
                .iter()
                .find(|item| item.id == *idref)
                .or_else(|| documents.iter().find(|item| item.path.ends_with(idref.as_str())))
                .copied();
            if found.is_none() {
                tracing::warn!(idref = %idref, "spine entry does not resolve to a document, skipping");
            }
            found
        })
        .collect()
}

/// Spine-ordered structural extractor.
#[derive(Debug, Clone, Default)]
pub struct EpubExtractor {
    options: ExtractOptions,
}

impl EpubExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract chapters from an EPUB file on disk.
    ///
    /// Fails only when the container cannot be opened or when no chapter
    /// survives cleaning.
    pub fn extract_path(&self, path: &Path) -> LibraryResult<ExtractedBook> {
        let origin = path.display().to_string();
        let doc = EpubDoc::new(path).map_err(|e| LibraryError::ParseError {
            path: origin.clone(),
            message: e.to_string(),
        })?;
        self.extract_doc(doc, &origin)
    }

    /// Extract chapters from in-memory EPUB bytes.
    pub fn extract_bytes(&self, data: &[u8]) -> LibraryResult<ExtractedBook> {
        let cursor = std::io::Cursor::new(data.to_vec());
        let doc = EpubDoc::from_reader(cursor).map_err(|e| LibraryError::ParseError {
            path: "(bytes)".into(),
            message: e.to_string(),
        })?;
        self.extract_doc(doc, "(bytes)")
    }

    fn extract_doc<R: Read + Seek>(
        &self,
        mut doc: EpubDoc<R>,
        origin: &str,
    ) -> LibraryResult<ExtractedBook> {
        let metadata = BookMetadata {
            title: doc.mdata("title").map(|m| m.value.clone()),
            author: doc.mdata("creator").map(|m| m.value.clone()),
            description: doc.mdata("description").map(|m| m.value.clone()),
            language: doc.mdata("language").map(|m| m.value.clone()),
        };

        let spine: Vec<String> = doc.spine.iter().map(|item| item.idref.clone()).collect();
        let mut manifest: Vec<ManifestItem> = doc
            .resources
            .iter()
            .map(|(id, item)| ManifestItem {
                id: id.clone(),
                path: item.path.to_string_lossy().into_owned(),
                mime: item.mime.clone(),
            })
            .collect();
        // `resources` is a hash map; sort so the suffix fallback is stable.
        manifest.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.id.cmp(&b.id)));

        let resolved: Vec<String> = resolve_spine(&spine, &manifest)
            .into_iter()
            .map(|item| item.id.clone())
            .collect();

        let mut chapters = Vec::new();
        for id in &resolved {
            let Some((bytes, _mime)) = doc.get_resource(id) else {
                tracing::warn!(id = %id, "spine document could not be read, skipping");
                continue;
            };
            let html = String::from_utf8_lossy(&bytes);
            if let Some(chapter) = self.clean_document(&html) {
                chapters.push(chapter);
            }
        }

        tracing::debug!(
            spine = spine.len(),
            resolved = resolved.len(),
            chapters = chapters.len(),
            "epub extracted"
        );

        if chapters.is_empty() {
            return Err(LibraryError::NoContentExtracted {
                origin: origin.into(),
            });
        }

        Ok(ExtractedBook { metadata, chapters })
    }

    /// Clean one spine document; `None` when no paragraph survives.
    pub fn clean_document(&self, html: &str) -> Option<Chapter> {
        let chapter = html_to_chapter(html, &self.options);
        (!chapter.paragraphs.is_empty()).then_some(chapter)
    }
}
