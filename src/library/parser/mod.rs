//! Structural extraction: EPUB container → ordered chapters → flat text.
//!
//! `epub` reads the package (manifest + spine) and hands each spine
//! document to `html`, which cleans it into a `Chapter`. The chapter list
//! is serialized to plain text with `chapters_to_text` for chunking.

pub mod epub;
pub mod html;

use serde::{Deserialize, Serialize};

use crate::library::error::{LibraryError, LibraryResult};
use crate::library::model::Chapter;

pub use self::epub::{EpubExtractor, ManifestItem, resolve_spine};
pub use self::html::html_to_chapter;

/// Cleaning knobs for structural extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractOptions {
    /// Render hyperlinks as `[text](href)` instead of bare text.
    #[serde(default)]
    pub keep_links: bool,
    /// Keep footnote bodies and footnote reference anchors.
    #[serde(default)]
    pub keep_footnotes: bool,
    /// Paragraphs shorter than this many characters are dropped.
    #[serde(default = "default_min_paragraph_len")]
    pub min_paragraph_len: usize,
    /// Collapse soft line breaks inside a paragraph into spaces.
    #[serde(default)]
    pub join_lines: bool,
}

fn default_min_paragraph_len() -> usize {
    8
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            keep_links: false,
            keep_footnotes: false,
            min_paragraph_len: default_min_paragraph_len(),
            join_lines: false,
        }
    }
}

/// Reject anything that is not an `.epub` path before any work starts.
pub fn ensure_epub(path: &str) -> LibraryResult<()> {
    if path.to_lowercase().ends_with(".epub") {
        Ok(())
    } else {
        Err(LibraryError::UnsupportedFormat { path: path.into() })
    }
}

/// Flatten chapters into plain text.
///
/// Each chapter emits an optional `## <title>` line, then its paragraphs,
/// every entry followed by a blank line. The output ends with one newline.
pub fn chapters_to_text(chapters: &[Chapter]) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut headings = Vec::with_capacity(chapters.len());
    for chapter in chapters {
        let title = chapter.title.trim();
        headings.push(if title.is_empty() {
            None
        } else {
            Some(format!("## {title}"))
        });
    }

    for (chapter, heading) in chapters.iter().zip(&headings) {
        if let Some(heading) = heading {
            lines.push(heading);
            lines.push("");
        }
        for paragraph in &chapter.paragraphs {
            lines.push(paragraph);
            lines.push("");
        }
    }

    let mut text = lines.join("\n").trim().to_string();
    text.push('\n');
    text
}

/// Serialize chapters as a JSON array of `{title, paragraphs}`.
pub fn chapters_to_json(chapters: &[Chapter]) -> LibraryResult<String> {
    serde_json::to_string_pretty(chapters).map_err(|e| LibraryError::Io {
        source: std::io::Error::other(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(title: &str, paragraphs: &[&str]) -> Chapter {
        Chapter {
            title: title.into(),
            paragraphs: paragraphs.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn epub_extension_required() {
        assert!(ensure_epub("novel.epub").is_ok());
        assert!(ensure_epub("NOVEL.EPUB").is_ok());
        let err = ensure_epub("novel.pdf").unwrap_err();
        assert!(matches!(err, LibraryError::UnsupportedFormat { .. }));
    }

    #[test]
    fn text_serialization_layout() {
        let chapters = vec![
            chapter("Opening", &["# Opening", "First paragraph."]),
            chapter("", &["Untitled chapter paragraph."]),
        ];
        let text = chapters_to_text(&chapters);
        assert_eq!(
            text,
            "## Opening\n\n# Opening\n\nFirst paragraph.\n\nUntitled chapter paragraph.\n"
        );
    }

    #[test]
    fn empty_chapter_list_serializes_to_newline() {
        assert_eq!(chapters_to_text(&[]), "\n");
    }

    #[test]
    fn json_export_shape() {
        let json = chapters_to_json(&[chapter("T", &["Paragraph one."])]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["title"], "T");
        assert_eq!(value[0]["paragraphs"][0], "Paragraph one.");
    }

    #[test]
    fn options_defaults_from_empty_toml() {
        let opts: ExtractOptions = toml::from_str("").unwrap();
        assert_eq!(opts, ExtractOptions::default());
        assert_eq!(opts.min_paragraph_len, 8);
    }
}
