//! Shared fixtures: a minimal EPUB writer and scripted service doubles.

#![allow(dead_code)]

use std::cell::Cell;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use booklens::analysis::{AnalysisError, AnalysisResult, Embedder, EmbeddingVector, TagExtractor, TagRecord};

// ── EPUB fixture ────────────────────────────────────────────────────────

/// Zip archive with every entry stored uncompressed.
fn stored_zip(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

const CONTAINER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

/// A chapter for the fixture: heading plus paragraphs.
pub struct FixtureChapter {
    pub title: &'static str,
    pub paragraphs: Vec<String>,
}

/// Build an EPUB 2 container with one XHTML document per chapter, in order.
pub fn epub_bytes(title: &str, author: &str, chapters: &[FixtureChapter]) -> Vec<u8> {
    let mut manifest = String::from(
        r#"    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
"#,
    );
    let mut spine = String::new();
    let mut nav = String::new();
    let mut documents = Vec::new();

    for (i, chapter) in chapters.iter().enumerate() {
        let n = i + 1;
        manifest.push_str(&format!(
            "    <item id=\"ch{n}\" href=\"ch{n}.xhtml\" media-type=\"application/xhtml+xml\"/>\n"
        ));
        spine.push_str(&format!("    <itemref idref=\"ch{n}\"/>\n"));
        nav.push_str(&format!(
            "    <navPoint id=\"np{n}\" playOrder=\"{n}\"><navLabel><text>{}</text></navLabel><content src=\"ch{n}.xhtml\"/></navPoint>\n",
            chapter.title
        ));

        let body: String = chapter
            .paragraphs
            .iter()
            .map(|p| format!("<p>{p}</p>\n"))
            .collect();
        let xhtml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<html xmlns=\"http://www.w3.org/1999/xhtml\">\n<head><title>{t}</title><style>p {{ margin: 0 }}</style></head>\n<body>\n<h1>{t}</h1>\n{body}</body>\n</html>\n",
            t = chapter.title
        );
        documents.push((format!("OEBPS/ch{n}.xhtml"), xhtml.into_bytes()));
    }

    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="bookid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>{title}</dc:title>
    <dc:creator>{author}</dc:creator>
    <dc:language>en</dc:language>
    <dc:identifier id="bookid">urn:uuid:00000000-0000-0000-0000-000000000001</dc:identifier>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine toc="ncx">
{spine}  </spine>
</package>
"#
    );
    let ncx = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="urn:uuid:00000000-0000-0000-0000-000000000001"/></head>
  <docTitle><text>{title}</text></docTitle>
  <navMap>
{nav}  </navMap>
</ncx>
"#
    );

    let mut entries: Vec<(&str, Vec<u8>)> = vec![
        ("mimetype", b"application/epub+zip".to_vec()),
        ("META-INF/container.xml", CONTAINER.as_bytes().to_vec()),
        ("OEBPS/content.opf", opf.into_bytes()),
        ("OEBPS/toc.ncx", ncx.into_bytes()),
    ];
    for (name, data) in &documents {
        entries.push((name.as_str(), data.clone()));
    }
    stored_zip(&entries)
}

/// `count` paragraphs of `words` words each, distinct per chapter.
pub fn paragraphs(chapter: usize, count: usize, words: usize) -> Vec<String> {
    (0..count)
        .map(|p| {
            (0..words)
                .map(|w| format!("c{chapter}p{p}w{w}"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// Write a three-chapter fixture book into `dir` and return its path.
pub fn write_fixture_epub(dir: &Path) -> PathBuf {
    let chapters = vec![
        FixtureChapter {
            title: "The Beginning",
            paragraphs: paragraphs(1, 12, 30),
        },
        FixtureChapter {
            title: "The Middle",
            paragraphs: paragraphs(2, 12, 30),
        },
        FixtureChapter {
            title: "The End",
            paragraphs: paragraphs(3, 12, 30),
        },
    ];
    let path = dir.join("fixture.epub");
    std::fs::write(&path, epub_bytes("Fixture Book", "Test Author", &chapters)).unwrap();
    path
}

// ── Service doubles ─────────────────────────────────────────────────────

/// Returns the same tags for every chunk; fails on the listed call numbers
/// (0-based).
pub struct ScriptedTagger {
    pub reply: &'static str,
    pub fail_on: Vec<usize>,
    pub calls: Rc<Cell<usize>>,
}

impl ScriptedTagger {
    pub fn always(reply: &'static str) -> Self {
        Self {
            reply,
            fail_on: Vec::new(),
            calls: Rc::default(),
        }
    }
}

impl TagExtractor for ScriptedTagger {
    fn extract(&self, _chunk: &str) -> AnalysisResult<TagRecord> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        if self.fail_on.contains(&call) {
            return Err(AnalysisError::ServiceStatus {
                service: "tagging".into(),
                status: 500,
                body: "scripted failure".into(),
            });
        }
        booklens::analysis::parse_tag_content(self.reply)
    }
}

/// Returns vectors in sequence, cycling; `None` entries fail the call.
pub struct ScriptedEmbedder {
    pub vectors: Vec<Option<EmbeddingVector>>,
    pub calls: Rc<Cell<usize>>,
}

impl ScriptedEmbedder {
    pub fn new(vectors: Vec<Option<EmbeddingVector>>) -> Self {
        Self {
            vectors,
            calls: Rc::default(),
        }
    }
}

impl Embedder for ScriptedEmbedder {
    fn embed(&self, _text: &str) -> AnalysisResult<EmbeddingVector> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        match &self.vectors[call % self.vectors.len()] {
            Some(vector) => Ok(vector.clone()),
            None => Err(AnalysisError::Transport {
                service: "embedding".into(),
                message: "scripted failure".into(),
            }),
        }
    }
}
