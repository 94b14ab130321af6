//! XHTML spine document cleaning using the `scraper` crate.
//!
//! Turns one content document into a `Chapter`: script/style/nav subtrees
//! and (by default) footnotes are skipped, `<br>` becomes a line break,
//! block elements become paragraphs, and headings keep a `#` marker.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node};

use crate::library::model::Chapter;
use crate::library::parser::ExtractOptions;

/// Elements whose whole subtree never contributes text.
const DROPPED_TAGS: [&str; 3] = ["script", "style", "nav"];

/// Anchor targets that mark footnote references.
const FOOTNOTE_HREF_PREFIXES: [&str; 3] = ["#fn", "#footnote", "#note"];

/// Horizontal whitespace runs, including non-breaking spaces.
static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("static regex"));

/// Clean one XHTML document into a chapter.
///
/// The returned chapter may have no paragraphs; callers drop those.
pub fn html_to_chapter(html: &str, options: &ExtractOptions) -> Chapter {
    let document = Html::parse_document(html);
    let mut walker = BlockWalker {
        options,
        title: None,
        paragraphs: Vec::new(),
    };
    walker.visit(document.root_element());

    Chapter {
        title: walker.title.unwrap_or_default(),
        paragraphs: walker.paragraphs,
    }
}

struct BlockWalker<'o> {
    options: &'o ExtractOptions,
    title: Option<String>,
    paragraphs: Vec<String>,
}

impl BlockWalker<'_> {
    /// Pre-order walk. Nested blocks (a `<p>` inside an `<li>`) are emitted
    /// after their container, matching document order.
    fn visit(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            let Some(child) = ElementRef::wrap(child) else {
                continue;
            };
            if is_removed(child, self.options) {
                continue;
            }

            let name = child.value().name();
            if self.title.is_none() && matches!(name, "h1" | "h2" | "h3") {
                self.title = Some(collapse_whitespace(&inline_text(child, self.options)));
            }

            if is_block(name) {
                self.push_block(name, child);
            }

            self.visit(child);
        }
    }

    fn push_block(&mut self, name: &str, element: ElementRef<'_>) {
        let text = clean_text(&inline_text(element, self.options), self.options.join_lines);
        if text.is_empty() {
            return;
        }

        let text = match heading_level(name) {
            Some(level) => format!("{} {text}", "#".repeat(level)),
            None => text,
        };

        if text.chars().count() >= self.options.min_paragraph_len {
            self.paragraphs.push(text);
        }
    }
}

fn is_block(name: &str) -> bool {
    heading_level(name).is_some() || matches!(name, "p" | "li" | "blockquote" | "pre")
}

/// `h1`..`h6` → 1..6.
fn heading_level(name: &str) -> Option<usize> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn is_removed(element: ElementRef<'_>, options: &ExtractOptions) -> bool {
    let el = element.value();
    if DROPPED_TAGS.contains(&el.name()) {
        return true;
    }
    !options.keep_footnotes && is_footnote(element)
}

fn is_footnote(element: ElementRef<'_>) -> bool {
    let el = element.value();
    if el.attr("role") == Some("doc-footnote") {
        return true;
    }
    if el
        .attr("epub:type")
        .is_some_and(|t| t.split_whitespace().any(|tok| tok == "footnote"))
    {
        return true;
    }
    if el.classes().any(|c| c == "footnote") {
        return true;
    }
    el.name() == "a"
        && el
            .attr("href")
            .is_some_and(|href| FOOTNOTE_HREF_PREFIXES.iter().any(|p| href.starts_with(p)))
}

/// Visible text of an element with `<br>` as `\n`.
///
/// Hyperlinks contribute their visible text, or `[text](href)` when
/// `keep_links` is set.
fn inline_text(element: ElementRef<'_>, options: &ExtractOptions) -> String {
    let mut out = String::new();
    append_inline(element, options, &mut out);
    out
}

fn append_inline(element: ElementRef<'_>, options: &ExtractOptions, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                if is_removed(child, options) {
                    continue;
                }
                match el.name() {
                    "br" => out.push('\n'),
                    "a" if options.keep_links => match el.attr("href") {
                        Some(href) => {
                            let label = collapse_whitespace(&inline_text(child, options));
                            out.push_str(&format!("[{label}]({href})"));
                        }
                        None => append_inline(child, options, out),
                    },
                    _ => append_inline(child, options, out),
                }
            }
            _ => {}
        }
    }
}

/// Normalize a paragraph: non-breaking spaces and whitespace runs become a
/// single space, each line is trimmed, blank lines vanish.
fn clean_text(raw: &str, join_lines: bool) -> String {
    let normalized = raw.replace('\u{a0}', " ");
    let lines = normalized
        .lines()
        .map(|line| HORIZONTAL_WS.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty());

    let separator = if join_lines { " " } else { "\n" };
    lines.collect::<Vec<_>>().join(separator)
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
