//! FTML helpers for question and answer text.
//!
//! Node text is stored as FTML markup. Authors may also end up with plain
//! text in a manifest (hand edits, placeholders); anything that does not
//! parse as FTML is treated as plain text, one paragraph per line.

use tdoc::{Document, Paragraph, Span, parse, writer::Writer};
use tracing::warn;

/// Parses `markup` into a document, falling back to plain-text paragraphs.
pub fn to_document(markup: &str) -> Document {
    let trimmed = markup.trim();
    if trimmed.is_empty() {
        return Document::new().with_paragraphs(vec![Paragraph::new_text()]);
    }

    if trimmed.starts_with('<')
        && let Ok(document) = parse(std::io::Cursor::new(trimmed.to_string()))
    {
        // Cleared text serializes as an empty paragraph; keep it empty.
        if document.paragraphs.is_empty() {
            return Document::new().with_paragraphs(vec![Paragraph::new_text()]);
        }
        return document;
    }

    let paragraphs = trimmed
        .lines()
        .map(|line| Paragraph::new_text().with_content(vec![Span::new_text(line)]))
        .collect();
    Document::new().with_paragraphs(paragraphs)
}

/// Serializes `document` as FTML. Returns `None` when the writer fails.
pub fn to_markup(document: &Document) -> Option<String> {
    match Writer::new().write_to_string(document) {
        Ok(markup) => Some(markup),
        Err(err) => {
            warn!(error = %err, "failed to render FTML");
            None
        }
    }
}

/// The canonical FTML form of `markup`.
pub fn normalize(markup: &str) -> String {
    to_markup(&to_document(markup)).unwrap_or_else(|| markup.to_string())
}

/// Text content of `markup` with paragraphs joined by newlines.
pub fn plain_text(markup: &str) -> String {
    document_text(&to_document(markup))
}

pub fn document_text(document: &Document) -> String {
    let mut lines = Vec::new();
    for paragraph in &document.paragraphs {
        collect_paragraph_lines(paragraph, &mut lines);
    }
    lines.join("\n")
}

pub fn spans_text(spans: &[Span]) -> String {
    let mut text = String::new();
    push_spans_text(spans, &mut text);
    text
}

fn push_spans_text(spans: &[Span], out: &mut String) {
    for span in spans {
        out.push_str(&span.text);
        push_spans_text(&span.children, out);
    }
}

/// Single-line rendering of one paragraph including nested content.
pub fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut lines = Vec::new();
    collect_paragraph_lines(paragraph, &mut lines);
    lines.join(" / ")
}

fn collect_paragraph_lines(paragraph: &Paragraph, lines: &mut Vec<String>) {
    let content = spans_text(paragraph.content());
    if !content.is_empty() {
        lines.push(content);
    }
    for child in paragraph.children() {
        collect_paragraph_lines(child, lines);
    }
    for entry in paragraph.entries() {
        for nested in entry {
            collect_paragraph_lines(nested, lines);
        }
    }
    for item in paragraph.checklist_items() {
        let mut line = spans_text(&item.content);
        for nested in &item.children {
            let nested_text = spans_text(&nested.content);
            if !nested_text.is_empty() {
                line.push(' ');
                line.push_str(&nested_text);
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
}
