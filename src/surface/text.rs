use tdoc::{Document, InlineStyle, Paragraph, Span};

use super::EditSurface;
use crate::block::BlockId;
use crate::markup;

/// Cursor inside the text surface: a top-level paragraph and a character
/// offset into that paragraph's text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextCursor {
    pub paragraph: usize,
    pub offset: usize,
}

/// Rich-text surface. Holds an FTML document while attached; leaf paragraphs
/// at the top level are editable, everything else is carried through as is.
#[derive(Debug)]
pub struct TextSurface {
    target: Option<BlockId>,
    document: Document,
    cursor: TextCursor,
    seed: String,
}

impl Default for TextSurface {
    fn default() -> Self {
        Self {
            target: None,
            document: Document::new(),
            cursor: TextCursor::default(),
            seed: String::new(),
        }
    }
}

impl EditSurface for TextSurface {
    type Seed = str;
    type Value = String;

    fn attach_to(&mut self, target: BlockId, initial: &str) {
        self.detach();

        let mut document = markup::to_document(initial);
        for paragraph in &mut document.paragraphs {
            if paragraph.paragraph_type().is_leaf() {
                let spans = std::mem::take(paragraph.content_mut());
                *paragraph.content_mut() = flatten_spans(spans, InlineStyle::None);
            }
        }
        if !document
            .paragraphs
            .iter()
            .any(|p| p.paragraph_type().is_leaf())
        {
            document.paragraphs.push(Paragraph::new_text());
        }

        self.document = document;
        self.seed = initial.to_string();
        self.target = Some(target);
        let first = self.first_editable().unwrap_or(0);
        self.cursor = TextCursor {
            paragraph: first,
            offset: self.paragraph_len(first),
        };
    }

    fn detach(&mut self) {
        self.target = None;
        self.document = Document::new();
        self.cursor = TextCursor::default();
        self.seed.clear();
    }

    fn target(&self) -> Option<BlockId> {
        self.target
    }

    fn current_value(&self) -> String {
        self.content()
    }
}

impl TextSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live FTML content.
    pub fn content(&self) -> String {
        if self.target.is_none() {
            return String::new();
        }
        markup::to_markup(&self.document).unwrap_or_else(|| self.seed.clone())
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn cursor(&self) -> TextCursor {
        self.cursor
    }

    /// One display line per top-level paragraph.
    pub fn lines(&self) -> Vec<String> {
        self.document
            .paragraphs
            .iter()
            .map(|paragraph| {
                if paragraph.paragraph_type().is_leaf() {
                    own_text(paragraph.content())
                } else {
                    markup::paragraph_text(paragraph)
                }
            })
            .collect()
    }

    pub fn plain_text(&self) -> String {
        self.lines().join("\n")
    }

    pub fn insert_char(&mut self, ch: char) -> bool {
        if self.target.is_none() {
            return false;
        }
        if ch == '\n' {
            return self.insert_paragraph_break();
        }
        let TextCursor { paragraph, offset } = self.cursor;
        let Some(spans) = self.editable_spans_mut(paragraph) else {
            return false;
        };
        if spans.is_empty() {
            spans.push(Span::new_text(""));
        }
        let Some((span_index, span_offset)) = locate_insert(spans, offset) else {
            return false;
        };
        let text = &mut spans[span_index].text;
        let byte_idx = char_to_byte_idx(text, span_offset);
        text.insert(byte_idx, ch);
        self.cursor.offset += 1;
        true
    }

    pub fn insert_str(&mut self, text: &str) -> bool {
        let mut changed = false;
        for ch in text.chars() {
            changed |= self.insert_char(ch);
        }
        changed
    }

    pub fn backspace(&mut self) -> bool {
        if self.target.is_none() {
            return false;
        }
        let TextCursor { paragraph, offset } = self.cursor;
        if offset == 0 {
            return self.merge_into_previous(paragraph);
        }
        if self.remove_char(paragraph, offset - 1) {
            self.cursor.offset -= 1;
            true
        } else {
            false
        }
    }

    pub fn delete(&mut self) -> bool {
        if self.target.is_none() {
            return false;
        }
        let TextCursor { paragraph, offset } = self.cursor;
        if offset < self.paragraph_len(paragraph) {
            return self.remove_char(paragraph, offset);
        }
        // Merging leaves the cursor at the join point, which is where it is now.
        self.merge_into_previous(paragraph + 1)
    }

    pub fn insert_paragraph_break(&mut self) -> bool {
        let TextCursor { paragraph, offset } = self.cursor;
        let Some(spans) = self.editable_spans_mut(paragraph) else {
            return false;
        };
        let tail = split_spans_at(spans, offset);
        if spans.is_empty() {
            spans.push(Span::new_text(""));
        }
        let tail = if tail.is_empty() {
            vec![Span::new_text("")]
        } else {
            tail
        };
        self.document
            .paragraphs
            .insert(paragraph + 1, Paragraph::new_text().with_content(tail));
        self.cursor = TextCursor {
            paragraph: paragraph + 1,
            offset: 0,
        };
        true
    }

    pub fn move_left(&mut self) -> bool {
        if self.cursor.offset > 0 {
            self.cursor.offset -= 1;
            return true;
        }
        match self.previous_editable(self.cursor.paragraph) {
            Some(previous) => {
                self.cursor = TextCursor {
                    paragraph: previous,
                    offset: self.paragraph_len(previous),
                };
                true
            }
            None => false,
        }
    }

    pub fn move_right(&mut self) -> bool {
        if self.cursor.offset < self.paragraph_len(self.cursor.paragraph) {
            self.cursor.offset += 1;
            return true;
        }
        match self.next_editable(self.cursor.paragraph) {
            Some(next) => {
                self.cursor = TextCursor {
                    paragraph: next,
                    offset: 0,
                };
                true
            }
            None => false,
        }
    }

    pub fn move_up(&mut self) -> bool {
        let Some(previous) = self.previous_editable(self.cursor.paragraph) else {
            return false;
        };
        self.cursor = TextCursor {
            paragraph: previous,
            offset: self.cursor.offset.min(self.paragraph_len(previous)),
        };
        true
    }

    pub fn move_down(&mut self) -> bool {
        let Some(next) = self.next_editable(self.cursor.paragraph) else {
            return false;
        };
        self.cursor = TextCursor {
            paragraph: next,
            offset: self.cursor.offset.min(self.paragraph_len(next)),
        };
        true
    }

    pub fn move_home(&mut self) -> bool {
        let moved = self.cursor.offset != 0;
        self.cursor.offset = 0;
        moved
    }

    pub fn move_end(&mut self) -> bool {
        let end = self.paragraph_len(self.cursor.paragraph);
        let moved = self.cursor.offset != end;
        self.cursor.offset = end;
        moved
    }

    fn is_editable(&self, paragraph: usize) -> bool {
        self.document
            .paragraphs
            .get(paragraph)
            .is_some_and(|p| p.paragraph_type().is_leaf())
    }

    fn first_editable(&self) -> Option<usize> {
        (0..self.document.paragraphs.len()).find(|&idx| self.is_editable(idx))
    }

    fn previous_editable(&self, paragraph: usize) -> Option<usize> {
        (0..paragraph).rev().find(|&idx| self.is_editable(idx))
    }

    fn next_editable(&self, paragraph: usize) -> Option<usize> {
        (paragraph + 1..self.document.paragraphs.len()).find(|&idx| self.is_editable(idx))
    }

    fn paragraph_len(&self, paragraph: usize) -> usize {
        self.document
            .paragraphs
            .get(paragraph)
            .filter(|p| p.paragraph_type().is_leaf())
            .map(|p| own_text(p.content()).chars().count())
            .unwrap_or(0)
    }

    fn editable_spans_mut(&mut self, paragraph: usize) -> Option<&mut Vec<Span>> {
        let paragraph = self.document.paragraphs.get_mut(paragraph)?;
        if !paragraph.paragraph_type().is_leaf() {
            return None;
        }
        Some(paragraph.content_mut())
    }

    fn remove_char(&mut self, paragraph: usize, char_index: usize) -> bool {
        let Some(spans) = self.editable_spans_mut(paragraph) else {
            return false;
        };
        let mut consumed = 0;
        for index in 0..spans.len() {
            let len = spans[index].text.chars().count();
            if char_index < consumed + len {
                let removed = remove_char_from_text(&mut spans[index].text, char_index - consumed);
                if removed && spans[index].text.is_empty() && spans.len() > 1 {
                    spans.remove(index);
                }
                return removed;
            }
            consumed += len;
        }
        false
    }

    /// Appends paragraph `paragraph` to the previous one when both are
    /// editable and adjacent.
    fn merge_into_previous(&mut self, paragraph: usize) -> bool {
        if paragraph == 0 || !self.is_editable(paragraph) || !self.is_editable(paragraph - 1) {
            return false;
        }
        let joined_at = self.paragraph_len(paragraph - 1);
        let mut removed = self.document.paragraphs.remove(paragraph);
        let moved = std::mem::take(removed.content_mut());
        if let Some(previous) = self.editable_spans_mut(paragraph - 1) {
            previous.extend(moved.into_iter().filter(|span| !span.text.is_empty()));
            if previous.is_empty() {
                previous.push(Span::new_text(""));
            }
        }
        self.cursor = TextCursor {
            paragraph: paragraph - 1,
            offset: joined_at,
        };
        true
    }
}

fn own_text(spans: &[Span]) -> String {
    spans.iter().map(|span| span.text.as_str()).collect()
}

/// Lifts nested spans to the top level so every character of a leaf
/// paragraph lives in exactly one span's `text`. Unstyled children inherit
/// the style of their parent.
fn flatten_spans(spans: Vec<Span>, inherited: InlineStyle) -> Vec<Span> {
    let mut flat = Vec::with_capacity(spans.len());
    for mut span in spans {
        if span.style == InlineStyle::None {
            span.style = inherited;
        }
        let children = std::mem::take(&mut span.children);
        let style = span.style;
        if !span.text.is_empty() || children.is_empty() {
            flat.push(span);
        }
        flat.extend(flatten_spans(children, style));
    }
    flat
}

/// Span and in-span offset where a character typed at `offset` goes. Offsets
/// on a boundary land at the end of the earlier span.
fn locate_insert(spans: &[Span], offset: usize) -> Option<(usize, usize)> {
    let mut consumed = 0;
    for (index, span) in spans.iter().enumerate() {
        let len = span.text.chars().count();
        if offset <= consumed + len {
            return Some((index, offset - consumed));
        }
        consumed += len;
    }
    spans
        .len()
        .checked_sub(1)
        .map(|last| (last, spans[last].text.chars().count()))
}

/// Splits `spans` at character `offset`, returning everything after it.
fn split_spans_at(spans: &mut Vec<Span>, offset: usize) -> Vec<Span> {
    let mut consumed = 0;
    for index in 0..spans.len() {
        let len = spans[index].text.chars().count();
        if offset <= consumed + len {
            let split_at = offset - consumed;
            let mut tail = spans.split_off(index + 1);
            if split_at < len {
                let byte_idx = char_to_byte_idx(&spans[index].text, split_at);
                let mut moved = spans[index].clone();
                moved.text = spans[index].text[byte_idx..].to_string();
                spans[index].text.truncate(byte_idx);
                tail.insert(0, moved);
                if spans[index].text.is_empty() && spans.len() > 1 {
                    spans.remove(index);
                }
            }
            return tail;
        }
        consumed += len;
    }
    Vec::new()
}

fn remove_char_from_text(text: &mut String, offset: usize) -> bool {
    let char_len = text.chars().count();
    if offset >= char_len {
        return false;
    }
    let start = char_to_byte_idx(text, offset);
    let end = char_to_byte_idx(text, offset + 1);
    if start >= end || end > text.len() {
        return false;
    }
    text.drain(start..end);
    true
}

fn char_to_byte_idx(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map(|(byte_idx, _)| byte_idx)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attached(text: &str) -> TextSurface {
        let mut surface = TextSurface::new();
        surface.attach_to(BlockId::new(), text);
        surface
    }

    #[test]
    fn attach_places_cursor_at_end_of_first_paragraph() {
        let surface = attached("Hello");
        assert_eq!(surface.cursor(), TextCursor { paragraph: 0, offset: 5 });
        assert_eq!(surface.plain_text(), "Hello");
    }

    #[test]
    fn content_is_stable_right_after_attach() {
        let surface = attached("Capital of France?");
        assert_eq!(surface.content(), surface.content());
        assert_eq!(markup::plain_text(&surface.content()), "Capital of France?");
    }

    #[test]
    fn typing_and_backspace_edit_text() {
        let mut surface = attached("Hell");
        assert!(surface.insert_char('o'));
        assert!(surface.insert_char('!'));
        assert_eq!(surface.plain_text(), "Hello!");
        assert!(surface.backspace());
        assert_eq!(surface.plain_text(), "Hello");
        assert!(surface.move_home());
        assert!(!surface.backspace());
        assert!(surface.delete());
        assert_eq!(surface.plain_text(), "ello");
    }

    #[test]
    fn enter_splits_and_backspace_joins_paragraphs() {
        let mut surface = attached("ab");
        surface.move_left();
        assert!(surface.insert_char('\n'));
        assert_eq!(surface.lines(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(surface.cursor(), TextCursor { paragraph: 1, offset: 0 });

        assert!(surface.backspace());
        assert_eq!(surface.lines(), vec!["ab".to_string()]);
        assert_eq!(surface.cursor(), TextCursor { paragraph: 0, offset: 1 });
    }

    #[test]
    fn delete_at_paragraph_end_pulls_next_paragraph_up() {
        let mut surface = attached("one\ntwo");
        surface.move_end();
        assert!(surface.delete());
        assert_eq!(surface.lines(), vec!["onetwo".to_string()]);
        assert_eq!(surface.cursor(), TextCursor { paragraph: 0, offset: 3 });
    }

    #[test]
    fn vertical_movement_clamps_offset() {
        let mut surface = attached("long first line\nab");
        surface.move_end();
        assert!(surface.move_down());
        assert_eq!(surface.cursor(), TextCursor { paragraph: 1, offset: 2 });
        assert!(!surface.move_down());
        assert!(surface.move_up());
        assert_eq!(surface.cursor().paragraph, 0);
    }

    #[test]
    fn multibyte_characters_are_handled_per_char() {
        let mut surface = attached("née");
        assert!(surface.backspace());
        assert_eq!(surface.plain_text(), "né");
        assert!(surface.backspace());
        assert_eq!(surface.plain_text(), "n");
    }

    #[test]
    fn save_hands_back_content_once() {
        let mut surface = TextSurface::new();
        let block = BlockId::new();
        surface.attach_to(block, "Question");
        surface.insert_char('?');
        let expected = surface.content();

        match surface.save() {
            Some(crate::surface::Completion::Save { target, value }) => {
                assert_eq!(target, block);
                assert_eq!(value, expected);
            }
            other => panic!("unexpected completion {other:?}"),
        }
        assert!(surface.target().is_none());
        assert!(surface.save().is_none());
        assert!(surface.cancel().is_none());
    }

    #[test]
    fn reattaching_drops_previous_target() {
        let mut surface = TextSurface::new();
        let first = BlockId::new();
        let second = BlockId::new();
        surface.attach_to(first, "one");
        surface.attach_to(second, "two");
        assert!(surface.is_attached_to(second));
        assert!(!surface.is_attached_to(first));
        assert_eq!(surface.plain_text(), "two");
    }

    #[test]
    fn flatten_lifts_children_with_inherited_style() {
        let mut outer = Span::new_text("bold ");
        outer.style = InlineStyle::Bold;
        outer.children.push(Span::new_text("child"));
        let flat = flatten_spans(vec![outer], InlineStyle::None);
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[1].text, "child");
        assert_eq!(flat[1].style, InlineStyle::Bold);
        assert!(flat.iter().all(|span| span.children.is_empty()));
    }
}
