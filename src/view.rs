//! Renders the block list into terminal lines.
//!
//! Text is split into word and whitespace tokens and wrapped at the view
//! width, measuring with `unicode-width`. Rich-text styling is not shown;
//! each block gets one style for its whole body.

use ratatui::{
    style::Style,
    text::{Line, Span},
};
use unicode_width::UnicodeWidthChar;

use crate::block::{AnswerBlock, Block, BlockId, QuestionBlock};
use crate::manager::DocumentManager;
use crate::model::{Image, Question};
use crate::surface::{ImageDraft, Surfaces, TextSurface};
use crate::theme::Theme;

const SOURCE_PREVIEW_CHARS: usize = 40;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorVisualPosition {
    pub line: usize,
    pub column: u16,
}

#[derive(Debug)]
pub struct RenderResult {
    pub lines: Vec<Line<'static>>,
    pub cursor: Option<CursorVisualPosition>,
    pub total_lines: usize,
    /// First line of every rendered block.
    pub block_lines: Vec<(BlockId, usize)>,
}

impl RenderResult {
    pub fn line_of(&self, block: BlockId) -> Option<usize> {
        self.block_lines
            .iter()
            .find(|(id, _)| *id == block)
            .map(|(_, line)| *line)
    }
}

/// Selection state owned by the terminal front end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewState {
    pub selected: Option<BlockId>,
    pub grabbed: Option<BlockId>,
}

pub fn render_test(
    manager: &DocumentManager,
    width: usize,
    view: ViewState,
    theme: &Theme,
) -> RenderResult {
    let mut renderer = Renderer::new(width.max(1), view, theme);
    renderer.render(manager);
    renderer.finish()
}

/// Blocks in the order the cursor visits them: each question followed by
/// its answers unless the question is collapsed.
pub fn navigation_order(manager: &DocumentManager) -> Vec<BlockId> {
    let mut order = Vec::new();
    for block in manager.blocks() {
        order.push(block.id());
        if !block.state().is_collapsed() {
            order.extend(block.answers().iter().map(|answer| answer.id()));
        }
    }
    order
}

struct Renderer<'a> {
    wrap_width: usize,
    view: ViewState,
    theme: &'a Theme,
    lines: Vec<Line<'static>>,
    cursor: Option<CursorVisualPosition>,
    block_lines: Vec<(BlockId, usize)>,
}

impl<'a> Renderer<'a> {
    fn new(wrap_width: usize, view: ViewState, theme: &'a Theme) -> Self {
        Self {
            wrap_width,
            view,
            theme,
            lines: Vec::new(),
            cursor: None,
            block_lines: Vec::new(),
        }
    }

    fn render(&mut self, manager: &DocumentManager) {
        if manager.blocks().is_empty() {
            self.push_line("No questions yet. Press a to add one.", self.theme.hidden_style());
            return;
        }
        let surfaces = manager.surfaces();
        let pairs = manager.blocks().iter().zip(&manager.test().questions);
        for (index, (block, question)) in pairs.enumerate() {
            if index > 0 {
                self.push_line("", Style::default());
            }
            self.render_question(index, block, question, surfaces);
        }
    }

    fn block_style(&self, id: BlockId, base: Style, editing: bool) -> Style {
        if editing {
            self.theme.editing_style()
        } else if self.view.grabbed == Some(id) {
            base.patch(self.theme.grabbed_style())
        } else if self.view.selected == Some(id) {
            base.patch(self.theme.selection_style())
        } else {
            base
        }
    }

    fn render_question(
        &mut self,
        index: usize,
        block: &QuestionBlock,
        question: &Question,
        surfaces: &Surfaces,
    ) {
        let id = block.id();
        self.block_lines.push((id, self.lines.len()));

        let state = block.state();
        let base = if state.is_visible() {
            self.theme.question_style()
        } else {
            self.theme.hidden_style()
        };
        let fold = if state.is_collapsed() { '▸' } else { '▾' };
        let mut label = format!("{fold} Q{} ", index + 1);
        if !state.is_visible() {
            label.push_str("(hidden) ");
        }
        let continuation = " ".repeat(visible_width(&label));
        let style = self.block_style(id, base, block.is_editing());

        if block.is_editing_text() {
            self.render_text_surface(&surfaces.text, &label, &continuation, base, style);
        } else {
            let tokens = tokenize(state.preview(), None);
            let wrapped = wrap_tokens(&tokens, &label, &continuation, self.wrap_width);
            self.consume(wrapped, base, style);
        }

        if block.is_editing_image() {
            let summary = draft_summary(surfaces.image.image_data(), surfaces.image.is_ratio_locked());
            self.push_line(&format!("    {summary}"), self.theme.editing_style());
        } else if let Some(image) = &question.image {
            self.push_line(&format!("    {}", image_summary(image)), self.theme.image_style());
        }

        if state.is_collapsed() {
            if !block.answers().is_empty() {
                let folded = format!("    ({} answers folded)", block.answers().len());
                self.push_line(&folded, self.theme.hidden_style());
            }
            return;
        }
        for answer in block.answers() {
            self.render_answer(answer, surfaces);
        }
    }

    fn render_answer(&mut self, block: &AnswerBlock, surfaces: &Surfaces) {
        self.block_lines.push((block.id(), self.lines.len()));
        let (marker, marker_style) = if block.is_correct() {
            ("    [✓] ", self.theme.correct_style())
        } else {
            ("    [ ] ", self.theme.incorrect_style())
        };
        let continuation = " ".repeat(visible_width(marker));
        let style = self.block_style(block.id(), Style::default(), block.is_editing());

        if block.is_editing_text() {
            self.render_text_surface(&surfaces.text, marker, &continuation, marker_style, style);
        } else {
            let tokens = tokenize(block.state().preview(), None);
            let wrapped = wrap_tokens(&tokens, marker, &continuation, self.wrap_width);
            self.consume(wrapped, marker_style, style);
        }
    }

    fn render_text_surface(
        &mut self,
        surface: &TextSurface,
        first_prefix: &str,
        continuation: &str,
        prefix_style: Style,
        style: Style,
    ) {
        let cursor = surface.cursor();
        for (index, text) in surface.lines().iter().enumerate() {
            let prefix = if index == 0 { first_prefix } else { continuation };
            let offset = (index == cursor.paragraph).then_some(cursor.offset);
            let tokens = tokenize(text, offset);
            let wrapped = wrap_tokens(&tokens, prefix, continuation, self.wrap_width);
            self.consume(wrapped, prefix_style, style);
        }
    }

    fn consume(&mut self, wrapped: Vec<WrappedLine>, prefix_style: Style, style: Style) {
        for line in wrapped {
            if let Some(column) = line.cursor {
                self.cursor = Some(CursorVisualPosition {
                    line: self.lines.len(),
                    column,
                });
            }
            let mut spans = Vec::with_capacity(2);
            if !line.prefix.is_empty() {
                spans.push(Span::styled(line.prefix, prefix_style));
            }
            spans.push(Span::styled(line.body, style));
            self.lines.push(Line::from(spans));
        }
    }

    fn push_line(&mut self, content: &str, style: Style) {
        self.lines
            .push(Line::from(vec![Span::styled(content.to_string(), style)]));
    }

    fn finish(mut self) -> RenderResult {
        if self.lines.is_empty() {
            self.lines.push(Line::from(""));
        }
        let total_lines = self.lines.len();
        RenderResult {
            lines: self.lines,
            cursor: self.cursor,
            total_lines,
            block_lines: self.block_lines,
        }
    }
}

pub fn image_summary(image: &Image) -> String {
    if image.collapsed {
        return "[image folded]".to_string();
    }
    format!(
        "[image {} {}×{}]",
        short_source(&image.source),
        image.width,
        image.height
    )
}

fn draft_summary(draft: &ImageDraft, locked: bool) -> String {
    let source = draft
        .source
        .as_deref()
        .map(short_source)
        .unwrap_or_else(|| "(no image)".to_string());
    let ratio = if locked { "locked" } else { "free" };
    format!(
        "image: {source}  {}×{}  ratio {ratio}",
        draft.width, draft.height
    )
}

/// Data URIs get very long; show the head only.
fn short_source(source: &str) -> String {
    if source.chars().count() <= SOURCE_PREVIEW_CHARS {
        return source.to_string();
    }
    let mut short: String = source.chars().take(SOURCE_PREVIEW_CHARS - 1).collect();
    short.push('…');
    short
}

#[derive(Debug)]
struct Token {
    text: String,
    width: usize,
    blank: bool,
    /// Column of the cursor inside this token.
    cursor: Option<usize>,
}

impl Token {
    fn new(blank: bool) -> Self {
        Self {
            text: String::new(),
            width: 0,
            blank,
            cursor: None,
        }
    }
}

/// Splits `text` into runs of word and whitespace characters. `cursor` is a
/// character offset; an offset at the end of the text is kept too.
fn tokenize(text: &str, cursor: Option<usize>) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut count = 0;
    for (index, ch) in text.chars().enumerate() {
        count = index + 1;
        let ch = if ch == '\t' { ' ' } else { ch };
        let blank = ch.is_whitespace();
        if tokens.last().is_none_or(|token| token.blank != blank) {
            tokens.push(Token::new(blank));
        }
        if let Some(token) = tokens.last_mut() {
            if cursor == Some(index) {
                token.cursor = Some(token.width);
            }
            token.text.push(ch);
            token.width += UnicodeWidthChar::width(ch).unwrap_or(0);
        }
    }

    if cursor.is_some_and(|offset| offset >= count) {
        match tokens.last_mut() {
            Some(token) => token.cursor = Some(token.width),
            None => {
                let mut token = Token::new(false);
                token.cursor = Some(0);
                tokens.push(token);
            }
        }
    }
    tokens
}

#[derive(Debug, PartialEq)]
struct WrappedLine {
    prefix: String,
    body: String,
    cursor: Option<u16>,
}

struct LineBuilder {
    line: WrappedLine,
    width: usize,
}

impl LineBuilder {
    fn new(prefix: &str) -> Self {
        Self {
            line: WrappedLine {
                prefix: prefix.to_string(),
                body: String::new(),
                cursor: None,
            },
            width: visible_width(prefix),
        }
    }

    fn append(&mut self, token: &Token) {
        if let Some(offset) = token.cursor {
            self.line.cursor = Some(u16::try_from(self.width + offset).unwrap_or(u16::MAX));
        }
        self.line.body.push_str(&token.text);
        self.width += token.width;
    }

    fn append_pending(&mut self, pending: &mut Vec<&Token>) {
        for token in pending.drain(..) {
            self.append(token);
        }
    }
}

fn wrap_tokens(
    tokens: &[Token],
    first_prefix: &str,
    continuation_prefix: &str,
    width: usize,
) -> Vec<WrappedLine> {
    let mut lines = Vec::new();
    let mut builder = LineBuilder::new(first_prefix);
    let mut pending: Vec<&Token> = Vec::new();

    for token in tokens {
        if token.blank {
            pending.push(token);
            continue;
        }
        let gap: usize = pending.iter().map(|token| token.width).sum();
        if !builder.line.body.is_empty() && builder.width + gap + token.width > width {
            builder.append_pending(&mut pending);
            lines.push(builder.line);
            builder = LineBuilder::new(continuation_prefix);
        }
        builder.append_pending(&mut pending);
        builder.append(token);
    }

    builder.append_pending(&mut pending);
    lines.push(builder.line);
    lines
}

fn visible_width(text: &str) -> usize {
    text.chars()
        .map(|ch| UnicodeWidthChar::width(ch).unwrap_or(0))
        .sum()
}
