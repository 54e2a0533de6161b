use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use scogen_tui::block::{Block as _, BlockId};
use scogen_tui::config::{AppConfig, load_provider_config};
use scogen_tui::coordinator::{Decision, EditMode};
use scogen_tui::input::BlockAction;
use scogen_tui::manager::{
    Activation, CloseOutcome, DocumentManager, ImageInput, PromptOutcome, TextInput,
};
use scogen_tui::model::ScoreProvider;
use scogen_tui::storage::{Autosave, FolderStorage};
use scogen_tui::theme::Theme;
use scogen_tui::view::{RenderResult, ViewState, navigation_order, render_test};

const STATUS_TIMEOUT: Duration = Duration::from_secs(4);
const LOG_FILE: &str = "scogen.log";
const IMAGE_STEP: i32 = 10;
const IMAGE_STEP_LARGE: i32 = 50;

/// Terminal authoring tool for multiple-choice tests.
#[derive(Debug, Parser)]
#[command(name = "scogen", version, about)]
struct Args {
    /// Test folder holding manifest.json and the scorm/ export directory
    folder: PathBuf,

    /// Start a new test; refuses to overwrite an existing manifest
    #[arg(long)]
    new: bool,

    /// Settings file to use instead of the default location
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    run()
}

fn run() -> Result<()> {
    let args = Args::parse();
    let (config, config_error) = AppConfig::load(args.config.as_deref());
    let _guard = init_logging(&config)?;
    if let Some(err) = &config_error {
        warn!(error = %err, "falling back to default settings");
    }

    let (manager, initial_status) = open_or_create(&args)?;
    let mut app = App::new(manager, args.folder, config, initial_status);

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to initialize terminal")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().ok();

    let res = run_app(&mut terminal, &mut app).context("application error");

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    if let Err(err) = &res {
        error!(error = %err, "scogen stopped with an error");
    }
    res
}

fn init_logging(config: &AppConfig) -> Result<WorkerGuard> {
    let log_dir = config.log_dir();
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();

    info!(log_dir = %log_dir.display(), "scogen starting");
    Ok(guard)
}

fn open_or_create(args: &Args) -> Result<(DocumentManager, String)> {
    let existing = FolderStorage::new(&args.folder);
    if existing.has_manifest() {
        if args.new {
            bail!(
                "{} already holds a test; drop --new to open it",
                args.folder.display()
            );
        }
        let manager = DocumentManager::open(Box::new(existing))
            .with_context(|| format!("failed to open test in {}", args.folder.display()))?;
        return Ok((manager, "Opened".to_string()));
    }

    let storage = FolderStorage::create(&args.folder)
        .with_context(|| format!("failed to prepare {}", args.folder.display()))?;
    let mut manager = DocumentManager::new(Box::new(storage));
    manager
        .save_now()
        .with_context(|| format!("failed to write manifest in {}", args.folder.display()))?;
    Ok((manager, "New test".to_string()))
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();
    let mut needs_redraw = true;

    while !app.should_quit() {
        if needs_redraw {
            terminal
                .draw(|frame| app.draw(frame))
                .context("failed to draw frame")?;
            needs_redraw = false;
        }

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout).context("event poll failed")? {
            let evt = event::read().context("failed to read event")?;
            app.handle_event(evt);
            needs_redraw = true;
        }

        if last_tick.elapsed() >= tick_rate {
            let before = (app.has_status_message(), app.manager.has_changed());
            app.on_tick();
            last_tick = Instant::now();
            if before != (app.has_status_message(), app.manager.has_changed()) {
                needs_redraw = true;
            }
        }
    }

    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParameterRow {
    Timed,
    Minutes,
    ShuffleQuestions,
    ShuffleAnswers,
    Adaptive,
    AdaptiveVariant,
    SaveScores,
    Provider,
}

impl ParameterRow {
    const ALL: [ParameterRow; 8] = [
        ParameterRow::Timed,
        ParameterRow::Minutes,
        ParameterRow::ShuffleQuestions,
        ParameterRow::ShuffleAnswers,
        ParameterRow::Adaptive,
        ParameterRow::AdaptiveVariant,
        ParameterRow::SaveScores,
        ParameterRow::Provider,
    ];

    fn label(self) -> &'static str {
        match self {
            ParameterRow::Timed => "Timed test",
            ParameterRow::Minutes => "Minutes",
            ParameterRow::ShuffleQuestions => "Shuffle questions",
            ParameterRow::ShuffleAnswers => "Shuffle answers",
            ParameterRow::Adaptive => "Adaptive scoring",
            ParameterRow::AdaptiveVariant => "Adaptive variant",
            ParameterRow::SaveScores => "Save scores",
            ParameterRow::Provider => "Score provider",
        }
    }
}

enum Overlay {
    None,
    /// Typing an image path or data URI for the image surface.
    ImageSource(String),
    /// Parameters panel with the selected row.
    Parameters(usize),
}

struct App {
    manager: DocumentManager,
    folder: PathBuf,
    config: AppConfig,
    theme: Theme,
    autosave: Autosave,
    selected: Option<BlockId>,
    selected_index: usize,
    grabbed: Option<BlockId>,
    overlay: Overlay,
    scroll_top: usize,
    should_quit: bool,
    status_message: Option<(String, Instant)>,
}

impl App {
    fn new(
        manager: DocumentManager,
        folder: PathBuf,
        config: AppConfig,
        initial_status: String,
    ) -> Self {
        let autosave = Autosave::new(config.autosave_interval(), Instant::now());
        let mut app = Self {
            manager,
            folder,
            config,
            theme: Theme::default(),
            autosave,
            selected: None,
            selected_index: 0,
            grabbed: None,
            overlay: Overlay::None,
            scroll_top: 0,
            should_quit: false,
            status_message: Some((initial_status, Instant::now())),
        };
        app.sync_selection();
        app
    }

    fn should_quit(&self) -> bool {
        self.should_quit
    }

    fn has_status_message(&self) -> bool {
        self.status_message.is_some()
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    fn on_tick(&mut self) {
        self.prune_status_message();
        if let Some(Err(err)) = self.autosave.tick(Instant::now(), &mut self.manager) {
            self.set_status(format!("Autosave failed: {err}"));
        }
    }

    fn handle_event(&mut self, event: Event) {
        if let Event::Key(key) = event
            && key.kind == KeyEventKind::Press
        {
            self.handle_key(key);
            self.sync_selection();
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let KeyEvent {
            code, modifiers, ..
        } = key;

        if self.manager.pending().is_some() {
            self.handle_prompt_key(code);
            return;
        }

        match std::mem::replace(&mut self.overlay, Overlay::None) {
            Overlay::ImageSource(input) => {
                self.handle_source_key(input, code);
                return;
            }
            Overlay::Parameters(row) => {
                self.handle_parameters_key(row, code);
                return;
            }
            Overlay::None => {}
        }

        if let Some(active) = self.manager.active() {
            match active.mode {
                EditMode::Text => self.handle_text_key(code, modifiers),
                EditMode::Image => self.handle_image_key(code, modifiers),
            }
            return;
        }

        if self.grabbed.is_some() {
            self.handle_grab_key(code);
            return;
        }

        self.handle_browse_key(code, modifiers);
    }

    fn handle_prompt_key(&mut self, code: KeyCode) {
        let decision = match code {
            KeyCode::Char('s') | KeyCode::Char('S') => Decision::Save,
            KeyCode::Char('d') | KeyCode::Char('D') => Decision::Discard,
            KeyCode::Char('c') | KeyCode::Char('C') | KeyCode::Esc => Decision::Cancel,
            _ => return,
        };
        match self.manager.resolve_prompt(decision) {
            Ok(PromptOutcome::TestClosed) => self.should_quit = true,
            Ok(PromptOutcome::Cancelled) => self.set_status("Still editing"),
            Ok(PromptOutcome::Activated(_)) | Ok(PromptOutcome::NoPrompt) => {}
            Err(err) => self.set_status(format!("Save failed: {err}")),
        }
    }

    fn handle_source_key(&mut self, mut input: String, code: KeyCode) {
        match code {
            KeyCode::Esc => {}
            KeyCode::Enter => {
                let source = input.trim();
                if !source.is_empty() {
                    self.manager
                        .image_input(ImageInput::SetSource(source.to_string()));
                }
            }
            KeyCode::Backspace => {
                input.pop();
                self.overlay = Overlay::ImageSource(input);
            }
            KeyCode::Char(ch) => {
                input.push(ch);
                self.overlay = Overlay::ImageSource(input);
            }
            _ => self.overlay = Overlay::ImageSource(input),
        }
    }

    fn handle_parameters_key(&mut self, row: usize, code: KeyCode) {
        let last = ParameterRow::ALL.len() - 1;
        let mut row = row.min(last);
        match code {
            KeyCode::Esc | KeyCode::Char('p') | KeyCode::Char('q') => return,
            KeyCode::Up | KeyCode::Char('k') => row = row.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => row = (row + 1).min(last),
            KeyCode::Enter | KeyCode::Char(' ') => self.toggle_parameter(ParameterRow::ALL[row]),
            KeyCode::Right | KeyCode::Char('+') => self.adjust_minutes(ParameterRow::ALL[row], 1),
            KeyCode::Left | KeyCode::Char('-') => self.adjust_minutes(ParameterRow::ALL[row], -1),
            _ => {}
        }
        self.overlay = Overlay::Parameters(row);
    }

    fn toggle_parameter(&mut self, row: ParameterRow) {
        let parameters = self.manager.parameters().clone();
        match row {
            ParameterRow::Timed => self
                .manager
                .set_timing(!parameters.timed, parameters.minutes),
            ParameterRow::Minutes => {}
            ParameterRow::ShuffleQuestions => self
                .manager
                .set_shuffle_questions(!parameters.mix_questions),
            ParameterRow::ShuffleAnswers => {
                self.manager.set_shuffle_answers(!parameters.mix_answers)
            }
            ParameterRow::Adaptive => self
                .manager
                .set_adaptive(!parameters.adaptive, parameters.adaptive_variant),
            ParameterRow::AdaptiveVariant => {
                if parameters.adaptive {
                    self.manager
                        .set_adaptive(true, parameters.adaptive_variant.next());
                }
            }
            ParameterRow::SaveScores => {
                if parameters.save_scores {
                    self.manager
                        .set_score_saving(false, ScoreProvider::Unset, Default::default());
                } else {
                    let provider = match parameters.score_provider {
                        ScoreProvider::Unset => ScoreProvider::Firebase,
                        provider => provider,
                    };
                    self.enable_score_saving(provider);
                }
            }
            ParameterRow::Provider => {
                if parameters.save_scores {
                    self.manager.set_score_saving(
                        true,
                        parameters.score_provider.next(),
                        parameters.provider_config,
                    );
                }
            }
        }
    }

    fn enable_score_saving(&mut self, provider: ScoreProvider) {
        let Some(path) = self.config.provider_config_path() else {
            self.set_status("No provider config location available");
            return;
        };
        match load_provider_config(&path) {
            Ok(config) => {
                self.manager.set_score_saving(true, provider, config);
                self.set_status(format!("Provider config loaded from {}", path.display()));
            }
            Err(err) => {
                warn!(error = %err, "score saving left off");
                self.set_status(err.to_string());
            }
        }
    }

    fn adjust_minutes(&mut self, row: ParameterRow, delta: i32) {
        if row != ParameterRow::Minutes {
            return;
        }
        let parameters = self.manager.parameters();
        let minutes = parameters.minutes.saturating_add_signed(delta);
        let timed = parameters.timed;
        self.manager.set_timing(timed, minutes);
    }

    fn handle_text_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        let control = modifiers.contains(KeyModifiers::CONTROL);
        let input = match code {
            KeyCode::Esc => {
                self.manager.cancel_edit();
                self.set_status("Edit cancelled");
                return;
            }
            KeyCode::Char('s') if control => {
                self.manager.save_edit();
                return;
            }
            KeyCode::Tab => {
                self.move_edit(1);
                return;
            }
            KeyCode::BackTab => {
                self.move_edit(-1);
                return;
            }
            KeyCode::F(2) => {
                self.switch_edit_mode();
                return;
            }
            KeyCode::Char(ch) if !control => TextInput::Char(ch),
            KeyCode::Enter => TextInput::Enter,
            KeyCode::Backspace => TextInput::Backspace,
            KeyCode::Delete => TextInput::Delete,
            KeyCode::Left => TextInput::Left,
            KeyCode::Right => TextInput::Right,
            KeyCode::Up => TextInput::Up,
            KeyCode::Down => TextInput::Down,
            KeyCode::Home => TextInput::Home,
            KeyCode::End => TextInput::End,
            _ => return,
        };
        self.manager.text_input(input);
    }

    fn handle_image_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        let step = if modifiers.contains(KeyModifiers::SHIFT) {
            IMAGE_STEP_LARGE
        } else {
            IMAGE_STEP
        };
        let input = match code {
            KeyCode::Esc => {
                self.manager.cancel_edit();
                self.set_status("Edit cancelled");
                return;
            }
            KeyCode::Enter => {
                self.manager.save_edit();
                return;
            }
            KeyCode::Char('s') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.manager.save_edit();
                return;
            }
            KeyCode::Tab => {
                self.move_edit(1);
                return;
            }
            KeyCode::BackTab => {
                self.move_edit(-1);
                return;
            }
            KeyCode::F(2) => {
                self.switch_edit_mode();
                return;
            }
            KeyCode::Char('o') => {
                let current = self
                    .manager
                    .surfaces()
                    .image
                    .image_data()
                    .source
                    .clone()
                    .unwrap_or_default();
                self.overlay = Overlay::ImageSource(current);
                return;
            }
            KeyCode::Left => ImageInput::Width(-step),
            KeyCode::Right => ImageInput::Width(step),
            KeyCode::Down => ImageInput::Height(-step),
            KeyCode::Up => ImageInput::Height(step),
            KeyCode::Char('l') => ImageInput::ToggleRatioLock,
            KeyCode::Char('x') => ImageInput::RemoveSource,
            _ => return,
        };
        self.manager.image_input(input);
    }

    /// Hands the text surface to the next or previous block. Unsaved work in
    /// the current block goes through the prompt.
    fn move_edit(&mut self, delta: isize) {
        let order = navigation_order(&self.manager);
        if order.is_empty() {
            return;
        }
        let current = self
            .selected
            .and_then(|id| order.iter().position(|candidate| *candidate == id))
            .unwrap_or(0);
        let next = (current as isize + delta).rem_euclid(order.len() as isize) as usize;
        let target = order[next];
        self.selected = Some(target);
        self.request_edit(target, EditMode::Text);
    }

    fn switch_edit_mode(&mut self) {
        let Some(active) = self.manager.active() else {
            return;
        };
        let mode = match active.mode {
            EditMode::Text => EditMode::Image,
            EditMode::Image => EditMode::Text,
        };
        self.request_edit(active.block, mode);
    }

    fn request_edit(&mut self, block: BlockId, mode: EditMode) {
        match self.manager.request_activation(block, mode) {
            Activation::Ignored => self.set_status("Nothing to edit there"),
            Activation::Prompting => self.set_status("Unsaved changes"),
            Activation::Started | Activation::Unchanged => {}
        }
    }

    fn handle_grab_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.grabbed = None;
                self.set_status("Move cancelled");
            }
            KeyCode::Up | KeyCode::Char('k') => self.select_question(-1),
            KeyCode::Down | KeyCode::Char('j') => self.select_question(1),
            KeyCode::Enter | KeyCode::Char('m') => self.dispatch(BlockAction::DropTarget),
            _ => {}
        }
    }

    fn handle_browse_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        let control = modifiers.contains(KeyModifiers::CONTROL);
        match code {
            KeyCode::Char('s') if control => self.save(),
            KeyCode::Char('q') => self.quit(),
            KeyCode::Up | KeyCode::Char('k') => self.select_relative(-1),
            KeyCode::Down | KeyCode::Char('j') => self.select_relative(1),
            KeyCode::Home => self.select_index(0),
            KeyCode::End => self.select_index(usize::MAX),
            KeyCode::Char('a') => {
                if let Some(id) = self.manager.add_block() {
                    self.selected = Some(id);
                }
            }
            KeyCode::Char('p') => self.overlay = Overlay::Parameters(0),
            KeyCode::Char('Z') => {
                let all = self.manager.test().questions.iter().all(|q| q.collapsed);
                self.manager.set_all_collapsed(!all);
            }
            KeyCode::Char('m') => self.grab(),
            KeyCode::Char('e') | KeyCode::Enter => self.dispatch(BlockAction::EditText),
            KeyCode::Char('i') => self.dispatch(BlockAction::EditImage),
            KeyCode::Char('n') => self.dispatch(BlockAction::AddAnswer),
            KeyCode::Char('x') | KeyCode::Delete => self.dispatch(BlockAction::Delete),
            KeyCode::Char('c') | KeyCode::Char(' ') => self.dispatch(BlockAction::ToggleCorrect),
            KeyCode::Char('h') => self.dispatch(BlockAction::ToggleVisibility),
            KeyCode::Char('z') => self.dispatch(BlockAction::ToggleCollapsed),
            KeyCode::Char('f') => self.dispatch(BlockAction::ToggleImageCollapsed),
            KeyCode::Char('K') => self.dispatch(BlockAction::MoveUp),
            KeyCode::Char('J') => self.dispatch(BlockAction::MoveDown),
            _ => {}
        }
    }

    /// Runs `action` on the selected block, or on the question owning it for
    /// question-level actions. Blocks that do not subscribe to the action
    /// ignore it.
    fn dispatch(&mut self, action: BlockAction) {
        let Some(selected) = self.selected else {
            return;
        };
        let question_level = !matches!(
            action,
            BlockAction::EditText | BlockAction::Delete | BlockAction::ToggleCorrect
        );
        let target = if question_level {
            self.question_of(selected)
        } else {
            Some(selected)
        };
        let Some(target) = target else {
            return;
        };
        if !self.manager.accepts(target, action) {
            self.set_status("Not available here");
            return;
        }

        match action {
            BlockAction::EditText => self.request_edit(target, EditMode::Text),
            BlockAction::EditImage => self.request_edit(target, EditMode::Image),
            BlockAction::ToggleCollapsed => {
                self.manager.toggle_collapsed(target);
                self.selected = Some(target);
            }
            BlockAction::ToggleVisibility => {
                self.manager.toggle_visibility(target);
            }
            BlockAction::ToggleImageCollapsed => {
                if !self.manager.toggle_image_collapsed(target) {
                    self.set_status("This question has no image");
                }
            }
            BlockAction::Delete => {
                let removed = if self.manager.question_index(target).is_some() {
                    self.manager.remove_block(target)
                } else {
                    self.manager.remove_answer(target)
                };
                if removed {
                    self.set_status("Removed");
                }
            }
            BlockAction::MoveUp => {
                self.manager.move_block_up(target);
            }
            BlockAction::MoveDown => {
                self.manager.move_block_down(target);
            }
            BlockAction::DropTarget => {
                if let Some(source) = self.grabbed.take() {
                    if self.manager.handle_reorder(source, target) {
                        self.set_status("Moved");
                    }
                    self.selected = Some(source);
                }
            }
            BlockAction::AddAnswer => {
                if let Some(id) = self.manager.add_answer(target) {
                    self.selected = Some(id);
                }
            }
            BlockAction::ToggleCorrect => {
                self.manager.toggle_correct(target);
            }
        }
    }

    fn question_of(&self, id: BlockId) -> Option<BlockId> {
        let index = self.manager.locate(id)?.question();
        self.manager.blocks().get(index).map(|block| block.id())
    }

    fn grab(&mut self) {
        let Some(question) = self.selected.and_then(|id| self.question_of(id)) else {
            return;
        };
        self.grabbed = Some(question);
        self.selected = Some(question);
        self.set_status("Pick a position and press Enter");
    }

    fn select_relative(&mut self, delta: isize) {
        let order = navigation_order(&self.manager);
        if order.is_empty() {
            return;
        }
        let current = self
            .selected
            .and_then(|id| order.iter().position(|candidate| *candidate == id))
            .unwrap_or(0);
        let next = (current as isize + delta).clamp(0, order.len() as isize - 1) as usize;
        self.selected = Some(order[next]);
    }

    fn select_index(&mut self, index: usize) {
        let order = navigation_order(&self.manager);
        if let Some(last) = order.len().checked_sub(1) {
            self.selected = Some(order[index.min(last)]);
        }
    }

    fn select_question(&mut self, delta: isize) {
        let blocks = self.manager.blocks();
        if blocks.is_empty() {
            return;
        }
        let current = self
            .selected
            .and_then(|id| self.manager.question_index(id))
            .unwrap_or(0);
        let next = (current as isize + delta).clamp(0, blocks.len() as isize - 1) as usize;
        self.selected = Some(blocks[next].id());
    }

    /// Keeps the selection on an existing block; follows the active edit.
    fn sync_selection(&mut self) {
        if let Some(active) = self.manager.active() {
            self.selected = Some(active.block);
        }
        let order = navigation_order(&self.manager);
        match self
            .selected
            .and_then(|id| order.iter().position(|candidate| *candidate == id))
        {
            Some(index) => self.selected_index = index,
            None => {
                self.selected = order
                    .get(self.selected_index.min(order.len().saturating_sub(1)))
                    .copied();
            }
        }
        if self
            .grabbed
            .is_some_and(|id| self.manager.question_index(id).is_none())
        {
            self.grabbed = None;
        }
    }

    fn save(&mut self) {
        match self.manager.save_now() {
            Ok(()) => self.set_status("Saved"),
            Err(err) => self.set_status(format!("Save failed: {err}")),
        }
    }

    fn quit(&mut self) {
        match self.manager.close_test() {
            Ok(CloseOutcome::Closed) => self.should_quit = true,
            Ok(CloseOutcome::Prompting) => self.set_status("Unsaved changes"),
            Err(err) => self.set_status(format!("Save failed: {err}")),
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        if area.height == 0 || area.width == 0 {
            return;
        }

        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(area);
        let list_area = vertical[0];
        let status_area = vertical[1];

        let width = list_area.width.saturating_sub(1).max(1) as usize;
        let view = ViewState {
            selected: self.selected,
            grabbed: self.grabbed,
        };
        let render = render_test(&self.manager, width, view, &self.theme);
        let viewport_height = list_area.height as usize;
        self.adjust_scroll(&render, viewport_height);

        let cursor = render.cursor;
        let paragraph = Paragraph::new(Text::from(render.lines))
            .style(Style::default().bg(self.theme.background))
            .block(Block::default().borders(Borders::NONE))
            .scroll((self.scroll_top as u16, 0));
        frame.render_widget(paragraph, list_area);

        if let Some(cursor) = cursor
            && cursor.line >= self.scroll_top
            && cursor.line < self.scroll_top + viewport_height
        {
            let cursor_y = list_area.y + (cursor.line - self.scroll_top) as u16;
            let cursor_x = list_area.x + cursor.column.min(list_area.width - 1);
            frame.set_cursor_position(Position::new(cursor_x, cursor_y));
        }

        let status_line = self.status_line(status_area.width as usize);
        let status_widget = Paragraph::new(status_line).style(self.theme.status_bar_style());
        frame.render_widget(status_widget, status_area);

        if self.manager.pending().is_some() {
            self.render_prompt(frame, area);
        }
        match &self.overlay {
            Overlay::Parameters(row) => self.render_parameters(frame, area, *row),
            Overlay::ImageSource(input) => self.render_source_input(frame, area, input),
            Overlay::None => {}
        }
    }

    fn adjust_scroll(&mut self, render: &RenderResult, viewport_height: usize) {
        let viewport = viewport_height.max(1);
        let max_scroll = render.total_lines.saturating_sub(viewport);
        let focus = render
            .cursor
            .map(|cursor| cursor.line)
            .or_else(|| self.selected.and_then(|id| render.line_of(id)));
        if let Some(line) = focus {
            if line < self.scroll_top {
                self.scroll_top = line;
            } else if line >= self.scroll_top + viewport {
                self.scroll_top = line + 1 - viewport;
            }
        }
        self.scroll_top = self.scroll_top.min(max_scroll);
    }

    fn render_prompt(&self, frame: &mut Frame, area: Rect) {
        let style = self.theme.menu_style();
        let key = style.add_modifier(Modifier::BOLD);
        let lines = vec![
            Line::from("This block has unsaved changes."),
            Line::from(""),
            Line::from(vec![
                Span::styled("s", key),
                Span::raw(" Save   "),
                Span::styled("d", key),
                Span::raw(" Discard   "),
                Span::styled("c", key),
                Span::raw(" Cancel"),
            ]),
        ];
        let popup = centered(area, 40, 5);
        frame.render_widget(Clear, popup);
        let widget = Paragraph::new(lines).style(style).block(
            Block::default()
                .title("Unsaved changes")
                .borders(Borders::ALL)
                .style(style),
        );
        frame.render_widget(widget, popup);
    }

    fn render_parameters(&self, frame: &mut Frame, area: Rect, row: usize) {
        let parameters = self.manager.parameters();
        let on_off = |value: bool| if value { "on" } else { "off" };
        let items: Vec<ListItem> = ParameterRow::ALL
            .iter()
            .map(|row| {
                let value = match row {
                    ParameterRow::Timed => on_off(parameters.timed).to_string(),
                    ParameterRow::Minutes => parameters.minutes.to_string(),
                    ParameterRow::ShuffleQuestions => on_off(parameters.mix_questions).to_string(),
                    ParameterRow::ShuffleAnswers => on_off(parameters.mix_answers).to_string(),
                    ParameterRow::Adaptive => on_off(parameters.adaptive).to_string(),
                    ParameterRow::AdaptiveVariant => parameters.adaptive_variant.label().to_string(),
                    ParameterRow::SaveScores => on_off(parameters.save_scores).to_string(),
                    ParameterRow::Provider => parameters.score_provider.label().to_string(),
                };
                ListItem::new(Line::from(format!("{:<20}{value:>10}", row.label())))
            })
            .collect();

        let height = ParameterRow::ALL.len() as u16 + 2;
        let popup = centered(area, 36, height);
        frame.render_widget(Clear, popup);

        let mut state = ListState::default();
        state.select(Some(row));
        let style = self.theme.menu_style();
        let list = List::new(items)
            .highlight_style(self.theme.menu_selected_style())
            .style(style)
            .block(
                Block::default()
                    .title("Test parameters")
                    .borders(Borders::ALL)
                    .style(style),
            );
        frame.render_stateful_widget(list, popup, &mut state);
    }

    fn render_source_input(&self, frame: &mut Frame, area: Rect, input: &str) {
        let width = area.width.saturating_sub(4).clamp(20, 72);
        let popup = centered(area, width, 3);
        frame.render_widget(Clear, popup);
        let style = self.theme.menu_style();
        let inner_width = popup.width.saturating_sub(2) as usize;
        let shown: String = {
            let count = input.chars().count();
            let skip = count.saturating_sub(inner_width.saturating_sub(1));
            input.chars().skip(skip).collect()
        };
        let widget = Paragraph::new(Line::from(shown.clone())).style(style).block(
            Block::default()
                .title("Image path or data URI")
                .borders(Borders::ALL)
                .style(style),
        );
        frame.render_widget(widget, popup);
        let cursor_x = popup.x + 1 + shown.chars().count() as u16;
        frame.set_cursor_position(Position::new(
            cursor_x.min(popup.x + popup.width.saturating_sub(2)),
            popup.y + 1,
        ));
    }

    fn mode_label(&self) -> &'static str {
        if self.manager.pending().is_some() {
            return "PROMPT";
        }
        match (&self.overlay, self.manager.active(), self.grabbed) {
            (Overlay::Parameters(_), _, _) => "PARAMETERS",
            (Overlay::ImageSource(_), _, _) => "IMAGE SOURCE",
            (_, Some(active), _) if active.mode == EditMode::Text => "TEXT",
            (_, Some(_), _) => "IMAGE",
            (_, None, Some(_)) => "MOVE",
            (_, None, None) => "BROWSE",
        }
    }

    fn shortcuts(&self) -> &'static [&'static str] {
        match self.mode_label() {
            "PROMPT" => &["c:Cancel", "d:Discard", "s:Save"],
            "PARAMETERS" => &["-/+:Minutes", "Esc:Close", "Enter:Toggle"],
            "IMAGE SOURCE" => &["Esc:Back", "Enter:Use"],
            "TEXT" => &["F2:Image", "Tab:Next", "Esc:Cancel", "^S:Save"],
            "IMAGE" => &["x:Remove", "l:Lock", "o:Source", "Esc:Cancel", "Enter:Save"],
            "MOVE" => &["Esc:Cancel", "Enter:Drop"],
            _ => &[
                "m:Move",
                "p:Params",
                "n:Answer",
                "a:Add",
                "e:Edit",
                "^S:Save",
                "q:Quit",
            ],
        }
    }

    fn status_line(&mut self, terminal_width: usize) -> Line<'static> {
        self.prune_status_message();

        let position = self.position_text();
        if let Some((message, _)) = &self.status_message {
            return Line::from(vec![
                Span::raw(format!("{position} ")),
                Span::raw(message.clone()),
            ]);
        }

        let folder = folder_name(&self.folder);
        let marker = if self.manager.has_changed() { "*" } else { "" };
        let test = self.manager.test();

        let mut spans = vec![
            Span::raw(format!("{position} ")),
            Span::styled(format!("{folder}{marker}"), self.theme.folder_style()),
            Span::raw(format!(
                ", {} questions, {} answers [{}]",
                test.questions.len(),
                test.answer_count(),
                self.mode_label()
            )),
        ];

        let left_width: usize = spans.iter().map(|span| span.content.chars().count()).sum();
        let min_padding = 1;
        let mut shown: Vec<&str> = Vec::new();
        let mut shown_width = 0;
        // Most important shortcuts come last and are kept first.
        for shortcut in self.shortcuts().iter().rev() {
            let width = if shown.is_empty() {
                shortcut.chars().count()
            } else {
                shown_width + 1 + shortcut.chars().count()
            };
            if left_width + min_padding + width > terminal_width {
                break;
            }
            shown.insert(0, shortcut);
            shown_width = width;
        }

        if !shown.is_empty() {
            let padding = terminal_width
                .saturating_sub(left_width)
                .saturating_sub(shown_width)
                .max(min_padding);
            spans.push(Span::raw(" ".repeat(padding)));
            spans.push(Span::raw(shown.join(" ")));
        }

        Line::from(spans)
    }

    fn position_text(&self) -> String {
        let total = self.manager.blocks().len();
        match self
            .selected
            .and_then(|id| self.manager.locate(id))
            .map(|location| location.question())
        {
            Some(index) => format!("Q{}/{total}", index + 1),
            None => format!("-/{total}"),
        }
    }

    fn prune_status_message(&mut self) {
        if let Some((_, instant)) = &self.status_message
            && instant.elapsed() > STATUS_TIMEOUT
        {
            self.status_message = None;
        }
    }
}

fn folder_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width.saturating_sub(width)) / 2,
        area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    )
}
