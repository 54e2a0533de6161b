use ratatui::style::{Color, Modifier, Style};

/// Colors used by the test view, the status bar and the popups.
#[derive(Clone, Debug)]
pub struct Theme {
    /// Background color for the block list
    pub background: Color,

    /// Foreground (text) color for the status bar
    pub status_bar_fg: Color,

    /// Background color for the status bar
    pub status_bar_bg: Color,

    /// Color for the test folder name in the status bar
    pub folder_color: Color,

    /// Foreground color for the selected block
    pub selection_fg: Color,

    /// Background color for the selected block
    pub selection_bg: Color,

    /// Color for question headings
    pub question_fg: Color,

    /// Color for questions hidden from the player
    pub hidden_fg: Color,

    /// Marker color for correct answers
    pub correct_fg: Color,

    /// Marker color for answers that are not correct
    pub incorrect_fg: Color,

    /// Foreground color for a block with an open edit surface
    pub editing_fg: Color,

    /// Background color for a block with an open edit surface
    pub editing_bg: Color,

    /// Color for image summaries
    pub image_fg: Color,

    /// Background color for a block picked up for reordering
    pub grabbed_bg: Color,

    /// Foreground color for popups
    pub menu_fg: Color,

    /// Background color for popups
    pub menu_bg: Color,

    /// Foreground color for the selected popup entry
    pub menu_selected_fg: Color,

    /// Background color for the selected popup entry
    pub menu_selected_bg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color::Reset,
            status_bar_fg: Color::White,
            status_bar_bg: Color::Blue,
            folder_color: Color::LightYellow,
            selection_fg: Color::White,
            selection_bg: Color::LightBlue,
            question_fg: Color::Reset,
            hidden_fg: Color::DarkGray,
            correct_fg: Color::Green,
            incorrect_fg: Color::Gray,
            editing_fg: Color::Black,
            editing_bg: Color::LightYellow,
            image_fg: Color::Cyan,
            grabbed_bg: Color::Magenta,
            menu_fg: Color::White,
            menu_bg: Color::Black,
            menu_selected_fg: Color::White,
            menu_selected_bg: Color::LightBlue,
        }
    }
}

impl Theme {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_bar_style(&self) -> Style {
        Style::default()
            .fg(self.status_bar_fg)
            .bg(self.status_bar_bg)
    }

    pub fn folder_style(&self) -> Style {
        Style::default().fg(self.folder_color)
    }

    pub fn selection_style(&self) -> Style {
        Style::default().fg(self.selection_fg).bg(self.selection_bg)
    }

    pub fn question_style(&self) -> Style {
        Style::default()
            .fg(self.question_fg)
            .add_modifier(Modifier::BOLD)
    }

    pub fn hidden_style(&self) -> Style {
        Style::default()
            .fg(self.hidden_fg)
            .add_modifier(Modifier::ITALIC)
    }

    pub fn correct_style(&self) -> Style {
        Style::default()
            .fg(self.correct_fg)
            .add_modifier(Modifier::BOLD)
    }

    pub fn incorrect_style(&self) -> Style {
        Style::default().fg(self.incorrect_fg)
    }

    pub fn editing_style(&self) -> Style {
        Style::default().fg(self.editing_fg).bg(self.editing_bg)
    }

    pub fn image_style(&self) -> Style {
        Style::default().fg(self.image_fg)
    }

    pub fn grabbed_style(&self) -> Style {
        Style::default().bg(self.grabbed_bg)
    }

    /// Style for popups (prompt, parameters, image source input)
    pub fn menu_style(&self) -> Style {
        Style::default().fg(self.menu_fg).bg(self.menu_bg)
    }

    pub fn menu_selected_style(&self) -> Style {
        Style::default()
            .fg(self.menu_selected_fg)
            .bg(self.menu_selected_bg)
    }
}
