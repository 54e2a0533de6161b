//! The quiz document: a [`Test`] with its [`Parameters`] and ordered
//! [`Question`]s. This is what gets written to `manifest.json`; nothing in
//! here knows about blocks or the terminal.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Shortest timed test the parameter setter accepts.
pub const MIN_TIMED_MINUTES: u32 = 5;

pub const DEFAULT_QUESTION_TEXT: &str = "Press e to edit the question.";
pub const DEFAULT_ANSWER_TEXT: &str = "Press e to change the answer text.";

pub const DEFAULT_IMAGE_SIZE: u32 = 300;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Test {
    pub parameters: Parameters,
    pub questions: Vec<Question>,
}

impl Test {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer_count(&self) -> usize {
        self.questions.iter().map(|q| q.answers.len()).sum()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    #[serde(rename = "isTime", default)]
    pub timed: bool,
    #[serde(
        rename = "time",
        default = "default_minutes",
        deserialize_with = "minutes_from_number_or_string"
    )]
    pub minutes: u32,
    #[serde(default)]
    pub mix_questions: bool,
    #[serde(default)]
    pub mix_answers: bool,
    #[serde(rename = "isBayesian", default)]
    pub adaptive: bool,
    #[serde(rename = "bayesianType", default)]
    pub adaptive_variant: AdaptiveVariant,
    #[serde(rename = "saveAnswers", default)]
    pub save_scores: bool,
    #[serde(rename = "dbType", default)]
    pub score_provider: ScoreProvider,
    #[serde(rename = "dbConfig", default)]
    pub provider_config: Map<String, Value>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            timed: false,
            minutes: MIN_TIMED_MINUTES,
            mix_questions: false,
            mix_answers: false,
            adaptive: false,
            adaptive_variant: AdaptiveVariant::Unset,
            save_scores: false,
            score_provider: ScoreProvider::Unset,
            provider_config: Map::new(),
        }
    }
}

fn default_minutes() -> u32 {
    MIN_TIMED_MINUTES
}

// Older manifests stored the duration straight from a text input.
fn minutes_from_number_or_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Minutes {
        Number(u32),
        Text(String),
    }

    match Minutes::deserialize(deserializer)? {
        Minutes::Number(value) => Ok(value),
        Minutes::Text(text) => text
            .trim()
            .parse::<u32>()
            .map_err(|err| serde::de::Error::custom(format!("invalid minutes {text:?}: {err}"))),
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdaptiveVariant {
    #[default]
    #[serde(rename = "")]
    Unset,
    Standard,
    Adaptive,
    Advanced,
}

impl AdaptiveVariant {
    /// Cycles through the selectable variants, skipping `Unset`.
    pub fn next(self) -> Self {
        match self {
            AdaptiveVariant::Unset | AdaptiveVariant::Advanced => AdaptiveVariant::Standard,
            AdaptiveVariant::Standard => AdaptiveVariant::Adaptive,
            AdaptiveVariant::Adaptive => AdaptiveVariant::Advanced,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AdaptiveVariant::Unset => "-",
            AdaptiveVariant::Standard => "Standard",
            AdaptiveVariant::Adaptive => "Adaptive",
            AdaptiveVariant::Advanced => "Advanced",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreProvider {
    #[default]
    #[serde(rename = "")]
    Unset,
    Firebase,
    Supabase,
}

impl ScoreProvider {
    pub fn next(self) -> Self {
        match self {
            ScoreProvider::Unset | ScoreProvider::Supabase => ScoreProvider::Firebase,
            ScoreProvider::Firebase => ScoreProvider::Supabase,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoreProvider::Unset => "-",
            ScoreProvider::Firebase => "Firebase",
            ScoreProvider::Supabase => "Supabase",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(alias = "Qtext")]
    pub text: String,
    #[serde(alias = "imageData", default)]
    pub image: Option<Image>,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(alias = "isCollapsed", default)]
    pub collapsed: bool,
    #[serde(alias = "isVisible", default = "visible_by_default")]
    pub visible: bool,
}

fn visible_by_default() -> bool {
    true
}

impl Default for Question {
    fn default() -> Self {
        Self {
            text: DEFAULT_QUESTION_TEXT.to_string(),
            image: None,
            answers: Vec::new(),
            collapsed: false,
            visible: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(alias = "Atext")]
    pub text: String,
    #[serde(rename = "isCorrect", default)]
    pub is_correct: bool,
}

impl Default for Answer {
    fn default() -> Self {
        Self {
            text: DEFAULT_ANSWER_TEXT.to_string(),
            is_correct: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    #[serde(rename = "src")]
    pub source: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub collapsed: bool,
}

impl Image {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            width: DEFAULT_IMAGE_SIZE,
            height: DEFAULT_IMAGE_SIZE,
            collapsed: false,
        }
    }
}

/// Read/write access to the rich text and image of whatever node a block
/// wraps. Answers have no image.
pub trait Node {
    fn text(&self) -> &str;
    fn set_text(&mut self, text: String);

    fn image(&self) -> Option<&Image> {
        None
    }

    fn set_image(&mut self, _image: Option<Image>) {}
}

impl Node for Question {
    fn text(&self) -> &str {
        &self.text
    }

    fn set_text(&mut self, text: String) {
        self.text = text;
    }

    fn image(&self) -> Option<&Image> {
        self.image.as_ref()
    }

    fn set_image(&mut self, image: Option<Image>) {
        self.image = image;
    }
}

impl Node for Answer {
    fn text(&self) -> &str {
        &self.text
    }

    fn set_text(&mut self, text: String) {
        self.text = text;
    }
}
