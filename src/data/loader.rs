use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::warn;

use crate::models::Question;

/// Where the session fetches its question bank from, at startup and again
/// on every session reset.
pub trait QuestionSource: Send + Sync {
    fn load(&self) -> Vec<Question>;
}

/// JSON-file-backed question bank.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl QuestionSource for FileSource {
    fn load(&self) -> Vec<Question> {
        match fs::read_to_string(&self.path) {
            Ok(content) => parse_question_bank(&content),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read question bank");
                Vec::new()
            }
        }
    }
}

/// Fixed in-memory bank, for embedding and tests.
pub struct StaticSource {
    questions: Vec<Question>,
}

impl StaticSource {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }
}

impl QuestionSource for StaticSource {
    fn load(&self) -> Vec<Question> {
        self.questions.clone()
    }
}

/// One entry of the posted-quiz file format. The question text may appear
/// under either `question` or `text`; `answer` holds the correct choice's
/// text and falls back to the first choice when missing or unmatched.
#[derive(Deserialize)]
struct RawQuestion {
    #[serde(alias = "question")]
    text: String,
    choices: Vec<String>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
}

/// Parse a JSON array of posted quiz questions; ids are assigned
/// sequentially. An unparseable file yields an empty bank.
pub fn parse_question_bank(json: &str) -> Vec<Question> {
    let raw: Vec<RawQuestion> = match serde_json::from_str(json) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "failed to parse question bank");
            return Vec::new();
        }
    };
    raw.into_iter()
        .enumerate()
        .map(|(i, q)| {
            let correct_index = q
                .answer
                .as_deref()
                .and_then(|answer| q.choices.iter().position(|c| c == answer))
                .unwrap_or(0);
            Question {
                id: i as u32 + 1,
                text: q.text,
                choices: q.choices,
                correct_index,
                explanation: q.explanation,
            }
        })
        .collect()
}
