//! Question-bank loading.

mod loader;

pub use loader::{FileSource, QuestionSource, StaticSource, parse_question_bank};
