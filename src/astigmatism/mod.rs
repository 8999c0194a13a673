pub mod questionnaire;
pub mod verdict;

pub use questionnaire::{AstigmatismOutcome, AstigmatismQuestionnaire, Question};
pub use verdict::{evaluate, AstigmatismAnswers, AstigmatismVerdict};
