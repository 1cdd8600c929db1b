//! Request and quiz types exchanged over HTTP.

pub mod quiz;

pub use quiz::{
    strip_answers, Question, Quiz, QuizRequest, QuizResponse, OPTIONS_PER_QUESTION,
    QUESTIONS_PER_QUIZ,
};
