use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationError};

/// Number of questions the model is asked for.
pub const QUESTIONS_PER_QUIZ: usize = 5;

/// Number of answer options per question.
pub const OPTIONS_PER_QUESTION: usize = 4;

/// Fields kept when answers are hidden.
const STEM_FIELDS: [&str; 2] = ["question", "options"];

/// Body of `POST /generate`.
#[derive(Debug, Clone, Deserialize)]
pub struct QuizRequest {
    /// Source text the quiz is written about.
    pub prompt: String,

    /// Strip answers and explanations from the response.
    #[serde(default)]
    pub hide_answers: bool,
}

/// Typed view of one generated question. Only used to check the model's
/// output; responses carry the output itself.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_answer_index"))]
pub struct Question {
    pub question: String,

    #[validate(length(equal = 4))]
    pub options: Vec<String>,

    /// Zero-based index into `options`.
    pub correct_answer_index: i64,

    #[serde(default)]
    pub explanation: Option<String>,
}

fn validate_answer_index(question: &Question) -> Result<(), ValidationError> {
    let in_range = usize::try_from(question.correct_answer_index)
        .map(|index| index < question.options.len())
        .unwrap_or(false);

    if in_range {
        Ok(())
    } else {
        let mut err = ValidationError::new("answer_index_out_of_range");
        err.message = Some("correctAnswerIndex does not point at an option".into());
        Err(err)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
#[validate(schema(function = "validate_question_count"))]
pub struct Quiz {
    #[validate(nested)]
    pub questions: Vec<Question>,
}

impl Quiz {
    /// Read the typed quiz out of a generated `questions` value.
    pub fn from_questions(questions: &Value) -> Result<Self, serde_json::Error> {
        Ok(Self {
            questions: Vec::<Question>::deserialize(questions)?,
        })
    }
}

fn validate_question_count(quiz: &Quiz) -> Result<(), ValidationError> {
    if quiz.questions.len() == QUESTIONS_PER_QUIZ {
        Ok(())
    } else {
        let mut err = ValidationError::new("question_count");
        err.message = Some(
            format!(
                "expected {} questions, got {}",
                QUESTIONS_PER_QUIZ,
                quiz.questions.len()
            )
            .into(),
        );
        Err(err)
    }
}

/// Response body of `POST /generate`: the model's `questions` value as generated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizResponse {
    pub questions: Value,
}

impl QuizResponse {
    pub fn new(questions: Value, hide_answers: bool) -> Self {
        let questions = if hide_answers {
            strip_answers(questions)
        } else {
            questions
        };
        Self { questions }
    }
}

/// Reduce every question object to its `question` and `options`. Anything
/// that is not a list of objects passes through untouched.
pub fn strip_answers(questions: Value) -> Value {
    match questions {
        Value::Array(items) => Value::Array(items.into_iter().map(question_stem).collect()),
        other => other,
    }
}

fn question_stem(item: Value) -> Value {
    match item {
        Value::Object(mut fields) => {
            let mut stem = Map::new();
            for key in STEM_FIELDS {
                if let Some(value) = fields.remove(key) {
                    stem.insert(key.to_string(), value);
                }
            }
            Value::Object(stem)
        }
        other => other,
    }
}
