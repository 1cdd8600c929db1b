//! Pulls the quiz JSON out of free-form model output.
//!
//! Models wrap their answer in prose ("Here is the quiz: ... Hope this
//! helps!"). The span from the first `{` to the last `}` is taken as the JSON
//! document; everything outside it is discarded.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no JSON object found in model output")]
    NoJsonObject,

    #[error("model output is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("JSON object has no `questions` field")]
    MissingQuestions,
}

/// Slice from the first `{` through the last `}`, inclusive.
///
/// `None` when there is no `{`, no `}`, or the last `}` precedes the first `{`.
pub fn json_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parse the embedded JSON object and return its `questions` value untouched.
pub fn extract_questions(text: &str) -> Result<Value, ExtractError> {
    let span = json_object_span(text).ok_or(ExtractError::NoJsonObject)?;
    let mut document: Value = serde_json::from_str(span)?;

    document
        .get_mut("questions")
        .map(Value::take)
        .ok_or(ExtractError::MissingQuestions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn surrounding_prose_is_discarded() {
        let output = r#"Here is the quiz: {"questions": [{"question":"Boiling point of water?","options":["90C","100C","110C","120C"],"correctAnswerIndex":1,"explanation":"Standard atmospheric pressure."}]} Hope this helps!"#;

        let questions = extract_questions(output).unwrap();

        assert_eq!(
            questions,
            json!([{
                "question": "Boiling point of water?",
                "options": ["90C", "100C", "110C", "120C"],
                "correctAnswerIndex": 1,
                "explanation": "Standard atmospheric pressure."
            }])
        );
    }

    #[test]
    fn nested_objects_stay_inside_the_span() {
        let output = r#"{"questions": [{"question": "a"}, {"question": "b"}]}"#;
        assert_eq!(json_object_span(output), Some(output));
        assert_eq!(extract_questions(output).unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn text_without_braces_has_no_object() {
        assert!(json_object_span("I could not think of any questions.").is_none());
        assert!(matches!(
            extract_questions("I could not think of any questions."),
            Err(ExtractError::NoJsonObject)
        ));
    }

    #[test]
    fn empty_output_has_no_object() {
        assert!(matches!(extract_questions(""), Err(ExtractError::NoJsonObject)));
    }

    #[test]
    fn closing_brace_before_opening_brace_is_rejected() {
        assert!(json_object_span("} oops {").is_none());
    }

    #[test]
    fn opening_brace_only_is_rejected() {
        assert!(matches!(
            extract_questions(r#"{"questions": ["#),
            Err(ExtractError::NoJsonObject)
        ));
    }

    #[test]
    fn truncated_json_is_invalid() {
        assert!(matches!(
            extract_questions(r#"{"questions": [}"#),
            Err(ExtractError::InvalidJson(_))
        ));
    }

    #[test]
    fn two_objects_make_an_invalid_span() {
        let output = r#"{"questions": []} and also {"questions": []}"#;
        assert!(matches!(
            extract_questions(output),
            Err(ExtractError::InvalidJson(_))
        ));
    }

    #[test]
    fn object_without_questions_is_rejected() {
        assert!(matches!(
            extract_questions(r#"Sure! {"quiz": []}"#),
            Err(ExtractError::MissingQuestions)
        ));
    }

    #[test]
    fn multibyte_text_around_the_object_is_handled() {
        let output = "Voilà — le quiz : {\"questions\": [\"é\"]} ✓";
        assert_eq!(extract_questions(output).unwrap(), json!(["é"]));
    }
}
