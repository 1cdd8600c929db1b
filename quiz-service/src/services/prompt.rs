//! Instruction template wrapped around the caller's text.

use crate::models::{OPTIONS_PER_QUESTION, QUESTIONS_PER_QUIZ};

/// Wrap `text` in the Mistral instruction format, asking for a JSON quiz and
/// nothing else.
pub fn build_quiz_prompt(text: &str) -> String {
    format!(
        r#"[INST] You are a quiz generator. Create {count} MCQs from the text below.
Return only JSON format like this:
{{
    "questions": [
        {{
            "question": "...",
            "options": [{options}],
            "correctAnswerIndex": 0,
            "explanation": "..."
        }}
    ]
}}

Text: {text}
[/INST]"#,
        count = QUESTIONS_PER_QUIZ,
        options = vec![r#""...""#; OPTIONS_PER_QUESTION].join(", "),
        text = text,
    )
}
