//! Loaders for the JSON schema and response documents.

use log::warn;

use snafu::prelude::*;

use std::fs;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use survey_core::{AnswerValue, Question, QuestionType, Response};

use crate::app::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
struct QuestionDoc {
    question: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    items: Vec<String>,
    #[serde(default)]
    scale: Vec<String>,
    max_selections: Option<u32>,
}

fn question_type(kind: &str, id: &str) -> AppResult<QuestionType> {
    match kind {
        "identifier" => Ok(QuestionType::Identifier),
        "single_choice" => Ok(QuestionType::SingleChoice),
        "multiple_choice" => Ok(QuestionType::MultipleChoice),
        "matrix" => Ok(QuestionType::Matrix),
        "ranking" => Ok(QuestionType::Ranking),
        "open_text" => Ok(QuestionType::OpenText),
        _ => UnknownQuestionTypeSnafu { kind, id }.fail(),
    }
}

/// Parses a schema document. The order of the 'questions' mapping defines
/// the declaration order of the questions.
pub fn parse_schema(contents: &str, path: &str) -> AppResult<Vec<Question>> {
    let js: JSValue = serde_json::from_str(contents).context(ParsingJsonSnafu { path })?;
    let mapping = match js.get("questions").and_then(|qs| qs.as_object()) {
        Some(m) => m,
        None => return MissingQuestionsSnafu { path }.fail(),
    };
    let mut questions: Vec<Question> = Vec::new();
    for (id, value) in mapping.iter() {
        let doc: QuestionDoc =
            serde_json::from_value(value.clone()).context(ParsingJsonSnafu { path })?;
        let qtype = question_type(doc.kind.as_str(), id.as_str())?;
        let mut q = Question::new(id.as_str(), doc.question.as_str(), qtype);
        q.options = doc.options;
        q.items = doc.items;
        q.scale = doc.scale;
        q.max_selections = doc.max_selections;
        questions.push(q);
    }
    Ok(questions)
}

pub fn read_schema(path: &str) -> AppResult<Vec<Question>> {
    let contents = fs::read_to_string(path).context(OpeningDocumentSnafu { path })?;
    parse_schema(contents.as_str(), path)
}

fn string_of(value: &JSValue) -> Option<String> {
    match value {
        JSValue::String(s) => Some(s.clone()),
        JSValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// Converts one answer field, dispatching on the declared question type.
// Mismatched shapes are reported and skipped, never fatal.
fn convert_answer(question: &Question, value: &JSValue) -> Option<AnswerValue> {
    if value.is_null() {
        return None;
    }
    match question.qtype {
        QuestionType::Identifier => None,
        QuestionType::SingleChoice => string_of(value).map(AnswerValue::Single),
        QuestionType::OpenText => string_of(value).map(AnswerValue::Text),
        QuestionType::MultipleChoice => match value {
            JSValue::Array(vs) => {
                let selections: Vec<String> = vs.iter().filter_map(string_of).collect();
                Some(AnswerValue::Multi(selections))
            }
            // A bare string is accepted as a single selection.
            JSValue::String(s) => Some(AnswerValue::Multi(vec![s.clone()])),
            _ => None,
        },
        QuestionType::Matrix => match value {
            JSValue::Object(cells) => {
                let pairs: Vec<(String, String)> = cells
                    .iter()
                    .filter_map(|(item, label)| string_of(label).map(|l| (item.clone(), l)))
                    .collect();
                Some(AnswerValue::Grid(pairs))
            }
            _ => None,
        },
        QuestionType::Ranking => match value {
            // An ordered array of option names, most preferred first.
            JSValue::Array(vs) => {
                let pairs: Vec<(String, u32)> = vs
                    .iter()
                    .filter_map(string_of)
                    .enumerate()
                    .map(|(idx, option)| (option, (idx + 1) as u32))
                    .collect();
                Some(AnswerValue::Ranked(pairs))
            }
            // A mapping from option name to 1-based rank.
            JSValue::Object(entries) => {
                let pairs: Vec<(String, u32)> = entries
                    .iter()
                    .filter_map(|(option, rank)| {
                        rank.as_u64().map(|r| (option.clone(), r as u32))
                    })
                    .collect();
                Some(AnswerValue::Ranked(pairs))
            }
            _ => None,
        },
    }
}

/// Parses a response document: a JSON array of flat records mapping question
/// ids to answers.
pub fn parse_responses(
    contents: &str,
    questions: &[Question],
    path: &str,
) -> AppResult<Vec<Response>> {
    let js: JSValue = serde_json::from_str(contents).context(ParsingJsonSnafu { path })?;
    let records = match js.as_array() {
        Some(rs) => rs,
        None => whatever!("The response document {} is not a JSON array", path),
    };
    let identifier = questions
        .iter()
        .find(|q| q.qtype == QuestionType::Identifier)
        .map(|q| q.id.clone());

    let mut responses: Vec<Response> = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        let id = identifier
            .as_ref()
            .and_then(|qid| record.get(qid))
            .and_then(string_of)
            .unwrap_or_else(|| (idx + 1).to_string());
        let mut response = Response::new(id.as_str());
        for q in questions.iter() {
            let field = match record.get(&q.id) {
                Some(v) => v,
                None => continue,
            };
            match convert_answer(q, field) {
                Some(answer) => response.insert(&q.id, answer),
                None if field.is_null() || q.qtype == QuestionType::Identifier => {}
                None => {
                    warn!(
                        "Skipping answer of unexpected shape for question {:?} in record {:?}",
                        q.id, id
                    );
                }
            }
        }
        responses.push(response);
    }
    Ok(responses)
}

pub fn read_responses(path: &str, questions: &[Question]) -> AppResult<Vec<Response>> {
    let contents = fs::read_to_string(path).context(OpeningDocumentSnafu { path })?;
    parse_responses(contents.as_str(), questions, path)
}
