use log::{info, warn};

use snafu::{prelude::*, Snafu};

use std::fs;

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use survey_core::*;
use text_diff::print_diff;

use crate::args::Args;

pub mod io_json;
pub mod io_xlsx;

#[derive(Debug, Snafu)]
pub enum AppError {
    #[snafu(display("Error opening file {path}"))]
    OpeningDocument {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON document {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error opening workbook {path}"))]
    OpeningWorkbook {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Workbook {path} has no readable sheet"))]
    EmptyWorkbook { path: String },
    #[snafu(display("The schema document {path} has no 'questions' mapping"))]
    MissingQuestions { path: String },
    #[snafu(display("Unknown question type {kind:?} for question {id}"))]
    UnknownQuestionType { kind: String, id: String },
    #[snafu(display("{source}"))]
    #[snafu(context(false))]
    Engine { source: AnalysisError },
    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type AppResult<T> = Result<T, AppError>;

// An ad-hoc filter as written on the command line: 'qid=value' or 'qid!=value'.
fn parse_filter_spec(spec: &str) -> AppResult<(String, String, bool)> {
    if let Some((qid, value)) = spec.split_once("!=") {
        if !qid.is_empty() {
            return Ok((qid.to_string(), value.to_string(), true));
        }
    } else if let Some((qid, value)) = spec.split_once('=') {
        if !qid.is_empty() {
            return Ok((qid.to_string(), value.to_string(), false));
        }
    }
    whatever!(
        "Cannot parse filter {:?}: expected 'question_id=value' or 'question_id!=value'",
        spec
    )
}

// A demographic restriction as written on the command line: 'qid:v1,v2'.
fn parse_accept_spec(spec: &str) -> AppResult<(String, Vec<String>)> {
    match spec.split_once(':') {
        Some((qid, values)) if !qid.is_empty() => {
            let accepted: Vec<String> = values
                .split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();
            Ok((qid.to_string(), accepted))
        }
        _ => whatever!(
            "Cannot parse acceptance {:?}: expected 'question_id:value1,value2'",
            spec
        ),
    }
}

fn parse_combine_mode(mode: &Option<String>) -> AppResult<CombineMode> {
    match mode.as_deref() {
        None | Some("and") => Ok(CombineMode::And),
        Some("or") => Ok(CombineMode::Or),
        Some(x) => whatever!("Cannot use combine mode {:?}: expected 'and' or 'or'", x),
    }
}

fn choice_to_json(question: &Question, agg: &ChoiceAggregate) -> JSValue {
    let mut counts: JSMap<String, JSValue> = JSMap::new();
    for (label, count) in agg.sorted_by_count() {
        counts.insert(label, json!(count));
    }
    json!({
        "question": question.id,
        "type": "choice",
        "counts": counts,
        "otherAnswers": agg.other_answers,
        "totalConsidered": agg.total_considered,
    })
}

fn matrix_to_json(question: &Question, agg: &MatrixAggregate) -> JSValue {
    json!({
        "question": question.id,
        "type": "matrix",
        "items": agg.items,
        "scale": agg.scale,
        "table": agg.table,
    })
}

fn ranking_to_json(question: &Question, agg: &RankingAggregate) -> JSValue {
    let mut means: JSMap<String, JSValue> = JSMap::new();
    for (option, score) in agg.by_preference() {
        let v = match score {
            RankScore::Mean(m) => json!(format!("{:.2}", m)),
            RankScore::Unranked => json!("unranked"),
        };
        means.insert(option, v);
    }
    let mut weighted: JSMap<String, JSValue> = JSMap::new();
    for (option, w) in agg.weighted.iter() {
        weighted.insert(option.clone(), json!(w));
    }
    json!({
        "question": question.id,
        "type": "ranking",
        "meanRanks": means,
        "weightedScores": weighted,
    })
}

fn texts_to_json(question: &Question, agg: &TextAggregate) -> JSValue {
    json!({
        "question": question.id,
        "type": "texts",
        "texts": agg.texts,
    })
}

fn question_to_json(engine: &SurveyEngine, question: &Question) -> Option<JSValue> {
    match engine.analyze(&question.id) {
        AggregateResult::Choice(agg) => Some(choice_to_json(question, &agg)),
        AggregateResult::Matrix(agg) => Some(matrix_to_json(question, &agg)),
        AggregateResult::Ranking(agg) => Some(ranking_to_json(question, &agg)),
        AggregateResult::Texts(agg) => Some(texts_to_json(question, &agg)),
        AggregateResult::Unsupported => None,
    }
}

fn build_summary_js(engine: &SurveyEngine, question: &Option<String>) -> JSValue {
    let results: Vec<JSValue> = match question {
        Some(qid) => engine
            .schema()
            .get(qid)
            .and_then(|q| question_to_json(engine, q))
            .into_iter()
            .collect(),
        None => engine
            .list_analyzable_questions()
            .into_iter()
            .filter_map(|q| question_to_json(engine, q))
            .collect(),
    };
    json!({
        "totalResponses": engine.total_size(),
        "subsetSize": engine.current_subset_size(),
        "results": results,
    })
}

fn read_summary(path: &str) -> AppResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningDocumentSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(js)
}

fn load_responses(args: &Args, path: &str, questions: &[Question]) -> AppResult<Vec<Response>> {
    match args.input_type.as_deref() {
        None | Some("json") => io_json::read_responses(path, questions),
        Some("xlsx") => io_xlsx::read_responses(path, questions),
        Some(x) => whatever!("Unknown input type {:?}: expected 'json' or 'xlsx'", x),
    }
}

pub fn run_analysis(args: &Args) -> AppResult<()> {
    let schema_path = match &args.schema {
        Some(p) => p.clone(),
        None => whatever!("No schema file provided (--schema)"),
    };
    let questions = io_json::read_schema(schema_path.as_str())?;
    info!("schema: {:?} questions", questions.len());

    if args.list_questions {
        for q in questions.iter() {
            if q.qtype != QuestionType::Identifier {
                println!("{}\t{:?}\t{}", q.id, q.qtype, q.text);
            }
        }
        return Ok(());
    }

    let data_path = match &args.data {
        Some(p) => p.clone(),
        None => whatever!("No response file provided (--data)"),
    };
    let responses = load_responses(args, data_path.as_str(), &questions)?;
    info!("data: {:?} responses", responses.len());

    let demographics: Vec<&str> = args.demographics.iter().map(|s| s.as_str()).collect();
    let mut engine = Builder::new()
        .schema(questions)?
        .demographics(&demographics)?
        .responses(responses)?
        .build()?;

    for spec in args.accept.iter() {
        let (qid, accepted) = parse_accept_spec(spec)?;
        // Restrict the question to exactly the listed values.
        for (value, _) in engine.demographic_options(qid.as_str()) {
            let keep = accepted.iter().any(|v| v == &value);
            engine.set_demographic_acceptance(qid.as_str(), value.as_str(), keep);
        }
    }

    for spec in args.filter.iter() {
        let (qid, value, negate) = parse_filter_spec(spec)?;
        let id = engine.add_adhoc_filter();
        engine.set_adhoc_filter(id, qid.as_str(), value.as_str(), negate);
    }
    engine.set_combine_mode(parse_combine_mode(&args.mode)?);

    info!(
        "subset: {:?} of {:?} responses",
        engine.current_subset_size(),
        engine.total_size()
    );

    let summary_js = build_summary_js(&engine, &args.question);
    let pretty_js_summary =
        serde_json::to_string_pretty(&summary_js).context(ParsingJsonSnafu { path: "summary" })?;

    match args.out.as_deref() {
        None | Some("stdout") => println!("{}", pretty_js_summary),
        Some(path) => {
            fs::write(path, pretty_js_summary.as_str()).context(OpeningDocumentSnafu { path })?
        }
    }

    // The reference summary, if provided for comparison
    if let Some(reference_path) = &args.reference {
        let summary_ref = read_summary(reference_path.as_str())?;
        let pretty_js_summary_ref = serde_json::to_string_pretty(&summary_ref)
            .context(ParsingJsonSnafu { path: "summary" })?;
        if pretty_js_summary_ref != pretty_js_summary {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_summary.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA_DOC: &str = r#"{
        "questions": {
            "respondent_id": { "question": "Id", "type": "identifier" },
            "role": {
                "question": "What is your role?",
                "type": "single_choice",
                "options": ["Designer", "Artist"]
            },
            "engines": {
                "question": "Which engines do you use?",
                "type": "multiple_choice",
                "options": ["Unity", "Godot"]
            }
        }
    }"#;

    const DATA_DOC: &str = r#"[
        { "respondent_id": "1", "role": "Designer", "engines": ["Unity", "CustomEngine"] },
        { "respondent_id": "2", "role": "Artist" }
    ]"#;

    #[test]
    fn filter_specs_parse() {
        assert_eq!(
            parse_filter_spec("role=Designer").unwrap(),
            ("role".to_string(), "Designer".to_string(), false)
        );
        assert_eq!(
            parse_filter_spec("role!=Designer").unwrap(),
            ("role".to_string(), "Designer".to_string(), true)
        );
        assert!(parse_filter_spec("no separator").is_err());
        assert!(parse_filter_spec("=value").is_err());
    }

    #[test]
    fn accept_specs_parse() {
        assert_eq!(
            parse_accept_spec("role:Designer, Artist").unwrap(),
            (
                "role".to_string(),
                vec!["Designer".to_string(), "Artist".to_string()]
            )
        );
        assert!(parse_accept_spec("role").is_err());
    }

    #[test]
    fn combine_modes_parse() {
        assert!(matches!(parse_combine_mode(&None), Ok(CombineMode::And)));
        assert!(matches!(
            parse_combine_mode(&Some("or".to_string())),
            Ok(CombineMode::Or)
        ));
        assert!(parse_combine_mode(&Some("xor".to_string())).is_err());
    }

    #[test]
    fn summary_covers_all_analyzable_questions() {
        let questions = io_json::parse_schema(SCHEMA_DOC, "inline").unwrap();
        let responses = io_json::parse_responses(DATA_DOC, &questions, "inline").unwrap();
        let engine = Builder::new()
            .schema(questions)
            .unwrap()
            .responses(responses)
            .unwrap()
            .build()
            .unwrap();
        let js = build_summary_js(&engine, &None);
        assert_eq!(js["totalResponses"], json!(2));
        assert_eq!(js["subsetSize"], json!(2));
        let results = js["results"].as_array().unwrap();
        // The identifier question is not part of the summary.
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["question"], json!("role"));
        assert_eq!(results[1]["counts"]["Unity"], json!(1));
        assert_eq!(results[1]["counts"]["Other"], json!(1));
        assert_eq!(results[1]["otherAnswers"], json!(["CustomEngine"]));
    }

    #[test]
    fn single_question_summary() {
        let questions = io_json::parse_schema(SCHEMA_DOC, "inline").unwrap();
        let responses = io_json::parse_responses(DATA_DOC, &questions, "inline").unwrap();
        let engine = Builder::new()
            .schema(questions)
            .unwrap()
            .responses(responses)
            .unwrap()
            .build()
            .unwrap();
        let js = build_summary_js(&engine, &Some("role".to_string()));
        let results = js["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["counts"]["Designer"], json!(1));
        assert_eq!(results[0]["counts"]["Artist"], json!(1));
    }
}
