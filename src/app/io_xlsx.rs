//! Loader for spreadsheet exports of survey platforms.
//!
//! The first row holds question ids. Matrix and ranking questions spread
//! over one column per item ('question_id:item'); multi-select cells hold
//! the selections separated by ';' or ','.

use log::debug;

use snafu::prelude::*;

use std::collections::HashMap;

use calamine::{open_workbook, Reader, Xlsx};
use survey_core::{AnswerValue, Question, QuestionType, Response};

use crate::app::*;

enum ColumnTarget<'a> {
    Whole(&'a Question),
    Cell(&'a Question, String),
    Ignored,
}

fn cell_string(cell: &calamine::DataType) -> Option<String> {
    match cell {
        calamine::DataType::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        calamine::DataType::Float(f) if f.fract() == 0.0 => Some(format!("{}", *f as i64)),
        calamine::DataType::Float(f) => Some(f.to_string()),
        calamine::DataType::Int(i) => Some(i.to_string()),
        calamine::DataType::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn split_selections(cell: &str) -> Vec<String> {
    cell.split(|c| c == ';' || c == ',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn column_target<'a>(header: &str, questions: &'a [Question]) -> ColumnTarget<'a> {
    if let Some(q) = questions.iter().find(|q| q.id == header) {
        return ColumnTarget::Whole(q);
    }
    if let Some((qid, item)) = header.split_once(':') {
        let sub_question = questions.iter().find(|q| {
            q.id == qid.trim()
                && (q.qtype == QuestionType::Matrix || q.qtype == QuestionType::Ranking)
        });
        if let Some(q) = sub_question {
            return ColumnTarget::Cell(q, item.trim().to_string());
        }
    }
    debug!("column_target: ignoring unknown column {:?}", header);
    ColumnTarget::Ignored
}

pub fn read_responses(path: &str, questions: &[Question]) -> AppResult<Vec<Response>> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).context(OpeningWorkbookSnafu { path })?;
    let wrange = workbook
        .worksheet_range_at(0)
        .context(EmptyWorkbookSnafu { path })?
        .context(OpeningWorkbookSnafu { path })?;

    let header = wrange.rows().next().context(EmptyWorkbookSnafu { path })?;
    debug!("read_responses: header: {:?}", header);
    let targets: Vec<ColumnTarget> = header
        .iter()
        .map(|cell| match cell_string(cell) {
            Some(h) => column_target(h.as_str(), questions),
            None => ColumnTarget::Ignored,
        })
        .collect();

    let mut iter = wrange.rows();
    iter.next();
    let mut res: Vec<Response> = Vec::new();
    for (idx, row) in iter.enumerate() {
        debug!("read_responses: row: {:?}", row);
        let mut id = (idx + 1).to_string();
        let mut answers: Vec<(String, AnswerValue)> = Vec::new();
        let mut grids: HashMap<String, Vec<(String, String)>> = HashMap::new();
        let mut rankings: HashMap<String, Vec<(String, u32)>> = HashMap::new();

        for (target, cell) in targets.iter().zip(row.iter()) {
            let content = match cell_string(cell) {
                Some(c) => c,
                None => continue,
            };
            match target {
                ColumnTarget::Ignored => {}
                ColumnTarget::Whole(q) => match q.qtype {
                    QuestionType::Identifier => id = content,
                    QuestionType::SingleChoice => {
                        answers.push((q.id.clone(), AnswerValue::Single(content)))
                    }
                    QuestionType::OpenText => {
                        answers.push((q.id.clone(), AnswerValue::Text(content)))
                    }
                    QuestionType::MultipleChoice => answers.push((
                        q.id.clone(),
                        AnswerValue::Multi(split_selections(content.as_str())),
                    )),
                    // An undivided ranking column holds the options in
                    // preference order.
                    QuestionType::Ranking => {
                        let pairs = split_selections(content.as_str())
                            .into_iter()
                            .enumerate()
                            .map(|(i, option)| (option, (i + 1) as u32))
                            .collect();
                        answers.push((q.id.clone(), AnswerValue::Ranked(pairs)));
                    }
                    QuestionType::Matrix => {
                        debug!(
                            "read_responses: matrix question {:?} needs per-item columns",
                            q.id
                        );
                    }
                },
                ColumnTarget::Cell(q, item) => match q.qtype {
                    QuestionType::Matrix => grids
                        .entry(q.id.clone())
                        .or_default()
                        .push((item.clone(), content)),
                    QuestionType::Ranking => match content.parse::<u32>() {
                        Ok(rank) => rankings
                            .entry(q.id.clone())
                            .or_default()
                            .push((item.clone(), rank)),
                        Err(_) => debug!(
                            "read_responses: ignoring non-numeric rank {:?} for {:?}",
                            content, q.id
                        ),
                    },
                    _ => {}
                },
            }
        }

        let mut response = Response::new(id.as_str());
        for (qid, answer) in answers {
            response.insert(qid.as_str(), answer);
        }
        for (qid, cells) in grids {
            response.insert(qid.as_str(), AnswerValue::Grid(cells));
        }
        for (qid, pairs) in rankings {
            response.insert(qid.as_str(), AnswerValue::Ranked(pairs));
        }
        res.push(response);
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_questions() -> Vec<Question> {
        vec![
            Question::new("respondent_id", "Id", QuestionType::Identifier),
            Question::new("engines", "Engines?", QuestionType::MultipleChoice)
                .with_options(&["Unity", "Godot"]),
            Question::new("tools", "Tools?", QuestionType::Matrix)
                .with_items(&["Houdini"])
                .with_scale(&["None", "Some"]),
        ]
    }

    #[test]
    fn cells_convert_to_strings() {
        assert_eq!(
            cell_string(&calamine::DataType::String("  a  ".to_string())),
            Some("a".to_string())
        );
        assert_eq!(
            cell_string(&calamine::DataType::Float(3.0)),
            Some("3".to_string())
        );
        assert_eq!(
            cell_string(&calamine::DataType::Float(2.5)),
            Some("2.5".to_string())
        );
        assert_eq!(cell_string(&calamine::DataType::Empty), None);
        assert_eq!(
            cell_string(&calamine::DataType::String("   ".to_string())),
            None
        );
    }

    #[test]
    fn multi_select_cells_split() {
        assert_eq!(
            split_selections("Unity; Godot,Unreal; "),
            vec![
                "Unity".to_string(),
                "Godot".to_string(),
                "Unreal".to_string()
            ]
        );
    }

    #[test]
    fn headers_resolve_to_columns() {
        let questions = sample_questions();
        assert!(matches!(
            column_target("engines", &questions),
            ColumnTarget::Whole(q) if q.id == "engines"
        ));
        assert!(matches!(
            column_target("tools:Houdini", &questions),
            ColumnTarget::Cell(q, item) if q.id == "tools" && item == "Houdini"
        ));
        assert!(matches!(
            column_target("unrelated", &questions),
            ColumnTarget::Ignored
        ));
    }
}
