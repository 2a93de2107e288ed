// ********* Input data structures ***********

use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;

/// Label under which out-of-vocabulary answers are grouped.
///
/// For demographic filters it doubles as a sentinel in the accepted set:
/// accepting `"Other"` accepts every response whose value is not part of the
/// question's declared options.
pub const OTHER_LABEL: &str = "Other";

/// All the question kinds understood by the aggregator.
///
/// The set is closed: every variant has a defined aggregation behavior
/// (`Identifier` deliberately aggregates to an unsupported marker).
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum QuestionType {
    /// Respondent identifier column. Not analyzable, not filterable.
    Identifier,
    /// Exactly one answer out of the declared options.
    SingleChoice,
    /// Zero or more answers out of the declared options.
    MultipleChoice,
    /// Several items rated against one shared ordinal scale.
    Matrix,
    /// An ordered preference over the declared options.
    Ranking,
    /// Free text.
    OpenText,
}

/// A question as declared by the schema document.
///
/// `options`, when present, is the authoritative vocabulary for non-"other"
/// answers of that question.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub qtype: QuestionType,
    pub options: Vec<String>,
    /// Matrix rows.
    pub items: Vec<String>,
    /// Matrix / ranking scale labels.
    pub scale: Vec<String>,
    pub max_selections: Option<u32>,
    /// Demographic questions carry an always-on inclusion-set filter.
    pub demographic: bool,
}

impl Question {
    pub fn new(id: &str, text: &str, qtype: QuestionType) -> Question {
        Question {
            id: id.to_string(),
            text: text.to_string(),
            qtype,
            options: Vec::new(),
            items: Vec::new(),
            scale: Vec::new(),
            max_selections: None,
            demographic: false,
        }
    }

    pub fn with_options(mut self, options: &[&str]) -> Question {
        self.options = options.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_items(mut self, items: &[&str]) -> Question {
        self.items = items.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_scale(mut self, scale: &[&str]) -> Question {
        self.scale = scale.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_max_selections(mut self, max: u32) -> Question {
        self.max_selections = Some(max);
        self
    }
}

/// The value a respondent gave for one question.
///
/// The shape is discriminated by the owning question's declared type; the
/// loaders are responsible for producing the matching variant.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AnswerValue {
    /// One selected option (SingleChoice).
    Single(String),
    /// The selected options, in selection order (MultipleChoice).
    Multi(Vec<String>),
    /// (item, scale label) pairs (Matrix).
    Grid(Vec<(String, String)>),
    /// (option, rank) pairs, rank 1 being the most preferred (Ranking).
    Ranked(Vec<(String, u32)>),
    /// Free text (OpenText).
    Text(String),
}

impl AnswerValue {
    /// An answer that carries no usable content.
    pub fn is_blank(&self) -> bool {
        match self {
            AnswerValue::Single(s) => s.trim().is_empty(),
            AnswerValue::Multi(vs) => vs.is_empty(),
            AnswerValue::Grid(cells) => cells.is_empty(),
            AnswerValue::Ranked(pairs) => pairs.is_empty(),
            AnswerValue::Text(s) => s.trim().is_empty(),
        }
    }
}

/// One respondent record: a mapping from question id to answer.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Response {
    pub id: String,
    answers: HashMap<String, AnswerValue>,
}

impl Response {
    pub fn new(id: &str) -> Response {
        Response {
            id: id.to_string(),
            answers: HashMap::new(),
        }
    }

    pub fn insert(&mut self, question_id: &str, value: AnswerValue) {
        self.answers.insert(question_id.to_string(), value);
    }

    pub fn with_answer(mut self, question_id: &str, value: AnswerValue) -> Response {
        self.insert(question_id, value);
        self
    }

    pub fn answer(&self, question_id: &str) -> Option<&AnswerValue> {
        self.answers.get(question_id)
    }
}

// ******** Filter state structures *********

/// AND/OR semantics applied across the active ad-hoc filter list.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum CombineMode {
    And,
    Or,
}

/// Handle for an ad-hoc filter slot. Stays valid until the slot is removed;
/// operations on a removed handle are silently ignored.
pub type FilterId = u64;

/// A fully specified ad-hoc predicate, as reported by the engine.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AdHocFilter {
    pub question_id: String,
    pub value: String,
    pub negate: bool,
}

// ******** Output data structures *********

/// Aggregate for SingleChoice and MultipleChoice questions.
///
/// `counts` keeps the schema's option order with zero buckets dropped; a
/// synthesized `"Other"` bucket is appended only when `other_answers` is
/// non-empty. `total_considered` counts contributing responses, so for a
/// SingleChoice question it equals the sum of the buckets.
#[derive(PartialEq, Debug, Clone)]
pub struct ChoiceAggregate {
    pub counts: Vec<(String, u64)>,
    pub other_answers: Vec<String>,
    pub total_considered: u64,
}

impl ChoiceAggregate {
    pub fn count_of(&self, label: &str) -> u64 {
        self.counts
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }

    /// The buckets sorted by descending count, for display.
    pub fn sorted_by_count(&self) -> Vec<(String, u64)> {
        let mut res = self.counts.clone();
        res.sort_by(|a, b| b.1.cmp(&a.1));
        res
    }
}

/// Aggregate for Matrix questions: a fully materialized item×scale table.
/// Absent combinations are explicit zeros, never missing entries.
#[derive(PartialEq, Debug, Clone)]
pub struct MatrixAggregate {
    pub items: Vec<String>,
    pub scale: Vec<String>,
    /// `table[i][j]` is the count for `items[i]` rated `scale[j]`.
    pub table: Vec<Vec<u64>>,
}

impl MatrixAggregate {
    pub fn cell(&self, item: &str, label: &str) -> Option<u64> {
        let i = self.items.iter().position(|x| x == item)?;
        let j = self.scale.iter().position(|x| x == label)?;
        Some(self.table[i][j])
    }
}

/// The rank statistic of one option of a Ranking question.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum RankScore {
    /// Mean 1-based rank over the responses that ranked the option.
    /// Lower is more preferred.
    Mean(f64),
    /// No response in the current subset ranked this option.
    Unranked,
}

/// Aggregate for Ranking questions.
#[derive(PartialEq, Debug, Clone)]
pub struct RankingAggregate {
    /// Mean rank per declared option, in schema option order.
    pub entries: Vec<(String, RankScore)>,
    /// Weighted top-N scores (rank 1 = N points, rank N = 1 point, with N
    /// the question's `max_selections`), in schema option order.
    pub weighted: Vec<(String, f64)>,
}

impl RankingAggregate {
    pub fn score_of(&self, option: &str) -> Option<RankScore> {
        self.entries
            .iter()
            .find(|(o, _)| o == option)
            .map(|(_, s)| *s)
    }

    /// Options ordered for display: ranked options ascending by mean rank,
    /// unranked options last in schema order.
    pub fn by_preference(&self) -> Vec<(String, RankScore)> {
        let mut ranked: Vec<(String, RankScore)> = Vec::new();
        let mut unranked: Vec<(String, RankScore)> = Vec::new();
        for (option, score) in self.entries.iter() {
            match score {
                RankScore::Mean(_) => ranked.push((option.clone(), *score)),
                RankScore::Unranked => unranked.push((option.clone(), *score)),
            }
        }
        ranked.sort_by(|a, b| {
            let x = match a.1 {
                RankScore::Mean(m) => m,
                RankScore::Unranked => f64::MAX,
            };
            let y = match b.1 {
                RankScore::Mean(m) => m,
                RankScore::Unranked => f64::MAX,
            };
            x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.extend(unranked);
        ranked
    }
}

/// Aggregate for OpenText questions: the non-blank answers in response
/// order. Truncation for display is the renderer's concern.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TextAggregate {
    pub texts: Vec<String>,
}

/// The result of analyzing one question, dispatched on its declared type.
#[derive(PartialEq, Debug, Clone)]
pub enum AggregateResult {
    Choice(ChoiceAggregate),
    Matrix(MatrixAggregate),
    Ranking(RankingAggregate),
    Texts(TextAggregate),
    /// Returned for `Identifier` questions and for unknown question ids.
    Unsupported,
}

/// Errors that prevent the engine from being constructed.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AnalysisError {
    MissingSchema,
    MissingResponses,
    EmptySchema,
    DuplicateQuestion(String),
    DuplicateOption(String, String),
}

impl Error for AnalysisError {}

impl Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisError::MissingSchema => write!(f, "no schema document was provided"),
            AnalysisError::MissingResponses => write!(f, "no response document was provided"),
            AnalysisError::EmptySchema => write!(f, "the schema document declares no questions"),
            AnalysisError::DuplicateQuestion(id) => {
                write!(f, "duplicate question id in schema: {}", id)
            }
            AnalysisError::DuplicateOption(qid, opt) => {
                write!(f, "duplicate option {:?} for question {}", opt, qid)
            }
        }
    }
}
