pub mod builder;
pub mod manual;
mod model;
mod schema;

use log::{debug, info, warn};

use std::collections::{HashMap, HashSet};

pub use crate::builder::*;
pub use crate::model::*;
pub use crate::schema::*;

// **** Private structures ****

// Acceptance state of one demographic question.
//
// Invariant: known_values is the question's options in schema order, with the
// "Other" sentinel appended only when the full store holds at least one
// out-of-vocabulary value for that question.
#[derive(Eq, PartialEq, Debug, Clone)]
struct DemographicState {
    known_values: Vec<String>,
    accepted: HashSet<String>,
}

impl DemographicState {
    fn all_accepted(&self) -> bool {
        self.known_values
            .iter()
            .all(|v| self.accepted.contains(v))
    }
}

// An ad-hoc filter slot. A freshly added slot has no target yet and takes no
// part in filtering until both question and value are assigned.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
struct AdHocSlot {
    question_id: Option<String>,
    value: Option<String>,
    negate: bool,
}

impl AdHocSlot {
    fn as_filter(&self) -> Option<AdHocFilter> {
        match (&self.question_id, &self.value) {
            (Some(q), Some(v)) => Some(AdHocFilter {
                question_id: q.clone(),
                value: v.clone(),
                negate: self.negate,
            }),
            _ => None,
        }
    }
}

/// The filtering-and-aggregation engine.
///
/// Owns the immutable schema and response store plus all mutable filter
/// state. The filtered subset is never materialized independently of its
/// inputs: [`SurveyEngine::current_subset`] recomputes it as a pure function
/// of the store and the filter state, and [`SurveyEngine::analyze`] always
/// operates on the subset as of call time.
///
/// Construct through [`Builder`], which enforces that both input documents
/// are present before any operation is reachable.
#[derive(Debug, Clone)]
pub struct SurveyEngine {
    schema: Schema,
    store: Vec<Response>,
    demographics: HashMap<String, DemographicState>,
    adhoc: Vec<(FilterId, AdHocSlot)>,
    mode: CombineMode,
    next_filter_id: FilterId,
}

impl SurveyEngine {
    pub(crate) fn from_parts(schema: Schema, store: Vec<Response>) -> SurveyEngine {
        info!(
            "Engine: {:?} responses, {:?} questions, {:?} demographic",
            store.len(),
            schema.questions().len(),
            schema.demographic_questions().len()
        );
        let mut demographics: HashMap<String, DemographicState> = HashMap::new();
        for q in schema.demographic_questions() {
            let state = initial_demographic_state(q, &store);
            debug!(
                "Engine: demographic {:?} known values: {:?}",
                q.id, state.known_values
            );
            demographics.insert(q.id.clone(), state);
        }
        SurveyEngine {
            schema,
            store,
            demographics,
            adhoc: Vec::new(),
            mode: CombineMode::And,
            next_filter_id: 1,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn total_size(&self) -> usize {
        self.store.len()
    }

    pub fn current_subset_size(&self) -> usize {
        self.current_subset().len()
    }

    /// Questions with a defined visualization, in schema order.
    pub fn list_analyzable_questions(&self) -> Vec<&Question> {
        self.schema.analyzable_questions()
    }

    // **** Demographic filters ****

    /// The selectable values of a demographic question with their counts
    /// over the full (unfiltered) store, sorted by descending count.
    ///
    /// The `"Other"` sentinel appears only when the store holds at least one
    /// out-of-vocabulary value; its count groups all such values.
    pub fn demographic_options(&self, question_id: &str) -> Vec<(String, u64)> {
        let lookup = (
            self.schema.get(question_id),
            self.demographics.get(question_id),
        );
        let (question, state) = match lookup {
            (Some(q), Some(s)) => (q, s),
            _ => {
                warn!(
                    "demographic_options: {:?} is not a demographic question",
                    question_id
                );
                return Vec::new();
            }
        };
        let mut counts: Vec<(String, u64)> = state
            .known_values
            .iter()
            .map(|v| (v.clone(), 0u64))
            .collect();
        for r in self.store.iter() {
            let value = match scalar_answer(r, question_id) {
                Some(v) => v,
                None => continue,
            };
            let label = if question.options.iter().any(|o| o == value) {
                value
            } else {
                OTHER_LABEL
            };
            if let Some(entry) = counts.iter_mut().find(|(l, _)| l.as_str() == label) {
                entry.1 += 1;
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
    }

    /// Idempotent toggle of one value (or the `"Other"` sentinel) in a
    /// demographic question's accepted set. Unknown question ids or values
    /// are logged no-ops.
    pub fn set_demographic_acceptance(&mut self, question_id: &str, value: &str, accepted: bool) {
        let state = match self.demographics.get_mut(question_id) {
            Some(s) => s,
            None => {
                warn!(
                    "set_demographic_acceptance: unknown demographic question {:?}",
                    question_id
                );
                return;
            }
        };
        if !state.known_values.iter().any(|v| v == value) {
            warn!(
                "set_demographic_acceptance: {:?} is not a known value of {:?}",
                value, question_id
            );
            return;
        }
        if accepted {
            state.accepted.insert(value.to_string());
        } else {
            state.accepted.remove(value);
        }
    }

    /// Select-all / select-none toggle: if every known value is accepted the
    /// set is cleared, otherwise it is set to the full known-value set.
    ///
    /// A cleared set makes every response carrying a value for this question
    /// fail the demographic stage. That is the intended reading of "none
    /// selected", not a special case.
    pub fn toggle_all_demographic(&mut self, question_id: &str) {
        let state = match self.demographics.get_mut(question_id) {
            Some(s) => s,
            None => {
                warn!(
                    "toggle_all_demographic: unknown demographic question {:?}",
                    question_id
                );
                return;
            }
        };
        if state.all_accepted() {
            state.accepted.clear();
        } else {
            state.accepted = state.known_values.iter().cloned().collect();
        }
    }

    // **** Ad-hoc filters ****

    /// Adds an empty ad-hoc filter slot and returns its handle. The slot is
    /// inactive until [`SurveyEngine::set_adhoc_filter`] assigns a target.
    pub fn add_adhoc_filter(&mut self) -> FilterId {
        let id = self.next_filter_id;
        self.next_filter_id += 1;
        self.adhoc.push((id, AdHocSlot::default()));
        id
    }

    /// Removes a filter slot. A stale handle is silently ignored so the
    /// caller may race ahead of its own removals.
    pub fn remove_adhoc_filter(&mut self, filter_id: FilterId) {
        self.adhoc.retain(|(id, _)| *id != filter_id);
    }

    /// Assigns the target of a filter slot. Stale handles are silently
    /// ignored; unknown question ids are logged no-ops.
    pub fn set_adhoc_filter(
        &mut self,
        filter_id: FilterId,
        question_id: &str,
        value: &str,
        negate: bool,
    ) {
        if self.schema.get(question_id).is_none() {
            warn!("set_adhoc_filter: unknown question {:?}", question_id);
            return;
        }
        if let Some((_, slot)) = self.adhoc.iter_mut().find(|(id, _)| *id == filter_id) {
            slot.question_id = Some(question_id.to_string());
            slot.value = Some(value.to_string());
            slot.negate = negate;
        }
    }

    pub fn set_combine_mode(&mut self, mode: CombineMode) {
        self.mode = mode;
    }

    pub fn combine_mode(&self) -> CombineMode {
        self.mode
    }

    /// The fully specified ad-hoc filters, in creation order.
    pub fn active_adhoc_filters(&self) -> Vec<AdHocFilter> {
        self.adhoc
            .iter()
            .filter_map(|(_, slot)| slot.as_filter())
            .collect()
    }

    pub fn clear_adhoc_filters(&mut self) {
        self.adhoc.clear();
    }

    /// Discards all filter state: demographics back to all-accepted, no
    /// ad-hoc filters, AND mode.
    pub fn reset_filters(&mut self) {
        self.clear_adhoc_filters();
        self.mode = CombineMode::And;
        for state in self.demographics.values_mut() {
            state.accepted = state.known_values.iter().cloned().collect();
        }
    }

    // **** Subset computation ****

    /// The current filtered subset, recomputed from scratch.
    ///
    /// A response passes when it survives the demographic stage (every
    /// demographic question's value is in that question's accepted set) and
    /// the ad-hoc stage (AND: all active filters, OR: at least one, vacuous
    /// when no filter is active).
    pub fn current_subset(&self) -> Vec<&Response> {
        let active = self.active_adhoc_filters();
        self.store
            .iter()
            .filter(|r| self.passes_demographics(r) && passes_adhoc(r, &active, self.mode))
            .collect()
    }

    fn passes_demographics(&self, response: &Response) -> bool {
        for q in self.schema.demographic_questions() {
            let state = &self.demographics[&q.id];
            // Missing and empty values always fail; they are excluded
            // rather than grouped under the sentinel.
            let value = match scalar_answer(response, &q.id) {
                Some(v) => v,
                None => return false,
            };
            let accepted = if q.options.iter().any(|o| o == value) {
                state.accepted.contains(value)
            } else {
                state.accepted.contains(OTHER_LABEL)
            };
            if !accepted {
                return false;
            }
        }
        true
    }

    // **** Aggregation ****

    /// Computes the type-appropriate aggregate for one question over the
    /// current subset. Unknown question ids yield a logged neutral result,
    /// never an error: the caller may race ahead of schema availability.
    pub fn analyze(&self, question_id: &str) -> AggregateResult {
        let question = match self.schema.get(question_id) {
            Some(q) => q,
            None => {
                warn!("analyze: unknown question {:?}", question_id);
                return AggregateResult::Unsupported;
            }
        };
        let subset = self.current_subset();
        debug!(
            "analyze: {:?} ({:?}) over {:?} of {:?} responses",
            question_id,
            question.qtype,
            subset.len(),
            self.store.len()
        );
        match question.qtype {
            QuestionType::Identifier => AggregateResult::Unsupported,
            QuestionType::SingleChoice | QuestionType::MultipleChoice => {
                AggregateResult::Choice(aggregate_choice(question, &subset))
            }
            QuestionType::Matrix => AggregateResult::Matrix(aggregate_matrix(question, &subset)),
            QuestionType::Ranking => {
                AggregateResult::Ranking(aggregate_ranking(question, &subset))
            }
            QuestionType::OpenText => AggregateResult::Texts(aggregate_text(question, &subset)),
        }
    }
}

// The demographic stage only ever inspects single-valued answers.
fn scalar_answer<'a>(response: &'a Response, question_id: &str) -> Option<&'a str> {
    match response.answer(question_id) {
        Some(AnswerValue::Single(s)) | Some(AnswerValue::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        }
        _ => None,
    }
}

fn initial_demographic_state(question: &Question, store: &[Response]) -> DemographicState {
    let has_out_of_vocab = store.iter().any(|r| match scalar_answer(r, &question.id) {
        Some(v) => !question.options.iter().any(|o| o == v),
        None => false,
    });
    let mut known_values = question.options.clone();
    if has_out_of_vocab {
        known_values.push(OTHER_LABEL.to_string());
    }
    let accepted = known_values.iter().cloned().collect();
    DemographicState {
        known_values,
        accepted,
    }
}

fn passes_adhoc(response: &Response, active: &[AdHocFilter], mode: CombineMode) -> bool {
    // OR over zero clauses must not exclude everyone.
    if active.is_empty() {
        return true;
    }
    match mode {
        CombineMode::And => active.iter().all(|f| filter_satisfied(f, response)),
        CombineMode::Or => active.iter().any(|f| filter_satisfied(f, response)),
    }
}

fn filter_satisfied(filter: &AdHocFilter, response: &Response) -> bool {
    let matched = match response.answer(&filter.question_id) {
        Some(answer) => answer_matches(answer, &filter.value),
        None => false,
    };
    if filter.negate {
        !matched
    } else {
        matched
    }
}

// Membership for multi-valued answers, exact string equality for
// single-valued ones. Grid answers are tested against their flattened
// "item: label" composites.
fn answer_matches(answer: &AnswerValue, target: &str) -> bool {
    match answer {
        AnswerValue::Single(s) | AnswerValue::Text(s) => s == target,
        AnswerValue::Multi(vs) => vs.iter().any(|v| v == target),
        AnswerValue::Ranked(pairs) => pairs.iter().any(|(option, _)| option == target),
        AnswerValue::Grid(cells) => cells
            .iter()
            .any(|(item, label)| format!("{}: {}", item, label) == target),
    }
}

fn aggregate_choice(question: &Question, subset: &[&Response]) -> ChoiceAggregate {
    let mut per_option: Vec<u64> = vec![0; question.options.len()];
    let mut other_answers: Vec<String> = Vec::new();
    let mut other_count: u64 = 0;
    let mut total_considered: u64 = 0;

    let mut bucket = |value: &str| {
        match question.options.iter().position(|o| o == value) {
            Some(idx) => per_option[idx] += 1,
            None => {
                other_answers.push(value.to_string());
                other_count += 1;
            }
        }
    };

    for r in subset.iter() {
        match r.answer(&question.id) {
            Some(AnswerValue::Single(s)) if !s.trim().is_empty() => {
                total_considered += 1;
                bucket(s);
            }
            Some(AnswerValue::Multi(vs)) if !vs.is_empty() => {
                // Duplicate selections, should they occur, are counted
                // verbatim.
                total_considered += 1;
                for v in vs.iter() {
                    bucket(v);
                }
            }
            _ => {
                // Empty and absent answers are excluded from the total.
            }
        }
    }

    let mut counts: Vec<(String, u64)> = question
        .options
        .iter()
        .zip(per_option.iter())
        .filter(|(_, c)| **c > 0)
        .map(|(o, c)| (o.clone(), *c))
        .collect();
    if other_count > 0 {
        counts.push((OTHER_LABEL.to_string(), other_count));
    }
    ChoiceAggregate {
        counts,
        other_answers,
        total_considered,
    }
}

fn aggregate_matrix(question: &Question, subset: &[&Response]) -> MatrixAggregate {
    // Every declared item/scale pair starts at zero so that absent
    // combinations show as 0, not as missing entries.
    let mut table: Vec<Vec<u64>> = vec![vec![0; question.scale.len()]; question.items.len()];
    for r in subset.iter() {
        if let Some(AnswerValue::Grid(cells)) = r.answer(&question.id) {
            for (item, label) in cells.iter() {
                let i = question.items.iter().position(|x| x == item);
                let j = question.scale.iter().position(|x| x == label);
                match (i, j) {
                    (Some(i), Some(j)) => table[i][j] += 1,
                    // Undeclared items and labels are dropped, by contract.
                    _ => debug!(
                        "aggregate_matrix: dropping undeclared cell {:?} -> {:?} for {:?}",
                        item, label, question.id
                    ),
                }
            }
        }
    }
    MatrixAggregate {
        items: question.items.clone(),
        scale: question.scale.clone(),
        table,
    }
}

fn aggregate_ranking(question: &Question, subset: &[&Response]) -> RankingAggregate {
    let top_n = question
        .max_selections
        .unwrap_or(question.options.len() as u32);
    let mut rank_sums: Vec<(u64, u64)> = vec![(0, 0); question.options.len()];
    let mut weighted: Vec<f64> = vec![0.0; question.options.len()];

    for r in subset.iter() {
        if let Some(AnswerValue::Ranked(pairs)) = r.answer(&question.id) {
            for (option, rank) in pairs.iter() {
                let idx = match question.options.iter().position(|o| o == option) {
                    Some(idx) => idx,
                    None => {
                        debug!(
                            "aggregate_ranking: dropping undeclared option {:?} for {:?}",
                            option, question.id
                        );
                        continue;
                    }
                };
                rank_sums[idx].0 += *rank as u64;
                rank_sums[idx].1 += 1;
                if *rank >= 1 && *rank <= top_n {
                    weighted[idx] += (top_n - *rank + 1) as f64;
                }
            }
        }
    }

    let entries = question
        .options
        .iter()
        .zip(rank_sums.iter())
        .map(|(o, (sum, n))| {
            let score = if *n == 0 {
                RankScore::Unranked
            } else {
                RankScore::Mean(*sum as f64 / *n as f64)
            };
            (o.clone(), score)
        })
        .collect();
    let weighted = question
        .options
        .iter()
        .zip(weighted.iter())
        .map(|(o, w)| (o.clone(), *w))
        .collect();
    RankingAggregate { entries, weighted }
}

fn aggregate_text(question: &Question, subset: &[&Response]) -> TextAggregate {
    let mut texts: Vec<String> = Vec::new();
    for r in subset.iter() {
        if let Some(AnswerValue::Text(s)) = r.answer(&question.id) {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                texts.push(trimmed.to_string());
            }
        }
    }
    TextAggregate { texts }
}
