use crate::model::*;
use crate::schema::Schema;
use crate::SurveyEngine;

/// A builder for assembling an analysis engine.
///
/// Both input documents must be provided before [`Builder::build`]
/// succeeds; there is no partially initialized engine to operate on.
///
/// ```
/// pub use survey_core::builder::Builder;
/// pub use survey_core::{AnswerValue, Question, QuestionType, Response};
/// # use survey_core::AnalysisError;
///
/// let questions = vec![
///     Question::new("role", "What is your role?", QuestionType::SingleChoice)
///         .with_options(&["Designer", "Artist"]),
/// ];
/// let responses = vec![
///     Response::new("1").with_answer("role", AnswerValue::Single("Designer".to_string())),
/// ];
///
/// let engine = Builder::new()
///     .schema(questions)?
///     .demographics(&["role"])?
///     .responses(responses)?
///     .build()?;
///
/// assert_eq!(engine.total_size(), 1);
/// # Ok::<(), AnalysisError>(())
/// ```
pub struct Builder {
    pub(crate) _questions: Option<Vec<Question>>,
    pub(crate) _responses: Option<Vec<Response>>,
    pub(crate) _demographics: Vec<String>,
}

impl Builder {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Builder {
        Builder {
            _questions: None,
            _responses: None,
            _demographics: Vec::new(),
        }
    }

    /// Declares the questions, in the order the schema document lists them.
    /// The declaration is validated eagerly.
    pub fn schema(self, questions: Vec<Question>) -> Result<Builder, AnalysisError> {
        // Validate now so a malformed document fails at load time, not at
        // build time. The result is rebuilt in build().
        Schema::new(questions.clone())?;
        Ok(Builder {
            _questions: Some(questions),
            _responses: self._responses,
            _demographics: self._demographics,
        })
    }

    /// Marks the questions carrying an always-on inclusion-set filter.
    /// Ids without a declared question are ignored at build time.
    pub fn demographics(self, question_ids: &[&str]) -> Result<Builder, AnalysisError> {
        Ok(Builder {
            _questions: self._questions,
            _responses: self._responses,
            _demographics: question_ids.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn responses(self, responses: Vec<Response>) -> Result<Builder, AnalysisError> {
        Ok(Builder {
            _questions: self._questions,
            _responses: Some(responses),
            _demographics: self._demographics,
        })
    }

    pub fn build(self) -> Result<SurveyEngine, AnalysisError> {
        let mut questions = match self._questions {
            Some(qs) => qs,
            None => return Err(AnalysisError::MissingSchema),
        };
        let responses = match self._responses {
            Some(rs) => rs,
            None => return Err(AnalysisError::MissingResponses),
        };
        for q in questions.iter_mut() {
            q.demographic = self._demographics.iter().any(|id| id == &q.id);
        }
        let schema = Schema::new(questions)?;
        Ok(SurveyEngine::from_parts(schema, responses))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_without_schema_fails() {
        let res = Builder::new().responses(vec![]).unwrap().build();
        assert!(matches!(res, Err(AnalysisError::MissingSchema)));
    }

    #[test]
    fn build_without_responses_fails() {
        let questions = vec![Question::new("role", "Role?", QuestionType::SingleChoice)
            .with_options(&["Designer"])];
        let res = Builder::new().schema(questions).unwrap().build();
        assert!(matches!(res, Err(AnalysisError::MissingResponses)));
    }

    #[test]
    fn malformed_schema_fails_at_declaration() {
        let res = Builder::new().schema(vec![]);
        assert!(matches!(res, Err(AnalysisError::EmptySchema)));
    }

    #[test]
    fn demographics_flag_is_applied() {
        let questions = vec![
            Question::new("role", "Role?", QuestionType::SingleChoice)
                .with_options(&["Designer"]),
            Question::new("engines", "Engines?", QuestionType::MultipleChoice)
                .with_options(&["Unity"]),
        ];
        let engine = Builder::new()
            .schema(questions)
            .unwrap()
            .demographics(&["role"])
            .unwrap()
            .responses(vec![])
            .unwrap()
            .build()
            .unwrap();
        let demographic: Vec<&str> = engine
            .schema()
            .demographic_questions()
            .iter()
            .map(|q| q.id.as_str())
            .collect();
        assert_eq!(demographic, vec!["role"]);
    }
}
