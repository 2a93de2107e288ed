use std::collections::HashMap;

use crate::model::*;

/// The read-only description of all questions, in declaration order.
///
/// Built once from the parsed schema document and never mutated afterwards.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Schema {
    questions: Vec<Question>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Validates the declared questions and builds the id index.
    pub fn new(questions: Vec<Question>) -> Result<Schema, AnalysisError> {
        if questions.is_empty() {
            return Err(AnalysisError::EmptySchema);
        }
        let mut index: HashMap<String, usize> = HashMap::new();
        for (idx, q) in questions.iter().enumerate() {
            if index.insert(q.id.clone(), idx).is_some() {
                return Err(AnalysisError::DuplicateQuestion(q.id.clone()));
            }
            let mut seen: Vec<&String> = Vec::new();
            for opt in q.options.iter() {
                if seen.contains(&opt) {
                    return Err(AnalysisError::DuplicateOption(q.id.clone(), opt.clone()));
                }
                seen.push(opt);
            }
        }
        Ok(Schema { questions, index })
    }

    pub fn get(&self, question_id: &str) -> Option<&Question> {
        self.index.get(question_id).map(|idx| &self.questions[*idx])
    }

    /// All questions, in the schema document's declaration order.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Questions with a defined visualization (everything but identifiers).
    pub fn analyzable_questions(&self) -> Vec<&Question> {
        self.questions
            .iter()
            .filter(|q| q.qtype != QuestionType::Identifier)
            .collect()
    }

    /// Questions an ad-hoc filter may target: non-demographic and carrying
    /// discrete values (no free text, no identifiers).
    pub fn filterable_questions(&self) -> Vec<&Question> {
        self.questions
            .iter()
            .filter(|q| {
                !q.demographic
                    && q.qtype != QuestionType::OpenText
                    && q.qtype != QuestionType::Identifier
            })
            .collect()
    }

    pub fn demographic_questions(&self) -> Vec<&Question> {
        self.questions.iter().filter(|q| q.demographic).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role_question() -> Question {
        Question::new("role", "Role?", QuestionType::SingleChoice)
            .with_options(&["Designer", "Artist"])
    }

    #[test]
    fn empty_schema_rejected() {
        assert_eq!(Schema::new(vec![]), Err(AnalysisError::EmptySchema));
    }

    #[test]
    fn duplicate_question_rejected() {
        let res = Schema::new(vec![role_question(), role_question()]);
        assert_eq!(
            res,
            Err(AnalysisError::DuplicateQuestion("role".to_string()))
        );
    }

    #[test]
    fn duplicate_option_rejected() {
        let q = Question::new("role", "Role?", QuestionType::SingleChoice)
            .with_options(&["Designer", "Designer"]);
        let res = Schema::new(vec![q]);
        assert_eq!(
            res,
            Err(AnalysisError::DuplicateOption(
                "role".to_string(),
                "Designer".to_string()
            ))
        );
    }

    #[test]
    fn listing_preserves_declaration_order_and_roles() {
        let mut role = role_question();
        role.demographic = true;
        let ident = Question::new("id", "Id", QuestionType::Identifier);
        let engines = Question::new("engines", "Engines?", QuestionType::MultipleChoice)
            .with_options(&["Unity", "Godot"]);
        let feedback = Question::new("feedback", "Feedback?", QuestionType::OpenText);
        let schema = Schema::new(vec![ident, role, engines.clone(), feedback]).unwrap();

        let analyzable: Vec<&str> = schema
            .analyzable_questions()
            .iter()
            .map(|q| q.id.as_str())
            .collect();
        assert_eq!(analyzable, vec!["role", "engines", "feedback"]);

        let filterable: Vec<&str> = schema
            .filterable_questions()
            .iter()
            .map(|q| q.id.as_str())
            .collect();
        assert_eq!(filterable, vec!["engines"]);

        let demographic: Vec<&str> = schema
            .demographic_questions()
            .iter()
            .map(|q| q.id.as_str())
            .collect();
        assert_eq!(demographic, vec!["role"]);
    }
}
