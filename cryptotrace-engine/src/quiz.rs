//! Quiz attempts and one-shot final scoring
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::eligibility::percent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    #[serde(default)]
    pub prompt: String,
    pub options: Vec<String>,
    #[serde(alias = "correctAnswerIndex")]
    pub correct_answer: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuizError {
    #[error("question {0} does not exist")]
    UnknownQuestion(usize),
    #[error("question {question} has no option {option}")]
    UnknownOption { question: usize, option: usize },
    #[error("question {0} is already answered")]
    AlreadyAnswered(usize),
    #[error("expected {expected} selections, got {actual}")]
    SelectionCount { expected: usize, actual: usize },
}

/// One pass through a quiz. Selecting an option locks the question, so a
/// finished attempt yields exactly one score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAttempt {
    questions: Vec<QuizQuestion>,
    selections: Vec<Option<usize>>,
    emitted: bool,
}

impl QuizAttempt {
    #[must_use]
    pub fn new(questions: Vec<QuizQuestion>) -> Self {
        let selections = vec![None; questions.len()];
        Self {
            questions,
            selections,
            emitted: false,
        }
    }

    /// Rebuild an attempt from the host's `-1`-for-unset selection list.
    ///
    /// # Errors
    ///
    /// Returns an error if the list length differs from the question count
    /// or a selection names a missing option.
    pub fn from_raw_selections(
        questions: Vec<QuizQuestion>,
        raw: &[i32],
    ) -> Result<Self, QuizError> {
        if raw.len() != questions.len() {
            return Err(QuizError::SelectionCount {
                expected: questions.len(),
                actual: raw.len(),
            });
        }
        let mut attempt = Self::new(questions);
        for (question, &value) in raw.iter().enumerate() {
            if let Ok(option) = usize::try_from(value) {
                attempt.select(question, option)?;
            }
        }
        Ok(attempt)
    }

    #[must_use]
    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    #[must_use]
    pub fn selection(&self, question: usize) -> Option<usize> {
        self.selections.get(question).copied().flatten()
    }

    /// Lock in an answer for one question.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown question or option, or when the
    /// question was already answered.
    pub fn select(&mut self, question: usize, option: usize) -> Result<(), QuizError> {
        let q = self
            .questions
            .get(question)
            .ok_or(QuizError::UnknownQuestion(question))?;
        if option >= q.options.len() {
            return Err(QuizError::UnknownOption { question, option });
        }
        let slot = &mut self.selections[question];
        if slot.is_some() {
            return Err(QuizError::AlreadyAnswered(question));
        }
        *slot = Some(option);
        Ok(())
    }

    #[must_use]
    pub fn is_answered(&self, question: usize) -> bool {
        self.selection(question).is_some()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.questions.is_empty() && self.selections.iter().all(Option::is_some)
    }

    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.questions
            .iter()
            .zip(&self.selections)
            .filter(|(q, sel)| **sel == Some(q.correct_answer))
            .count()
    }

    /// `round(100 * correct / total)` once every question is answered.
    #[must_use]
    pub fn final_score(&self) -> Option<u8> {
        self.is_complete()
            .then(|| percent(self.correct_count(), self.questions.len()))
    }

    /// Hands out the final score the first time it is available and `None`
    /// on every later call.
    pub fn take_score(&mut self) -> Option<u8> {
        if self.emitted {
            return None;
        }
        let score = self.final_score()?;
        self.emitted = true;
        Some(score)
    }

    #[must_use]
    pub const fn is_emitted(&self) -> bool {
        self.emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: usize) -> QuizQuestion {
        QuizQuestion {
            prompt: "Which address clustered first?".to_string(),
            options: vec!["a".into(), "b".into(), "c".into()],
            correct_answer: correct,
        }
    }

    fn three_questions() -> Vec<QuizQuestion> {
        vec![question(0), question(1), question(2)]
    }

    #[test]
    fn score_only_after_every_question_answered() {
        let mut attempt = QuizAttempt::new(three_questions());
        attempt.select(0, 0).unwrap();
        attempt.select(1, 1).unwrap();
        assert_eq!(attempt.final_score(), None);
        assert_eq!(attempt.take_score(), None);
        attempt.select(2, 0).unwrap();
        assert_eq!(attempt.correct_count(), 2);
        assert_eq!(attempt.final_score(), Some(67));
    }

    #[test]
    fn answers_lock_after_selection() {
        let mut attempt = QuizAttempt::new(three_questions());
        attempt.select(0, 2).unwrap();
        assert_eq!(attempt.select(0, 0), Err(QuizError::AlreadyAnswered(0)));
        assert_eq!(attempt.selection(0), Some(2));
    }

    #[test]
    fn rejects_unknown_question_or_option() {
        let mut attempt = QuizAttempt::new(three_questions());
        assert_eq!(attempt.select(5, 0), Err(QuizError::UnknownQuestion(5)));
        assert_eq!(
            attempt.select(0, 3),
            Err(QuizError::UnknownOption {
                question: 0,
                option: 3
            })
        );
        assert!(!attempt.is_answered(0));
    }

    #[test]
    fn score_is_emitted_once() {
        let mut attempt = QuizAttempt::from_raw_selections(three_questions(), &[0, 1, 2]).unwrap();
        assert_eq!(attempt.take_score(), Some(100));
        assert!(attempt.is_emitted());
        assert_eq!(attempt.take_score(), None);
        assert_eq!(attempt.final_score(), Some(100));
    }

    #[test]
    fn raw_selections_treat_negative_as_unset() {
        let attempt = QuizAttempt::from_raw_selections(three_questions(), &[0, -1, 2]).unwrap();
        assert!(!attempt.is_complete());
        assert!(!attempt.is_answered(1));
        assert!(matches!(
            QuizAttempt::from_raw_selections(three_questions(), &[0]),
            Err(QuizError::SelectionCount {
                expected: 3,
                actual: 1
            })
        ));
    }

    #[test]
    fn empty_quiz_never_completes() {
        let mut attempt = QuizAttempt::new(Vec::new());
        assert!(!attempt.is_complete());
        assert_eq!(attempt.take_score(), None);
    }

    #[test]
    fn accepts_correct_answer_index_alias() {
        let q: QuizQuestion = serde_json::from_str(
            r#"{ "prompt": "p", "options": ["x", "y"], "correctAnswerIndex": 1 }"#,
        )
        .unwrap();
        assert_eq!(q.correct_answer, 1);
    }
}
