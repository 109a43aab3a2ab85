//! Domain models: subjects, bank questions, and the question shape a session runs on.

use serde::{Deserialize, Serialize};

/// A named category of exam content.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
  pub id: String,
  pub name: String,
  pub description: String,
  pub topics: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image: Option<String>,
}

/// Bank question. Created at load time and never mutated.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  pub id: String,
  pub subject_id: String,
  pub topic: String,
  pub text: String,
  pub options: Vec<String>,
  /// The correct option string (not an index).
  pub correct_answer: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
}

impl Question {
  /// At least two options and the correct answer is one of them.
  pub fn is_well_formed(&self) -> bool {
    is_well_formed(&self.options, &self.correct_answer)
  }
}

/// Question as held by an exam session.
///
/// Bank questions keep their provenance; AI-generated ones only carry
/// text, options, correct answer and explanation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExamQuestion {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub subject_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub topic: Option<String>,
  pub text: String,
  pub options: Vec<String>,
  pub correct_answer: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
}

impl ExamQuestion {
  pub fn has_option(&self, option: &str) -> bool {
    self.options.iter().any(|o| o == option)
  }

  pub fn is_correct(&self, answer: &str) -> bool {
    answer == self.correct_answer
  }
}

impl From<Question> for ExamQuestion {
  fn from(q: Question) -> Self {
    Self {
      id: Some(q.id),
      subject_id: Some(q.subject_id),
      topic: Some(q.topic),
      text: q.text,
      options: q.options,
      correct_answer: q.correct_answer,
      explanation: q.explanation,
    }
  }
}

pub(crate) fn is_well_formed(options: &[String], correct_answer: &str) -> bool {
  options.len() >= 2 && options.iter().any(|o| o == correct_answer)
}
