//! Personalised practice: turning weak topics into a performance map, calling the
//! generator, and screening its output before any session is built.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::domain::{is_well_formed, ExamQuestion, Subject};
use crate::error::GenerationError;

/// Input of the generation call.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PracticeExamInput {
  pub subject: String,
  /// Topic name -> score in [0, 1].
  pub past_performance: BTreeMap<String, f32>,
  pub exam_length: u32,
}

/// Output of the generation call.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PracticeExamOutput {
  #[serde(default)]
  pub questions: Vec<GeneratedQuestion>,
}

/// The model may answer with bare question strings or full multiple-choice items.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum GeneratedQuestion {
  Item(GeneratedItem),
  Text(String),
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedItem {
  pub text: String,
  #[serde(default)]
  pub options: Vec<String>,
  #[serde(default, alias = "correct_answer")]
  pub correct_answer: String,
  #[serde(default)]
  pub explanation: Option<String>,
}

impl GeneratedQuestion {
  pub fn text(&self) -> &str {
    match self {
      GeneratedQuestion::Item(item) => &item.text,
      GeneratedQuestion::Text(text) => text,
    }
  }

  /// Only items with at least two options and a matching correct answer can be examined.
  pub fn to_exam_question(&self) -> Option<ExamQuestion> {
    match self {
      GeneratedQuestion::Item(item) if is_well_formed(&item.options, &item.correct_answer) => {
        Some(ExamQuestion {
          id: None,
          subject_id: None,
          topic: None,
          text: item.text.clone(),
          options: item.options.clone(),
          correct_answer: item.correct_answer.clone(),
          explanation: item.explanation.clone().filter(|e| !e.trim().is_empty()),
        })
      }
      _ => None,
    }
  }
}

impl PracticeExamOutput {
  pub fn question_texts(&self) -> Vec<String> {
    self.questions.iter().map(|q| q.text().to_string()).collect()
  }

  pub fn exam_questions(&self) -> Vec<ExamQuestion> {
    self.questions.iter().filter_map(GeneratedQuestion::to_exam_question).collect()
  }
}

/// The external, fallible generation capability.
#[async_trait]
pub trait ExamGenerator: Send + Sync {
  async fn create_practice_exam(
    &self,
    input: &PracticeExamInput,
  ) -> Result<PracticeExamOutput, GenerationError>;
}

/// Every topic of the subject gets `weak_score` if selected as weak, else `strong_score`.
/// Weak topics the subject does not have are ignored.
pub fn build_past_performance(
  subject: &Subject,
  weak_topics: &[String],
  weak_score: f32,
  strong_score: f32,
) -> BTreeMap<String, f32> {
  subject
    .topics
    .iter()
    .map(|topic| {
      let score = if weak_topics.iter().any(|w| w == topic) { weak_score } else { strong_score };
      (topic.clone(), score)
    })
    .collect()
}

/// Renders the performance map for the prompt, one topic per line.
pub fn format_past_performance(past_performance: &BTreeMap<String, f32>) -> String {
  past_performance
    .iter()
    .map(|(topic, score)| format!("- Topic: {}, Score: {}", topic, score))
    .collect::<Vec<_>>()
    .join("\n")
}

/// Calls the generator; an empty question list is a failure, not a success.
#[instrument(level = "info", skip(generator, input), fields(subject = %input.subject, exam_length = input.exam_length))]
pub async fn generate_personalized_exam(
  generator: &dyn ExamGenerator,
  input: &PracticeExamInput,
) -> Result<PracticeExamOutput, GenerationError> {
  let output = generator.create_practice_exam(input).await?;
  if output.questions.is_empty() {
    warn!(target: "practice", subject = %input.subject, "AI returned no questions");
    return Err(GenerationError::EmptyExam);
  }
  info!(target: "practice", subject = %input.subject, generated = output.questions.len(), "AI generated questions");
  Ok(output)
}
