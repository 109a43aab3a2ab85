//! Summary view built from a handed-off `ExamResult`.

use serde::Serialize;

use crate::session::{ExamResult, FinishReason, Grade};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
  Correct,
  Incorrect,
  Unanswered,
}

/// One row of the per-question review.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
  pub number: usize,
  pub text: String,
  pub options: Vec<String>,
  pub user_answer: Option<String>,
  pub correct_answer: String,
  pub status: ReviewStatus,
  pub marked_for_review: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSummary {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub subject_id: Option<String>,
  pub title: String,
  pub is_ai_practice: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub batch: Option<String>,
  pub score: usize,
  pub total_questions: usize,
  pub incorrect: usize,
  pub percentage: u32,
  pub time_taken_secs: u64,
  pub finish_reason: FinishReason,
  pub items: Vec<ReviewItem>,
}

impl ExamSummary {
  pub fn from_result(result: &ExamResult) -> Self {
    let items = result
      .questions
      .iter()
      .enumerate()
      .map(|(i, q)| {
        let user_answer = result.user_answers.get(i).cloned().flatten();
        ReviewItem {
          number: i + 1,
          text: q.text.clone(),
          options: q.options.clone(),
          status: review_status(result.graded.get(i).copied(), user_answer.as_deref(), &q.correct_answer),
          user_answer,
          correct_answer: q.correct_answer.clone(),
          marked_for_review: result.marked_for_review.get(i).copied().unwrap_or(false),
          explanation: q.explanation.clone(),
        }
      })
      .collect();

    let title = if result.is_ai_practice {
      format!("AI Exam Summary: {}", result.subject_name.as_deref().unwrap_or("Personalized Practice"))
    } else {
      format!("Exam Summary: {}", result.subject_name.as_deref().unwrap_or("Practice Exam"))
    };

    Self {
      subject_id: result.subject_id.clone(),
      title,
      is_ai_practice: result.is_ai_practice,
      batch: result.batch.clone(),
      score: result.score,
      total_questions: result.total_questions,
      incorrect: result.total_questions.saturating_sub(result.score),
      percentage: result.percentage(),
      time_taken_secs: result.time_taken_secs,
      finish_reason: result.finish_reason,
      items,
    }
  }
}

/// Unanswered wins; otherwise the recorded grade, falling back to comparing answers
/// for results that carry no grades.
fn review_status(grade: Option<Grade>, user_answer: Option<&str>, correct_answer: &str) -> ReviewStatus {
  match (user_answer, grade) {
    (None, _) => ReviewStatus::Unanswered,
    (Some(_), Some(Grade::Correct)) => ReviewStatus::Correct,
    (Some(_), Some(Grade::Incorrect)) => ReviewStatus::Incorrect,
    (Some(a), _) if a == correct_answer => ReviewStatus::Correct,
    (Some(_), _) => ReviewStatus::Incorrect,
  }
}
