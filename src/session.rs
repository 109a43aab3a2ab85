//! Exam session state machine.
//!
//! One `ExamSession` owns the mutable state of a single attempt: current position,
//! one `Slot` per question (answer, grade, review mark), the transient feedback flag
//! and the countdown. All transitions are synchronous; `finalize` is one-shot and is
//! the only producer of an `ExamResult`.
//!
//! Slot lifecycle: `Unanswered -> Answered(option) -> Graded(option, correct)`.
//! Changing the answer of a graded slot drops it back to ungraded.

use serde::{Deserialize, Serialize};

use crate::domain::ExamQuestion;
use crate::error::SessionError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
  #[default]
  Ungraded,
  Correct,
  Incorrect,
}

impl Grade {
  fn from_correct(correct: bool) -> Self {
    if correct { Grade::Correct } else { Grade::Incorrect }
  }

  pub fn is_graded(self) -> bool {
    self != Grade::Ungraded
  }
}

/// Per-question state. Sessions hold exactly one slot per question.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
  pub answer: Option<String>,
  pub grade: Grade,
  pub marked_for_review: bool,
}

/// Navigation status of a question, in display precedence order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
  Marked,
  Correct,
  Incorrect,
  /// Answer chosen but not graded yet.
  Answered,
  Unanswered,
}

impl Slot {
  pub fn status(&self) -> SlotStatus {
    if self.marked_for_review {
      SlotStatus::Marked
    } else {
      match (self.grade, &self.answer) {
        (Grade::Correct, _) => SlotStatus::Correct,
        (Grade::Incorrect, _) => SlotStatus::Incorrect,
        (Grade::Ungraded, Some(_)) => SlotStatus::Answered,
        (Grade::Ungraded, None) => SlotStatus::Unanswered,
      }
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
  /// Advanced past the last question.
  Completed,
  /// User finished before reaching the end.
  FinishedEarly,
  TimeUp,
}

/// Where the questions of a session came from.
#[derive(Clone, Debug, PartialEq)]
pub enum ExamOrigin {
  Subject {
    subject_id: String,
    subject_name: String,
    batch: Option<String>,
  },
  AiPractice {
    subject_name: String,
  },
}

impl ExamOrigin {
  pub fn subject_name(&self) -> &str {
    match self {
      ExamOrigin::Subject { subject_name, .. } => subject_name,
      ExamOrigin::AiPractice { subject_name } => subject_name,
    }
  }

  pub fn is_ai_practice(&self) -> bool {
    matches!(self, ExamOrigin::AiPractice { .. })
  }
}

/// Immutable record produced once per session by `ExamSession::finalize`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub subject_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub subject_name: Option<String>,
  pub questions: Vec<ExamQuestion>,
  pub user_answers: Vec<Option<String>>,
  pub score: usize,
  pub total_questions: usize,
  #[serde(default)]
  pub is_ai_practice: bool,
  #[serde(default)]
  pub graded: Vec<Grade>,
  #[serde(default)]
  pub marked_for_review: Vec<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub batch: Option<String>,
  #[serde(default)]
  pub time_taken_secs: u64,
  pub finish_reason: FinishReason,
}

impl ExamResult {
  /// Rounded percentage; 0 for an empty exam.
  pub fn percentage(&self) -> u32 {
    if self.total_questions == 0 {
      return 0;
    }
    ((self.score as f64 / self.total_questions as f64) * 100.0).round() as u32
  }
}

/// Outcome of `next`.
#[derive(Debug, PartialEq)]
pub enum Advance {
  Moved(usize),
  Finished(ExamResult),
}

/// Outcome of one countdown step.
#[derive(Debug, PartialEq)]
pub enum Tick {
  Running(u64),
  Expired(ExamResult),
  /// Session was already finalized; the countdown must stop.
  Stopped,
}

#[derive(Debug)]
pub struct ExamSession {
  origin: ExamOrigin,
  questions: Vec<ExamQuestion>,
  slots: Vec<Slot>,
  current: usize,
  feedback_visible: bool,
  duration_secs: u64,
  remaining_secs: u64,
  result: Option<ExamResult>,
}

impl ExamSession {
  /// Zero questions never enter the state machine.
  pub fn new(
    origin: ExamOrigin,
    questions: Vec<ExamQuestion>,
    seconds_per_question: u64,
  ) -> Result<Self, SessionError> {
    if questions.is_empty() {
      return Err(SessionError::Empty);
    }
    let duration_secs = seconds_per_question.saturating_mul(questions.len() as u64);
    Ok(Self {
      origin,
      slots: vec![Slot::default(); questions.len()],
      questions,
      current: 0,
      feedback_visible: false,
      duration_secs,
      remaining_secs: duration_secs,
      result: None,
    })
  }

  pub fn origin(&self) -> &ExamOrigin { &self.origin }
  pub fn questions(&self) -> &[ExamQuestion] { &self.questions }
  pub fn slots(&self) -> &[Slot] { &self.slots }
  pub fn len(&self) -> usize { self.questions.len() }
  pub fn current_index(&self) -> usize { self.current }
  pub fn current_question(&self) -> &ExamQuestion { &self.questions[self.current] }
  pub fn current_slot(&self) -> &Slot { &self.slots[self.current] }
  pub fn feedback_visible(&self) -> bool { self.feedback_visible }
  pub fn duration_secs(&self) -> u64 { self.duration_secs }
  pub fn remaining_secs(&self) -> u64 { self.remaining_secs }
  pub fn is_finalized(&self) -> bool { self.result.is_some() }
  pub fn result(&self) -> Option<&ExamResult> { self.result.as_ref() }

  pub fn is_last(&self) -> bool {
    self.current + 1 == self.questions.len()
  }

  pub fn statuses(&self) -> Vec<SlotStatus> {
    self.slots.iter().map(Slot::status).collect()
  }

  /// Position of the current question as a percentage of the exam.
  pub fn progress_percent(&self) -> u32 {
    (((self.current + 1) as f64 / self.questions.len() as f64) * 100.0).round() as u32
  }

  fn ensure_open(&self) -> Result<(), SessionError> {
    if self.result.is_some() {
      return Err(SessionError::Finalized);
    }
    Ok(())
  }

  pub fn select_answer(&mut self, option: &str) -> Result<(), SessionError> {
    self.ensure_open()?;
    if !self.questions[self.current].has_option(option) {
      return Err(SessionError::UnknownOption(option.to_string()));
    }
    let slot = &mut self.slots[self.current];
    slot.answer = Some(option.to_string());
    slot.grade = Grade::Ungraded;
    self.feedback_visible = false;
    Ok(())
  }

  /// Grades the current answer and shows its feedback. Returns whether it was correct.
  pub fn submit_current(&mut self) -> Result<bool, SessionError> {
    self.ensure_open()?;
    let question = &self.questions[self.current];
    let slot = &mut self.slots[self.current];
    let answer = slot.answer.as_deref().ok_or(SessionError::NoAnswerSelected)?;
    let correct = question.is_correct(answer);
    slot.grade = Grade::from_correct(correct);
    slot.marked_for_review = false;
    self.feedback_visible = true;
    Ok(correct)
  }

  /// Flips the review mark of the current question and returns the new value.
  pub fn toggle_review(&mut self) -> Result<bool, SessionError> {
    self.ensure_open()?;
    let slot = &mut self.slots[self.current];
    slot.marked_for_review = !slot.marked_for_review;
    Ok(slot.marked_for_review)
  }

  /// Feedback is shown again only for graded targets; a stale ungraded answer shows none.
  pub fn go_to(&mut self, index: usize) -> Result<(), SessionError> {
    self.ensure_open()?;
    if index >= self.questions.len() {
      return Err(SessionError::IndexOutOfRange { index, len: self.questions.len() });
    }
    self.current = index;
    self.feedback_visible = self.slots[index].grade.is_graded();
    Ok(())
  }

  /// Auto-grades a pending answer, then advances; on the last question finalizes.
  pub fn next(&mut self) -> Result<Advance, SessionError> {
    self.ensure_open()?;
    let slot = &self.slots[self.current];
    if slot.answer.is_some() && !slot.grade.is_graded() {
      self.submit_current()?;
    }
    if self.is_last() {
      let result = self.finalize(FinishReason::Completed).ok_or(SessionError::Finalized)?;
      return Ok(Advance::Finished(result));
    }
    let next = self.current + 1;
    self.go_to(next)?;
    Ok(Advance::Moved(next))
  }

  pub fn previous(&mut self) -> Result<usize, SessionError> {
    self.ensure_open()?;
    if self.current == 0 {
      return Err(SessionError::AtFirstQuestion);
    }
    let prev = self.current - 1;
    self.go_to(prev)?;
    Ok(prev)
  }

  /// User-initiated finish from any question.
  pub fn finish(&mut self) -> Result<ExamResult, SessionError> {
    let reason = if self.is_last() { FinishReason::Completed } else { FinishReason::FinishedEarly };
    self.finalize(reason).ok_or(SessionError::Finalized)
  }

  /// Grades every answered-but-ungraded slot, counts unanswered ones as incorrect,
  /// scores and records the result. Returns `Some` only on the first call.
  /// Review marks are left as they are: only `submit_current` clears a mark.
  pub fn finalize(&mut self, reason: FinishReason) -> Option<ExamResult> {
    if self.result.is_some() {
      return None;
    }
    for (question, slot) in self.questions.iter().zip(self.slots.iter_mut()) {
      if !slot.grade.is_graded() {
        let correct = slot.answer.as_deref().is_some_and(|a| question.is_correct(a));
        slot.grade = Grade::from_correct(correct);
      }
    }
    let score = self.slots.iter().filter(|s| s.grade == Grade::Correct).count();

    let (subject_id, batch) = match &self.origin {
      ExamOrigin::Subject { subject_id, batch, .. } => (Some(subject_id.clone()), batch.clone()),
      ExamOrigin::AiPractice { .. } => (None, None),
    };
    let result = ExamResult {
      subject_id,
      subject_name: Some(self.origin.subject_name().to_string()),
      questions: self.questions.clone(),
      user_answers: self.slots.iter().map(|s| s.answer.clone()).collect(),
      score,
      total_questions: self.questions.len(),
      is_ai_practice: self.origin.is_ai_practice(),
      graded: self.slots.iter().map(|s| s.grade).collect(),
      marked_for_review: self.slots.iter().map(|s| s.marked_for_review).collect(),
      batch,
      time_taken_secs: self.duration_secs - self.remaining_secs,
      finish_reason: reason,
    };
    self.feedback_visible = self.slots[self.current].grade.is_graded();
    self.result = Some(result.clone());
    Some(result)
  }

  /// One-second countdown step. Reaching zero finalizes with `TimeUp`.
  pub fn tick(&mut self) -> Tick {
    if self.result.is_some() {
      return Tick::Stopped;
    }
    self.remaining_secs = self.remaining_secs.saturating_sub(1);
    if self.remaining_secs > 0 {
      return Tick::Running(self.remaining_secs);
    }
    match self.finalize(FinishReason::TimeUp) {
      Some(result) => Tick::Expired(result),
      None => Tick::Stopped,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn q(text: &str, correct: &str) -> ExamQuestion {
    ExamQuestion {
      id: None,
      subject_id: None,
      topic: None,
      text: text.into(),
      options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
      correct_answer: correct.into(),
      explanation: None,
    }
  }

  fn origin() -> ExamOrigin {
    ExamOrigin::Subject {
      subject_id: "applied-mathematics".into(),
      subject_name: "Applied Mathematics".into(),
      batch: None,
    }
  }

  fn session(correct: &[&str]) -> ExamSession {
    let questions = correct.iter().enumerate().map(|(i, c)| q(&format!("q{}", i), c)).collect();
    ExamSession::new(origin(), questions, 180).unwrap()
  }

  fn assert_lengths(s: &ExamSession) {
    assert_eq!(s.slots().len(), s.questions().len());
  }

  #[test]
  fn empty_exam_is_refused() {
    let err = ExamSession::new(origin(), vec![], 180).unwrap_err();
    assert_eq!(err, SessionError::Empty);
  }

  #[test]
  fn duration_scales_with_question_count() {
    let s = session(&["A", "B", "C"]);
    assert_eq!(s.duration_secs(), 540);
    assert_eq!(s.remaining_secs(), 540);
  }

  #[test]
  fn score_counts_matching_answers() {
    let mut s = session(&["B", "C"]);
    s.select_answer("B").unwrap();
    s.next().unwrap();
    s.select_answer("D").unwrap();
    let result = match s.next().unwrap() {
      Advance::Finished(r) => r,
      other => panic!("expected finish, got {:?}", other),
    };
    assert_eq!(result.score, 1);
    assert_eq!(result.total_questions, 2);
    assert_eq!(result.user_answers, vec![Some("B".into()), Some("D".into())]);
    assert_eq!(result.graded, vec![Grade::Correct, Grade::Incorrect]);
    assert_eq!(result.finish_reason, FinishReason::Completed);
    assert_eq!(result.percentage(), 50);
  }

  #[test]
  fn submit_without_answer_is_a_validation_notice() {
    let mut s = session(&["A"]);
    s.toggle_review().unwrap();
    assert_eq!(s.submit_current(), Err(SessionError::NoAnswerSelected));
    assert!(!s.feedback_visible());
    assert_eq!(s.current_slot().grade, Grade::Ungraded);
    assert!(s.current_slot().marked_for_review);
  }

  #[test]
  fn submitting_clears_review_mark() {
    let mut s = session(&["A", "B"]);
    assert!(s.toggle_review().unwrap());
    s.select_answer("A").unwrap();
    assert!(s.submit_current().unwrap());
    assert!(!s.current_slot().marked_for_review);
    assert!(s.feedback_visible());
    assert_eq!(s.current_slot().grade, Grade::Correct);
  }

  #[test]
  fn review_can_be_toggled_after_grading() {
    let mut s = session(&["A"]);
    s.select_answer("B").unwrap();
    s.submit_current().unwrap();
    assert!(s.toggle_review().unwrap());
    assert_eq!(s.current_slot().status(), SlotStatus::Marked);
    assert_eq!(s.current_slot().grade, Grade::Incorrect);
  }

  #[test]
  fn changing_a_graded_answer_resets_the_grade() {
    let mut s = session(&["A"]);
    s.select_answer("A").unwrap();
    s.submit_current().unwrap();
    s.select_answer("C").unwrap();
    assert_eq!(s.current_slot().grade, Grade::Ungraded);
    assert!(!s.feedback_visible());
    assert_eq!(s.current_slot().status(), SlotStatus::Answered);
    assert_lengths(&s);
  }

  #[test]
  fn unknown_option_is_rejected() {
    let mut s = session(&["A"]);
    assert_eq!(s.select_answer("Z"), Err(SessionError::UnknownOption("Z".into())));
    assert_eq!(s.current_slot().answer, None);
  }

  #[test]
  fn go_to_hides_feedback_for_stale_ungraded_answers() {
    let mut s = session(&["A", "B", "C"]);
    s.go_to(1).unwrap();
    s.select_answer("B").unwrap();
    s.go_to(0).unwrap();
    s.go_to(1).unwrap();
    assert_eq!(s.current_slot().answer.as_deref(), Some("B"));
    assert!(!s.feedback_visible());

    s.submit_current().unwrap();
    s.go_to(2).unwrap();
    assert!(!s.feedback_visible());
    s.go_to(1).unwrap();
    assert!(s.feedback_visible());
  }

  #[test]
  fn go_to_out_of_range_is_rejected() {
    let mut s = session(&["A", "B"]);
    assert_eq!(s.go_to(2), Err(SessionError::IndexOutOfRange { index: 2, len: 2 }));
    assert_eq!(s.current_index(), 0);
  }

  #[test]
  fn next_auto_grades_a_pending_answer() {
    let mut s = session(&["A", "B"]);
    s.select_answer("A").unwrap();
    assert_eq!(s.next().unwrap(), Advance::Moved(1));
    assert_eq!(s.slots()[0].grade, Grade::Correct);
    assert!(!s.feedback_visible());
  }

  #[test]
  fn next_without_answer_skips() {
    let mut s = session(&["A", "B"]);
    assert_eq!(s.next().unwrap(), Advance::Moved(1));
    assert_eq!(s.slots()[0].grade, Grade::Ungraded);
    assert_eq!(s.slots()[0].status(), SlotStatus::Unanswered);
  }

  #[test]
  fn previous_does_not_regrade() {
    let mut s = session(&["A", "B"]);
    assert_eq!(s.previous(), Err(SessionError::AtFirstQuestion));
    s.select_answer("B").unwrap();
    s.next().unwrap();
    assert_eq!(s.previous().unwrap(), 0);
    assert_eq!(s.current_slot().grade, Grade::Incorrect);
    assert!(s.feedback_visible());
  }

  #[test]
  fn finalize_is_one_shot() {
    let mut s = session(&["A", "B"]);
    s.select_answer("A").unwrap();
    let first = s.finalize(FinishReason::FinishedEarly).unwrap();
    assert_eq!(first.score, 1);

    assert!(s.finalize(FinishReason::TimeUp).is_none());
    assert_eq!(s.result(), Some(&first));
    assert_eq!(s.tick(), Tick::Stopped);
    assert_eq!(s.select_answer("B"), Err(SessionError::Finalized));
    assert_eq!(s.next(), Err(SessionError::Finalized));
    assert_eq!(s.finish(), Err(SessionError::Finalized));
  }

  #[test]
  fn timer_expiry_grades_pending_and_fails_unanswered() {
    let mut s = ExamSession::new(origin(), vec![q("q0", "A"), q("q1", "B"), q("q2", "C")], 1).unwrap();
    s.go_to(1).unwrap();
    s.select_answer("B").unwrap();

    assert_eq!(s.tick(), Tick::Running(2));
    assert_eq!(s.tick(), Tick::Running(1));
    let result = match s.tick() {
      Tick::Expired(r) => r,
      other => panic!("expected expiry, got {:?}", other),
    };
    assert_eq!(result.score, 1);
    assert_eq!(result.graded, vec![Grade::Incorrect, Grade::Correct, Grade::Incorrect]);
    assert_eq!(result.user_answers[0], None);
    assert_eq!(result.finish_reason, FinishReason::TimeUp);
    assert_eq!(result.time_taken_secs, 3);
    assert_eq!(s.tick(), Tick::Stopped);
  }

  #[test]
  fn finish_early_keeps_marks_and_batch() {
    let o = ExamOrigin::Subject {
      subject_id: "management".into(),
      subject_name: "Management (22509)".into(),
      batch: Some("Batch 1 (Q 1-10)".into()),
    };
    let mut s = ExamSession::new(o, vec![q("q0", "A"), q("q1", "B")], 180).unwrap();
    s.toggle_review().unwrap();
    let result = s.finish().unwrap();
    assert_eq!(result.finish_reason, FinishReason::FinishedEarly);
    assert_eq!(result.marked_for_review, vec![true, false]);
    assert_eq!(result.batch.as_deref(), Some("Batch 1 (Q 1-10)"));
    assert_eq!(result.subject_id.as_deref(), Some("management"));
    assert!(!result.is_ai_practice);
  }

  #[test]
  fn ai_results_have_no_subject_id() {
    let o = ExamOrigin::AiPractice { subject_name: "Basic Electronics".into() };
    let mut s = ExamSession::new(o, vec![q("q0", "A")], 180).unwrap();
    let result = s.finish().unwrap();
    assert!(result.is_ai_practice);
    assert_eq!(result.subject_id, None);
    assert_eq!(result.subject_name.as_deref(), Some("Basic Electronics"));
  }

  #[test]
  fn status_precedence_puts_marks_first() {
    let mut slot = Slot { answer: Some("A".into()), grade: Grade::Correct, marked_for_review: true };
    assert_eq!(slot.status(), SlotStatus::Marked);
    slot.marked_for_review = false;
    assert_eq!(slot.status(), SlotStatus::Correct);
    slot.grade = Grade::Ungraded;
    assert_eq!(slot.status(), SlotStatus::Answered);
  }

  #[test]
  fn result_round_trips_through_json() {
    let mut s = session(&["A"]);
    s.select_answer("A").unwrap();
    let result = s.finish().unwrap();
    let json = serde_json::to_string(&result).unwrap();
    assert!(json.contains("\"userAnswers\""));
    let back: ExamResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back, result);
  }
}
