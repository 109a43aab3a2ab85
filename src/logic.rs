//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Subject listing and batch slicing for the subject screen
//!   - Starting bank exams (whole subject or one batch) and AI practice exams
//!   - Applying exam actions and handing off the result when a session finishes
//!   - Reading summaries back from the hand-off store

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::bank::batch_label;
use crate::domain::{ExamQuestion, Subject};
use crate::error::{AppError, GenerationError, StoreError};
use crate::practice::{build_past_performance, generate_personalized_exam, PracticeExamInput};
use crate::protocol::{
  ExamStepOut, GeneratedExamRecord, PracticeIn, PracticeOut, PublicQuestion, SessionView,
  StartExamIn, SubjectOut,
};
use crate::session::{Advance, ExamOrigin, ExamResult};
use crate::state::{client_scope, AppState, LiveExam};
use crate::store::{AI_GENERATED_EXAM_KEY, EXAM_RESULT_KEY};
use crate::summary::ExamSummary;

const NO_QUESTIONS: &str =
  "Could not load exam questions for this subject. Please try again or select another subject.";
const NO_SUMMARY: &str = "Could not load exam summary. The data might be missing or corrupted.";

/// A single user action on a live exam.
#[derive(Clone, Debug)]
pub enum ExamAction {
  SelectAnswer(String),
  Submit,
  ToggleReview,
  GoTo(usize),
  Next,
  Previous,
  Finish,
}

pub fn list_subjects(state: &AppState, size: Option<usize>) -> Vec<SubjectOut> {
  let size = batch_size(state, size);
  state.bank.subjects().iter().map(|s| subject_card(state, s, size)).collect()
}

pub fn subject_detail(state: &AppState, subject_id: &str, size: Option<usize>) -> Result<SubjectOut, AppError> {
  let subject = state
    .bank
    .subject_by_id(subject_id)
    .ok_or_else(|| AppError::NotFound(format!("Unknown subject: {}", subject_id)))?;
  Ok(subject_card(state, subject, batch_size(state, size)))
}

fn subject_card(state: &AppState, subject: &Subject, size: usize) -> SubjectOut {
  SubjectOut {
    question_count: state.bank.questions_for_subject(&subject.id).len(),
    batches: state.bank.batches(&subject.id, size),
    subject: subject.clone(),
  }
}

fn batch_size(state: &AppState, size: Option<usize>) -> usize {
  size.filter(|s| *s > 0).unwrap_or(state.settings.default_batch_size)
}

pub fn subject_questions(
  state: &AppState,
  subject_id: &str,
  batch: Option<usize>,
  size: Option<usize>,
) -> Result<Vec<PublicQuestion>, AppError> {
  if state.bank.subject_by_id(subject_id).is_none() {
    return Err(AppError::NotFound(format!("Unknown subject: {}", subject_id)));
  }
  let questions = match batch {
    Some(b) => {
      state.bank.questions_for_batch(subject_id, b, batch_size(state, size))
    }
    None => state.bank.questions_for_subject(subject_id),
  };
  Ok(questions.iter().map(PublicQuestion::from).collect())
}

/// Empty subjects and out-of-range batches are a data-absent condition: no session is built.
#[instrument(level = "info", skip(state, req), fields(subject = %req.subject_id, batch = ?req.batch, size = ?req.size))]
pub async fn start_subject_exam(state: &Arc<AppState>, req: StartExamIn) -> Result<SessionView, AppError> {
  let subject = state
    .bank
    .subject_by_id(&req.subject_id)
    .ok_or_else(|| AppError::NotFound(NO_QUESTIONS.into()))?;

  let (questions, batch) = match req.batch {
    Some(number) => {
      let size = batch_size(state, req.size);
      let qs = state.bank.questions_for_batch(&subject.id, number, size);
      let label = (!qs.is_empty()).then(|| {
        let first = (number - 1) * size + 1;
        batch_label(number, first, first + qs.len() - 1)
      });
      (qs, label)
    }
    None => (state.bank.questions_for_subject(&subject.id), None),
  };
  if questions.is_empty() {
    warn!(target: "exam", subject = %subject.id, batch = ?req.batch, "No questions available");
    return Err(AppError::NotFound(NO_QUESTIONS.into()));
  }

  let origin = ExamOrigin::Subject {
    subject_id: subject.id.clone(),
    subject_name: subject.name.clone(),
    batch,
  };
  let questions: Vec<ExamQuestion> = questions.into_iter().map(Into::into).collect();
  let exam = state.start_exam(origin, questions, req.client_id).await?;
  Ok(view_of(&exam).await)
}

/// Validates the request and calls the generator. Any non-empty generation is kept
/// under `aiGeneratedExam`; a session is started only when at least one generated
/// question is a usable multiple-choice item.
#[instrument(level = "info", skip(state, req), fields(subject = %req.subject_id, weak = req.weak_topics.len()))]
pub async fn start_ai_practice(state: &Arc<AppState>, req: PracticeIn) -> Result<PracticeOut, AppError> {
  let settings = &state.settings;
  let subject = state
    .bank
    .subject_by_id(&req.subject_id)
    .ok_or_else(|| AppError::BadRequest("Please select a subject.".into()))?;
  let exam_length = req.exam_length.unwrap_or(settings.default_ai_exam_length);
  if !(settings.min_ai_exam_length..=settings.max_ai_exam_length).contains(&exam_length) {
    return Err(GenerationError::InvalidLength {
      min: settings.min_ai_exam_length,
      max: settings.max_ai_exam_length,
    }
    .into());
  }
  let generator = state.generator.as_deref().ok_or(GenerationError::Unavailable)?;

  let input = PracticeExamInput {
    subject: subject.name.clone(),
    past_performance: build_past_performance(
      subject,
      &req.weak_topics,
      settings.weak_topic_score,
      settings.strong_topic_score,
    ),
    exam_length,
  };
  let output = generate_personalized_exam(generator, &input).await?;

  let client_id = client_scope(req.client_id);
  let generated_questions = output.question_texts();
  state
    .handoff
    .set(
      &client_id,
      AI_GENERATED_EXAM_KEY,
      &GeneratedExamRecord { subject_name: subject.name.clone(), questions: generated_questions.clone() },
    )
    .await?;

  let questions = output.exam_questions();
  let session = if questions.is_empty() {
    info!(target: "practice", subject = %subject.name, generated = generated_questions.len(), "Generated questions are not multiple choice; no session started");
    None
  } else {
    let origin = ExamOrigin::AiPractice { subject_name: subject.name.clone() };
    let exam = state.start_exam(origin, questions, Some(client_id.clone())).await?;
    info!(target: "practice", session_id = %exam.id, subject = %subject.name, "AI practice exam started");
    Some(view_of(&exam).await)
  };

  Ok(PracticeOut { client_id, generated_questions, session })
}

async fn view_of(exam: &LiveExam) -> SessionView {
  let session = exam.session.lock().await;
  SessionView::build(&exam.id, &exam.client_id, &session)
}

async fn live_exam(state: &AppState, session_id: &str) -> Result<Arc<LiveExam>, AppError> {
  state
    .get_exam(session_id)
    .await
    .ok_or_else(|| AppError::NotFound("Exam session not found or already finished.".into()))
}

pub async fn exam_view(state: &AppState, session_id: &str) -> Result<SessionView, AppError> {
  let exam = live_exam(state, session_id).await?;
  Ok(view_of(&exam).await)
}

/// Runs one action; a finishing action hands the result off and returns the summary.
#[instrument(level = "info", skip(state))]
pub async fn apply_action(state: &AppState, session_id: &str, action: ExamAction) -> Result<ExamStepOut, AppError> {
  let exam = live_exam(state, session_id).await?;

  let finished: Option<ExamResult> = {
    let mut session = exam.session.lock().await;
    match action {
      ExamAction::SelectAnswer(option) => session.select_answer(&option).map(|_| None),
      ExamAction::Submit => session.submit_current().map(|correct| {
        info!(target: "exam", %session_id, index = session.current_index(), %correct, "Answer submitted");
        None
      }),
      ExamAction::ToggleReview => session.toggle_review().map(|_| None),
      ExamAction::GoTo(index) => session.go_to(index).map(|_| None),
      ExamAction::Next => session.next().map(|advance| match advance {
        Advance::Moved(_) => None,
        Advance::Finished(result) => Some(result),
      }),
      ExamAction::Previous => session.previous().map(|_| None),
      ExamAction::Finish => session.finish().map(Some),
    }?
  };

  match finished {
    Some(result) => {
      state.complete(&exam, &result).await?;
      Ok(ExamStepOut::Finished { summary: ExamSummary::from_result(&result) })
    }
    None => Ok(ExamStepOut::InProgress { session: view_of(&exam).await }),
  }
}

/// Standard summary: the stored result must belong to the requested subject, otherwise
/// it is cleared and reported missing.
pub async fn read_summary(state: &AppState, client_id: &str, subject_id: &str) -> Result<ExamSummary, AppError> {
  let result = stored_result(state, client_id).await?;
  if result.subject_id.as_deref() != Some(subject_id) {
    state.handoff.remove(client_id, EXAM_RESULT_KEY).await;
    return Err(AppError::NotFound(NO_SUMMARY.into()));
  }
  Ok(ExamSummary::from_result(&result))
}

/// AI summary: the stored result must come from an AI practice session.
pub async fn read_ai_summary(state: &AppState, client_id: &str) -> Result<ExamSummary, AppError> {
  let result = stored_result(state, client_id).await?;
  if !result.is_ai_practice {
    state.handoff.remove(client_id, EXAM_RESULT_KEY).await;
    return Err(AppError::NotFound(NO_SUMMARY.into()));
  }
  Ok(ExamSummary::from_result(&result))
}

async fn stored_result(state: &AppState, client_id: &str) -> Result<ExamResult, AppError> {
  match state.handoff.get::<ExamResult>(client_id, EXAM_RESULT_KEY).await {
    Ok(Some(result)) => Ok(result),
    Ok(None) => Err(AppError::NotFound(NO_SUMMARY.into())),
    Err(e @ StoreError::Corrupted { .. }) => {
      warn!(target: "exam", %client_id, error = %e, "Stored exam result was corrupted");
      Err(AppError::NotFound(NO_SUMMARY.into()))
    }
    Err(e) => Err(e.into()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bank::QuestionBank;
  use crate::config::ExamSettings;
  use crate::practice::{ExamGenerator, GeneratedItem, GeneratedQuestion, PracticeExamOutput};
  use async_trait::async_trait;
  use std::sync::Mutex;

  struct CannedGenerator {
    output: PracticeExamOutput,
    seen: Mutex<Vec<PracticeExamInput>>,
  }

  #[async_trait]
  impl ExamGenerator for CannedGenerator {
    async fn create_practice_exam(&self, input: &PracticeExamInput) -> Result<PracticeExamOutput, GenerationError> {
      self.seen.lock().unwrap().push(input.clone());
      Ok(self.output.clone())
    }
  }

  fn state_with(generator: Option<Arc<dyn ExamGenerator>>) -> Arc<AppState> {
    Arc::new(AppState::from_parts(QuestionBank::from_config(None), ExamSettings::default(), generator))
  }

  fn start(subject: &str, batch: Option<usize>, size: Option<usize>) -> StartExamIn {
    StartExamIn { subject_id: subject.into(), batch, size, client_id: Some("tab".into()) }
  }

  #[tokio::test]
  async fn out_of_range_batch_never_builds_a_session() {
    let state = state_with(None);
    let err = start_subject_exam(&state, start("management", Some(3), Some(5))).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(state.sessions.read().await.is_empty());
  }

  #[tokio::test]
  async fn batch_exam_carries_label_into_result() {
    let state = state_with(None);
    let view = start_subject_exam(&state, start("management", Some(2), Some(4))).await.unwrap();
    assert_eq!(view.total_questions, 4);
    assert_eq!(view.question.id.as_deref(), Some("mgt_q5"));

    let step = apply_action(&state, &view.session_id, ExamAction::Finish).await.unwrap();
    match step {
      ExamStepOut::Finished { summary } => {
        assert_eq!(summary.batch.as_deref(), Some("Batch 2 (Q 5-8)"));
        assert_eq!(summary.score, 0);
      }
      other => panic!("expected finish, got {:?}", other),
    }
    let summary = read_summary(&state, "tab", "management").await.unwrap();
    assert_eq!(summary.total_questions, 4);
  }

  #[tokio::test]
  async fn submit_without_answer_is_a_validation_error() {
    let state = state_with(None);
    let view = start_subject_exam(&state, start("basic-electronics", None, None)).await.unwrap();
    let err = apply_action(&state, &view.session_id, ExamAction::Submit).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
  }

  #[tokio::test]
  async fn summary_for_other_subject_is_cleared() {
    let state = state_with(None);
    let view = start_subject_exam(&state, start("basic-electronics", None, None)).await.unwrap();
    apply_action(&state, &view.session_id, ExamAction::Finish).await.unwrap();

    assert!(read_summary(&state, "tab", "programming-in-c").await.is_err());
    assert!(read_summary(&state, "tab", "basic-electronics").await.is_err());
  }

  #[tokio::test]
  async fn ai_practice_without_generator_is_unavailable() {
    let state = state_with(None);
    let req = PracticeIn { subject_id: "applied-mathematics".into(), weak_topics: vec![], exam_length: Some(5), client_id: None };
    let err = start_ai_practice(&state, req).await.unwrap_err();
    assert!(matches!(err, AppError::Unavailable(_)));
  }

  #[tokio::test]
  async fn ai_practice_validates_length_before_calling() {
    let generator = Arc::new(CannedGenerator { output: PracticeExamOutput::default(), seen: Mutex::new(vec![]) });
    let state = state_with(Some(generator.clone()));
    let req = PracticeIn { subject_id: "applied-mathematics".into(), weak_topics: vec![], exam_length: Some(2), client_id: None };
    let err = start_ai_practice(&state, req).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(generator.seen.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn empty_ai_exam_builds_no_session() {
    let generator = Arc::new(CannedGenerator { output: PracticeExamOutput::default(), seen: Mutex::new(vec![]) });
    let state = state_with(Some(generator.clone()));
    let req = PracticeIn {
      subject_id: "applied-mathematics".into(),
      weak_topics: vec!["Algebra".into()],
      exam_length: Some(5),
      client_id: Some("tab".into()),
    };
    let err = start_ai_practice(&state, req).await.unwrap_err();
    assert!(matches!(err, AppError::Upstream(_)));
    assert!(state.sessions.read().await.is_empty());
    assert_eq!(state.handoff.scope_count().await, 0);

    let seen = generator.seen.lock().unwrap();
    assert_eq!(seen[0].past_performance["Algebra"], 0.2);
    assert_eq!(seen[0].past_performance["Calculus"], 0.7);
    assert_eq!(seen[0].exam_length, 5);
  }

  #[tokio::test]
  async fn ai_practice_session_finishes_into_ai_summary() {
    let output = PracticeExamOutput {
      questions: vec![
        GeneratedQuestion::Text("Explain Ohm's law".into()),
        GeneratedQuestion::Item(GeneratedItem {
          text: "Which is a semiconductor?".into(),
          options: vec!["Copper".into(), "Silicon".into()],
          correct_answer: "Silicon".into(),
          explanation: None,
        }),
      ],
    };
    let generator = Arc::new(CannedGenerator { output, seen: Mutex::new(vec![]) });
    let state = state_with(Some(generator));
    let req = PracticeIn {
      subject_id: "basic-electronics".into(),
      weak_topics: vec![],
      exam_length: None,
      client_id: Some("tab".into()),
    };
    let out = start_ai_practice(&state, req).await.unwrap();
    assert_eq!(out.generated_questions.len(), 2);
    let session = out.session.expect("a multiple-choice item starts a session");
    assert_eq!(session.total_questions, 1);
    assert!(session.is_ai_practice);

    let id = session.session_id.clone();
    apply_action(&state, &id, ExamAction::SelectAnswer("Silicon".into())).await.unwrap();
    let step = apply_action(&state, &id, ExamAction::Next).await.unwrap();
    assert!(matches!(step, ExamStepOut::Finished { .. }));

    let summary = read_ai_summary(&state, "tab").await.unwrap();
    assert_eq!(summary.score, 1);
    assert!(read_summary(&state, "tab", "basic-electronics").await.is_err());
  }

  #[tokio::test]
  async fn plain_text_generation_is_kept_without_a_session() {
    let output = PracticeExamOutput {
      questions: vec![
        GeneratedQuestion::Text("What is a limit?".into()),
        GeneratedQuestion::Text("Define derivative.".into()),
      ],
    };
    let generator = Arc::new(CannedGenerator { output, seen: Mutex::new(vec![]) });
    let state = state_with(Some(generator));
    let req = PracticeIn {
      subject_id: "applied-mathematics".into(),
      weak_topics: vec!["Calculus".into()],
      exam_length: Some(3),
      client_id: Some("tab".into()),
    };

    let out = start_ai_practice(&state, req).await.unwrap();
    assert_eq!(out.client_id, "tab");
    assert_eq!(out.generated_questions, vec!["What is a limit?", "Define derivative."]);
    assert!(out.session.is_none());
    assert!(state.sessions.read().await.is_empty());

    let record: GeneratedExamRecord = state.handoff.get("tab", AI_GENERATED_EXAM_KEY).await.unwrap().unwrap();
    assert_eq!(record.subject_name, "Applied Mathematics");
    assert_eq!(record.questions.len(), 2);
  }

  #[tokio::test]
  async fn anonymous_exams_do_not_grow_the_handoff_store() {
    let settings = ExamSettings { max_handoff_scopes: 16, ..ExamSettings::default() };
    let state = Arc::new(AppState::from_parts(QuestionBank::from_config(None), settings, None));
    for _ in 0..200 {
      let req = StartExamIn { subject_id: "programming-in-c".into(), batch: None, size: None, client_id: None };
      let view = start_subject_exam(&state, req).await.unwrap();
      apply_action(&state, &view.session_id, ExamAction::Finish).await.unwrap();
    }
    assert_eq!(state.handoff.scope_count().await, 16);
    assert!(state.sessions.read().await.is_empty());
  }
}
