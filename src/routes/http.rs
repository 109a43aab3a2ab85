//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  Json,
};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;
use crate::summary::ExamSummary;

type ApiResult<T> = Result<Json<T>, AppError>;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> Json<HealthOut> {
  Json(HealthOut { ok: true, ai_practice: state.generator.is_some() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_subjects(
  State(state): State<Arc<AppState>>,
  Query(q): Query<SubjectsQuery>,
) -> Json<Vec<SubjectOut>> {
  Json(list_subjects(&state, q.size))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_subject(
  State(state): State<Arc<AppState>>,
  Path(subject_id): Path<String>,
  Query(q): Query<SubjectsQuery>,
) -> ApiResult<SubjectOut> {
  subject_detail(&state, &subject_id, q.size).map(Json)
}

#[instrument(level = "info", skip(state))]
pub async fn http_subject_questions(
  State(state): State<Arc<AppState>>,
  Path(subject_id): Path<String>,
  Query(q): Query<BatchQuery>,
) -> ApiResult<Vec<PublicQuestion>> {
  let questions = subject_questions(&state, &subject_id, q.batch, q.size)?;
  info!(target: "exam", subject = %subject_id, batch = ?q.batch, count = questions.len(), "HTTP subject questions served");
  Ok(Json(questions))
}

#[instrument(level = "info", skip(state, body), fields(subject = %body.subject_id))]
pub async fn http_start_exam(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartExamIn>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
  let view = start_subject_exam(&state, body).await?;
  info!(target: "exam", session_id = %view.session_id, total = view.total_questions, "HTTP exam started");
  Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_exam(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> ApiResult<SessionView> {
  exam_view(&state, &session_id).await.map(Json)
}

#[instrument(level = "info", skip(state))]
pub async fn http_abandon_exam(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
  if state.abandon(&session_id).await {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(AppError::NotFound("Exam session not found or already finished.".into()))
  }
}

#[instrument(level = "info", skip(state, body), fields(option = %body.option))]
pub async fn http_select_answer(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
  Json(body): Json<AnswerIn>,
) -> ApiResult<ExamStepOut> {
  apply_action(&state, &session_id, ExamAction::SelectAnswer(body.option)).await.map(Json)
}

#[instrument(level = "info", skip(state))]
pub async fn http_submit_answer(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> ApiResult<ExamStepOut> {
  apply_action(&state, &session_id, ExamAction::Submit).await.map(Json)
}

#[instrument(level = "info", skip(state))]
pub async fn http_toggle_review(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> ApiResult<ExamStepOut> {
  apply_action(&state, &session_id, ExamAction::ToggleReview).await.map(Json)
}

#[instrument(level = "info", skip(state, body), fields(index = body.index))]
pub async fn http_go_to(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
  Json(body): Json<GoToIn>,
) -> ApiResult<ExamStepOut> {
  apply_action(&state, &session_id, ExamAction::GoTo(body.index)).await.map(Json)
}

#[instrument(level = "info", skip(state))]
pub async fn http_next(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> ApiResult<ExamStepOut> {
  apply_action(&state, &session_id, ExamAction::Next).await.map(Json)
}

#[instrument(level = "info", skip(state))]
pub async fn http_previous(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> ApiResult<ExamStepOut> {
  apply_action(&state, &session_id, ExamAction::Previous).await.map(Json)
}

#[instrument(level = "info", skip(state))]
pub async fn http_finish(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> ApiResult<ExamStepOut> {
  apply_action(&state, &session_id, ExamAction::Finish).await.map(Json)
}

#[instrument(level = "info", skip(state, body), fields(subject = %body.subject_id, exam_length = ?body.exam_length))]
pub async fn http_start_practice(
  State(state): State<Arc<AppState>>,
  Json(body): Json<PracticeIn>,
) -> Result<(StatusCode, Json<PracticeOut>), AppError> {
  let out = start_ai_practice(&state, body).await?;
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state), fields(client_id = %q.client_id))]
pub async fn http_summary(
  State(state): State<Arc<AppState>>,
  Path(subject_id): Path<String>,
  Query(q): Query<SummaryQuery>,
) -> ApiResult<ExamSummary> {
  read_summary(&state, &q.client_id, &subject_id).await.map(Json)
}

#[instrument(level = "info", skip(state), fields(client_id = %q.client_id))]
pub async fn http_ai_summary(
  State(state): State<Arc<AppState>>,
  Query(q): Query<SummaryQuery>,
) -> ApiResult<ExamSummary> {
  read_ai_summary(&state, &q.client_id).await.map(Json)
}
