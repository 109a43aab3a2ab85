//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - JSON API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .route("/api/v1/health", get(http::http_health))
        // Subjects
        .route("/api/v1/subjects", get(http::http_list_subjects))
        .route("/api/v1/subjects/:id", get(http::http_get_subject))
        .route("/api/v1/subjects/:id/questions", get(http::http_subject_questions))
        // Live exams
        .route("/api/v1/exams", post(http::http_start_exam))
        .route(
            "/api/v1/exams/:id",
            get(http::http_get_exam).delete(http::http_abandon_exam),
        )
        .route("/api/v1/exams/:id/answer", post(http::http_select_answer))
        .route("/api/v1/exams/:id/submit", post(http::http_submit_answer))
        .route("/api/v1/exams/:id/review", post(http::http_toggle_review))
        .route("/api/v1/exams/:id/goto", post(http::http_go_to))
        .route("/api/v1/exams/:id/next", post(http::http_next))
        .route("/api/v1/exams/:id/previous", post(http::http_previous))
        .route("/api/v1/exams/:id/finish", post(http::http_finish))
        // AI practice + summaries
        .route("/api/v1/practice", post(http::http_start_practice))
        .route("/api/v1/practice/summary", get(http::http_ai_summary))
        .route("/api/v1/summary/:subject_id", get(http::http_summary))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::QuestionBank;
    use crate::config::ExamSettings;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        let state = AppState::from_parts(QuestionBank::from_config(None), ExamSettings::default(), None);
        build_router(Arc::new(state))
    }

    async fn body_json(res: axum::response::Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ai_practice_off() {
        let res = app()
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["ai_practice"], false);
    }

    #[tokio::test]
    async fn subject_batches_are_labelled() {
        let res = app()
            .oneshot(Request::get("/api/v1/subjects/management?size=4").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["questionCount"], 10);
        assert_eq!(body["batches"][2]["label"], "Batch 3 (Q 9-10)");
    }

    #[tokio::test]
    async fn public_questions_hide_answers() {
        let res = app()
            .oneshot(
                Request::get("/api/v1/subjects/programming-in-c/questions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(res).await;
        let first = &body[0];
        assert!(first.get("correctAnswer").is_none());
        assert!(first.get("explanation").is_none());
    }

    #[tokio::test]
    async fn unknown_exam_is_a_json_404() {
        let res = app()
            .oneshot(Request::post("/api/v1/exams/nope/next").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(body_json(res).await["error"].is_string());
    }
}
