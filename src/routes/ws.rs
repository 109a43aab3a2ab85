//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic; replies are one JSON message per request. Once a socket is
//! attached to a session, countdown ticks and the final summary are pushed as well.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, instrument, warn};

use crate::error::AppError;
use crate::logic::*;
use crate::protocol::{ClientWsMessage, ExamStepOut, ServerWsMessage};
use crate::state::{AppState, SessionEvent};
use crate::summary::ExamSummary;

/// The session a socket follows, if any.
#[derive(Default)]
struct Attachment {
  session_id: Option<String>,
  events: Option<broadcast::Receiver<SessionEvent>>,
}

impl Attachment {
  async fn attach(&mut self, state: &AppState, session_id: &str) -> bool {
    match state.get_exam(session_id).await {
      Some(exam) => {
        self.session_id = Some(exam.id.clone());
        self.events = Some(exam.subscribe());
        true
      }
      None => false,
    }
  }

  fn detach(&mut self) {
    self.session_id = None;
    self.events = None;
  }
}

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "exam_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "exam_backend", "WebSocket connected");
  let mut attachment = Attachment::default();

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => {
            let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(incoming) => {
                debug!(target: "exam_backend", "WS received: {:?}", &incoming);
                handle_client_ws(incoming, &state, &mut attachment).await
              }
              Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
            };
            if !send(&mut socket, &reply).await {
              break;
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }

      event = next_event(&mut attachment.events) => {
        let push = match event {
          Ok(SessionEvent::Tick { remaining_secs }) => Some(ServerWsMessage::Tick { remaining_secs }),
          Ok(SessionEvent::Finished { result }) => {
            attachment.detach();
            Some(ServerWsMessage::Finished { summary: ExamSummary::from_result(&result) })
          }
          Err(RecvError::Lagged(skipped)) => {
            warn!(target: "exam_backend", skipped, "WS client lagging behind session events");
            None
          }
          Err(RecvError::Closed) => {
            attachment.detach();
            None
          }
        };
        if let Some(push) = push {
          if !send(&mut socket, &push).await {
            break;
          }
        }
      }
    }
  }
  info!(target: "exam_backend", "WebSocket disconnected");
}

/// Waits forever when no session is attached, so `select!` only listens to the socket.
async fn next_event(events: &mut Option<broadcast::Receiver<SessionEvent>>) -> Result<SessionEvent, RecvError> {
  match events {
    Some(rx) => rx.recv().await,
    None => std::future::pending().await,
  }
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> bool {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  if let Err(e) = socket.send(Message::Text(out)).await {
    error!(target: "exam_backend", error = %e, "WS send error");
    return false;
  }
  true
}

#[instrument(level = "info", skip(state, attachment))]
async fn handle_client_ws(msg: ClientWsMessage, state: &Arc<AppState>, attachment: &mut Attachment) -> ServerWsMessage {
  let action = match msg {
    ClientWsMessage::Ping => return ServerWsMessage::Pong,

    ClientWsMessage::StartExam(req) => {
      return match start_subject_exam(state, req).await {
        Ok(session) => {
          attachment.attach(state, &session.session_id).await;
          info!(target: "exam", session_id = %session.session_id, "WS exam started");
          ServerWsMessage::Session { session }
        }
        Err(e) => to_ws_error(e),
      };
    }

    ClientWsMessage::Attach { session_id } => {
      if !attachment.attach(state, &session_id).await {
        return ServerWsMessage::Error { message: "Exam session not found or already finished.".into() };
      }
      return match exam_view(state, &session_id).await {
        Ok(session) => ServerWsMessage::Session { session },
        Err(e) => to_ws_error(e),
      };
    }

    ClientWsMessage::SelectAnswer { option } => ExamAction::SelectAnswer(option),
    ClientWsMessage::SubmitAnswer => ExamAction::Submit,
    ClientWsMessage::ToggleReview => ExamAction::ToggleReview,
    ClientWsMessage::GoTo { index } => ExamAction::GoTo(index),
    ClientWsMessage::Next => ExamAction::Next,
    ClientWsMessage::Previous => ExamAction::Previous,
    ClientWsMessage::Finish => ExamAction::Finish,
  };

  let Some(session_id) = attachment.session_id.clone() else {
    return ServerWsMessage::Error { message: "No exam attached to this connection.".into() };
  };
  match apply_action(state, &session_id, action).await {
    Ok(ExamStepOut::InProgress { session }) => ServerWsMessage::Session { session },
    Ok(ExamStepOut::Finished { summary }) => {
      // The broadcast copy of this result is not needed any more.
      attachment.detach();
      ServerWsMessage::Finished { summary }
    }
    Err(e) => to_ws_error(e),
  }
}

fn to_ws_error(err: AppError) -> ServerWsMessage {
  match err {
    AppError::Validation(message) => ServerWsMessage::Notice { message },
    other => ServerWsMessage::Error { message: other.to_string() },
  }
}
