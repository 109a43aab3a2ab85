//! Per-session countdown.
//!
//! One task per live session ticks once per second on a fixed schedule. It only holds a
//! weak reference to the session, stops as soon as the session is finalized or gone, and
//! is aborted by `LiveExam::stop_timer` when the session completes another way.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info};

use crate::session::Tick;
use crate::state::{AppState, LiveExam, SessionEvent};

const TICK: Duration = Duration::from_secs(1);

pub fn spawn_countdown(state: Arc<AppState>, exam: &Arc<LiveExam>) -> JoinHandle<()> {
  let weak: Weak<LiveExam> = Arc::downgrade(exam);
  tokio::spawn(async move {
    let mut ticker = interval_at(Instant::now() + TICK, TICK);
    loop {
      ticker.tick().await;
      let Some(exam) = weak.upgrade() else { break };

      let outcome = { exam.session.lock().await.tick() };
      match outcome {
        Tick::Running(remaining_secs) => {
          let _ = exam.events.send(SessionEvent::Tick { remaining_secs });
        }
        Tick::Expired(result) => {
          info!(target: "exam", session_id = %exam.id, "Time is up; finalizing exam");
          if let Err(e) = state.complete(&exam, &result).await {
            error!(target: "exam", session_id = %exam.id, error = %e, "Failed to hand off expired exam");
          }
          break;
        }
        Tick::Stopped => {
          debug!(target: "exam", session_id = %exam.id, "Countdown stopped: exam already finalized");
          break;
        }
      }
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bank::QuestionBank;
  use crate::config::ExamSettings;
  use crate::session::{ExamOrigin, ExamResult, FinishReason};
  use crate::store::EXAM_RESULT_KEY;

  fn state(seconds_per_question: u64) -> Arc<AppState> {
    let settings = ExamSettings { seconds_per_question, ..ExamSettings::default() };
    Arc::new(AppState::from_parts(QuestionBank::from_config(None), settings, None))
  }

  fn origin() -> ExamOrigin {
    ExamOrigin::Subject {
      subject_id: "programming-in-c".into(),
      subject_name: "Programming in C".into(),
      batch: None,
    }
  }

  fn questions(state: &AppState) -> Vec<crate::domain::ExamQuestion> {
    state.bank.questions_for_subject("programming-in-c").into_iter().map(Into::into).collect()
  }

  #[tokio::test(start_paused = true)]
  async fn expiry_finalizes_once_and_hands_off() {
    let state = state(1);
    let exam = state.start_exam(origin(), questions(&state), Some("tab-1".into())).await.unwrap();
    let mut events = exam.subscribe();
    exam.session.lock().await.select_answer("const").unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(state.get_exam(&exam.id).await.is_none());
    let stored: ExamResult = state.handoff.get("tab-1", EXAM_RESULT_KEY).await.unwrap().unwrap();
    assert_eq!(stored.finish_reason, FinishReason::TimeUp);
    assert_eq!(stored.score, 1);
    assert_eq!(stored.total_questions, 2);

    let mut finished = 0;
    while let Ok(ev) = events.try_recv() {
      if matches!(ev, SessionEvent::Finished { .. }) {
        finished += 1;
      }
    }
    assert_eq!(finished, 1);
  }

  #[tokio::test(start_paused = true)]
  async fn user_finish_stops_the_countdown() {
    let state = state(1);
    let exam = state.start_exam(origin(), questions(&state), Some("tab-2".into())).await.unwrap();

    let result = exam.session.lock().await.finish().unwrap();
    state.complete(&exam, &result).await.unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    let stored: ExamResult = state.handoff.get("tab-2", EXAM_RESULT_KEY).await.unwrap().unwrap();
    assert_eq!(stored.finish_reason, FinishReason::FinishedEarly);
    assert_eq!(exam.session.lock().await.result(), Some(&stored));
  }

  #[tokio::test(start_paused = true)]
  async fn ticks_are_published() {
    let state = state(60);
    let exam = state.start_exam(origin(), questions(&state), None).await.unwrap();
    let mut events = exam.subscribe();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    match events.recv().await.unwrap() {
      SessionEvent::Tick { remaining_secs } => assert_eq!(remaining_secs, 119),
      other => panic!("unexpected event: {:?}", other),
    }
    assert!(state.abandon(&exam.id).await);
  }
}
