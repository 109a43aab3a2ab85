//! Application state: question bank, live exam sessions, hand-off store and the optional
//! AI generator.
//!
//! This module owns:
//!   - the read-only question bank (seeds + TOML extras)
//!   - the registry of live sessions, each behind its own mutex with a countdown task
//!   - the tab-scoped hand-off store the finalized results are written to
//!   - the optional exam generator (OpenAI)
//!
//! A session is discarded as soon as its result has been handed off.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError},
};
use tokio::{
    sync::{broadcast, Mutex, RwLock},
    task::JoinHandle,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::bank::QuestionBank;
use crate::config::{load_exam_config_from_env, ExamSettings};
use crate::domain::ExamQuestion;
use crate::error::{SessionError, StoreError};
use crate::openai::OpenAI;
use crate::practice::ExamGenerator;
use crate::session::{ExamOrigin, ExamResult, ExamSession};
use crate::store::{HandoffStore, EXAM_RESULT_KEY};
use crate::timer::spawn_countdown;

const EVENT_CAPACITY: usize = 16;

/// Pushed to WebSocket clients attached to a session.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    Tick { remaining_secs: u64 },
    Finished { result: ExamResult },
}

/// A session being taken, plus its countdown and event channel.
pub struct LiveExam {
    pub id: String,
    pub client_id: String,
    pub session: Mutex<ExamSession>,
    pub events: broadcast::Sender<SessionEvent>,
    timer: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl LiveExam {
    fn new(id: String, client_id: String, session: ExamSession) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            id,
            client_id,
            session: Mutex::new(session),
            events,
            timer: std::sync::Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn set_timer(&self, handle: JoinHandle<()>) {
        *self.timer.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Tears down the countdown schedule. Safe to call more than once.
    pub fn stop_timer(&self) {
        let handle = self.timer.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl Drop for LiveExam {
    fn drop(&mut self) {
        self.stop_timer();
    }
}

/// Hand-off scope for a request: the client's id, or a fresh one when it sent none.
pub fn client_scope(client_id: Option<String>) -> String {
    client_id
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

pub struct AppState {
    pub bank: QuestionBank,
    pub settings: ExamSettings,
    pub generator: Option<Arc<dyn ExamGenerator>>,
    pub sessions: RwLock<HashMap<String, Arc<LiveExam>>>,
    pub handoff: HandoffStore,
}

impl AppState {
    /// Build state from env: load config, build the bank, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_exam_config_from_env();
        let bank = QuestionBank::from_config(cfg.as_ref());
        let settings = cfg.as_ref().map(|c| c.exam.clone()).unwrap_or_default();
        let prompts = cfg.map(|c| c.prompts).unwrap_or_default();

        let generator: Option<Arc<dyn ExamGenerator>> = match OpenAI::from_env(prompts) {
            Some(oa) => {
                info!(target: "exam_backend", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
                Some(Arc::new(oa))
            }
            None => {
                info!(target: "exam_backend", "OpenAI disabled (no OPENAI_API_KEY). AI practice unavailable.");
                None
            }
        };

        Self::from_parts(bank, settings, generator)
    }

    pub fn from_parts(
        bank: QuestionBank,
        settings: ExamSettings,
        generator: Option<Arc<dyn ExamGenerator>>,
    ) -> Self {
        let handoff = HandoffStore::with_capacity(settings.max_handoff_scopes);
        Self {
            bank,
            settings,
            generator,
            sessions: RwLock::new(HashMap::new()),
            handoff,
        }
    }

    /// Registers a new session and starts its countdown.
    #[instrument(level = "info", skip(self, questions), fields(subject = %origin.subject_name(), questions = questions.len()))]
    pub async fn start_exam(
        self: &Arc<Self>,
        origin: ExamOrigin,
        questions: Vec<ExamQuestion>,
        client_id: Option<String>,
    ) -> Result<Arc<LiveExam>, SessionError> {
        let session = ExamSession::new(origin, questions, self.settings.seconds_per_question)?;
        let id = Uuid::new_v4().to_string();
        let client_id = client_scope(client_id);
        let duration = session.duration_secs();

        let exam = Arc::new(LiveExam::new(id.clone(), client_id, session));
        exam.set_timer(spawn_countdown(self.clone(), &exam));
        self.sessions.write().await.insert(id.clone(), exam.clone());
        info!(target: "exam", session_id = %id, duration_secs = duration, "Exam session started");
        Ok(exam)
    }

    pub async fn get_exam(&self, id: &str) -> Option<Arc<LiveExam>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Hands the result off under the client's scope, stops the countdown and discards
    /// the session. Callers pass the result returned by the one-shot finalize, so this
    /// runs at most once per session.
    #[instrument(level = "info", skip(self, exam, result), fields(session_id = %exam.id, score = result.score, total = result.total_questions))]
    pub async fn complete(&self, exam: &LiveExam, result: &ExamResult) -> Result<(), StoreError> {
        self.sessions.write().await.remove(&exam.id);
        let stored = self.handoff.set(&exam.client_id, EXAM_RESULT_KEY, result).await;
        // No receivers is fine: nobody is attached over WebSocket.
        let _ = exam.events.send(SessionEvent::Finished { result: result.clone() });
        // Last: when called from the countdown task itself, nothing is awaited after this.
        exam.stop_timer();
        stored?;
        info!(target: "exam", session_id = %exam.id, reason = ?result.finish_reason, "Exam finalized and handed off");
        Ok(())
    }

    /// Drops a session without producing a result (client left the exam screen).
    pub async fn abandon(&self, id: &str) -> bool {
        match self.sessions.write().await.remove(id) {
            Some(exam) => {
                exam.stop_timer();
                warn!(target: "exam", session_id = %id, "Exam session abandoned");
                true
            }
            None => false,
        }
    }
}
