//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::bank::BatchInfo;
use crate::domain::{ExamQuestion, Question, Subject};
use crate::session::{ExamSession, Grade, SlotStatus};
use crate::summary::ExamSummary;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartExam(StartExamIn),
    /// Attach this socket to an existing session (ticks and finish are pushed).
    Attach {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    SelectAnswer {
        option: String,
    },
    SubmitAnswer,
    ToggleReview,
    GoTo {
        index: usize,
    },
    Next,
    Previous,
    Finish,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session {
        session: SessionView,
    },
    Tick {
        #[serde(rename = "remainingSecs")]
        remaining_secs: u64,
    },
    Finished {
        summary: ExamSummary,
    },
    /// Validation notice (e.g. no answer selected); the session is unchanged.
    Notice {
        message: String,
    },
    Error {
        message: String,
    },
}

/// Subject card for the subject list, with the batches it can be taken in.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectOut {
    #[serde(flatten)]
    pub subject: Subject,
    pub question_count: usize,
    pub batches: Vec<BatchInfo>,
}

/// Question as shown before answering (no correct answer, no explanation).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub text: String,
    pub options: Vec<String>,
}

impl From<&ExamQuestion> for PublicQuestion {
    fn from(q: &ExamQuestion) -> Self {
        Self {
            id: q.id.clone(),
            topic: q.topic.clone(),
            text: q.text.clone(),
            options: q.options.clone(),
        }
    }
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: Some(q.id.clone()),
            topic: Some(q.topic.clone()),
            text: q.text.clone(),
            options: q.options.clone(),
        }
    }
}

/// Grading feedback, present only while the current question's verdict is displayed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackOut {
    pub correct: bool,
    pub correct_answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Read-only snapshot of a live session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub client_id: String,
    pub subject_name: String,
    pub is_ai_practice: bool,
    pub current_index: usize,
    pub total_questions: usize,
    pub progress_percent: u32,
    pub question: PublicQuestion,
    pub selected_answer: Option<String>,
    pub marked_for_review: bool,
    pub feedback: Option<FeedbackOut>,
    pub navigation: Vec<SlotStatus>,
    pub remaining_secs: u64,
    pub duration_secs: u64,
    pub is_last: bool,
}

impl SessionView {
    pub fn build(session_id: &str, client_id: &str, s: &ExamSession) -> Self {
        let question = s.current_question();
        let slot = s.current_slot();
        let feedback = if s.feedback_visible() {
            Some(FeedbackOut {
                correct: slot.grade == Grade::Correct,
                correct_answer: question.correct_answer.clone(),
                explanation: question.explanation.clone(),
            })
        } else {
            None
        };
        Self {
            session_id: session_id.to_string(),
            client_id: client_id.to_string(),
            subject_name: s.origin().subject_name().to_string(),
            is_ai_practice: s.origin().is_ai_practice(),
            current_index: s.current_index(),
            total_questions: s.len(),
            progress_percent: s.progress_percent(),
            question: PublicQuestion::from(question),
            selected_answer: slot.answer.clone(),
            marked_for_review: slot.marked_for_review,
            feedback,
            navigation: s.statuses(),
            remaining_secs: s.remaining_secs(),
            duration_secs: s.duration_secs(),
            is_last: s.is_last(),
        }
    }
}

/// Response of every exam action: either the session goes on, or it just finished.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExamStepOut {
    InProgress { session: SessionView },
    Finished { summary: ExamSummary },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct SubjectsQuery {
    pub size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct BatchQuery {
    pub batch: Option<usize>,
    pub size: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartExamIn {
    pub subject_id: String,
    #[serde(default)]
    pub batch: Option<usize>,
    #[serde(default)]
    pub size: Option<usize>,
    #[serde(default)]
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    pub option: String,
}

#[derive(Debug, Deserialize)]
pub struct GoToIn {
    pub index: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeIn {
    pub subject_id: String,
    #[serde(default)]
    pub weak_topics: Vec<String>,
    #[serde(default)]
    pub exam_length: Option<u32>,
    #[serde(default)]
    pub client_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeOut {
    /// Scope the generated exam (and later the result) is stored under.
    pub client_id: String,
    /// Question texts as generated, including ones that could not be examined.
    pub generated_questions: Vec<String>,
    /// Absent when no generated question is a usable multiple-choice item.
    pub session: Option<SessionView>,
}

/// What is kept under `aiGeneratedExam` in the hand-off store.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedExamRecord {
    pub subject_name: String,
    pub questions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    pub client_id: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub ai_practice: bool,
}
