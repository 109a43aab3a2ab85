//! Loading the exam configuration (prompts, exam settings, optional extra bank) from TOML.
//!
//! See `ExamConfig`, `ExamSettings` and `Prompts` for the expected schema.
//! Every section is optional; missing values fall back to the defaults below.

use serde::Deserialize;
use tracing::{error, info};

use crate::store::DEFAULT_MAX_SCOPES;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ExamConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub exam: ExamSettings,
  #[serde(default)]
  pub subjects: Vec<SubjectCfg>,
  #[serde(default)]
  pub questions: Vec<QuestionCfg>,
}

/// Tunables for exam sessions and AI practice requests.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ExamSettings {
  /// Batch size offered on the subject list when the client does not pass one.
  pub default_batch_size: usize,
  /// Countdown budget per question (180s = 30 minutes per 10 questions).
  pub seconds_per_question: u64,
  pub min_ai_exam_length: u32,
  pub max_ai_exam_length: u32,
  pub default_ai_exam_length: u32,
  /// Score reported to the generator for topics the user marked as weak.
  pub weak_topic_score: f32,
  /// Score reported for every other topic of the subject.
  pub strong_topic_score: f32,
  /// Client scopes the hand-off store keeps before evicting the least recently written.
  pub max_handoff_scopes: usize,
}

impl Default for ExamSettings {
  fn default() -> Self {
    Self {
      default_batch_size: 10,
      seconds_per_question: 180,
      min_ai_exam_length: 3,
      max_ai_exam_length: 20,
      default_ai_exam_length: 5,
      weak_topic_score: 0.2,
      strong_topic_score: 0.7,
      max_handoff_scopes: DEFAULT_MAX_SCOPES,
    }
  }
}

/// Subject entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct SubjectCfg {
  pub id: String,
  pub name: String,
  #[serde(default)] pub description: String,
  #[serde(default)] pub topics: Vec<String>,
  #[serde(default)] pub image: Option<String>,
}

/// Question entry accepted in TOML configuration. `subject_id` must name a
/// built-in or configured subject.
#[derive(Clone, Debug, Deserialize)]
pub struct QuestionCfg {
  pub id: String,
  pub subject_id: String,
  #[serde(default)] pub topic: String,
  pub text: String,
  pub options: Vec<String>,
  pub correct_answer: String,
  #[serde(default)] pub explanation: Option<String>,
}

/// Prompts used by the OpenAI client for personalised practice exams.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub practice_exam_system: String,
  /// Placeholders: {subject}, {exam_length}, {past_performance}.
  pub practice_exam_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      practice_exam_system: "You are an expert in creating practice exams for the MSBTE exam. Respond ONLY with strict JSON.".into(),
      practice_exam_user_template: "Based on the student's past performance in {subject}, generate a practice exam with {exam_length} questions that focuses on the student's weak areas.\n\nPast Performance:\n{past_performance}\n\nThe questions should be challenging and relevant to the exam. Ensure that the questions cover the topics where the student has a low performance score.\n\nReturn JSON: {\"questions\": [{\"text\": string, \"options\": [string, ...], \"correctAnswer\": string, \"explanation\": string}]}. Each question has exactly four options and correctAnswer must be copied verbatim from options.".into(),
    }
  }
}

/// Attempt to load `ExamConfig` from EXAM_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_exam_config_from_env() -> Option<ExamConfig> {
  let path = std::env::var("EXAM_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_exam_config(&s) {
      Ok(cfg) => {
        info!(target: "exam_backend", %path, subjects = cfg.subjects.len(), questions = cfg.questions.len(), "Loaded exam config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "exam_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "exam_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_exam_config(s: &str) -> Result<ExamConfig, toml::de::Error> {
  toml::from_str::<ExamConfig>(s)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_document_yields_defaults() {
    let cfg = parse_exam_config("").unwrap();
    assert_eq!(cfg.exam.default_batch_size, 10);
    assert_eq!(cfg.exam.seconds_per_question, 180);
    assert!(cfg.prompts.practice_exam_user_template.contains("{past_performance}"));
    assert!(cfg.questions.is_empty());
  }

  #[test]
  fn partial_exam_section_keeps_other_defaults() {
    let cfg = parse_exam_config(
      r#"
      [exam]
      default_batch_size = 5

      [[subjects]]
      id = "physics"
      name = "Physics"
      topics = ["Optics"]

      [[questions]]
      id = "ph_q1"
      subject_id = "physics"
      topic = "Optics"
      text = "Speed of light?"
      options = ["3e8 m/s", "3e5 m/s"]
      correct_answer = "3e8 m/s"
      "#,
    )
    .unwrap();
    assert_eq!(cfg.exam.default_batch_size, 5);
    assert_eq!(cfg.exam.max_ai_exam_length, 20);
    assert_eq!(cfg.subjects[0].topics, vec!["Optics".to_string()]);
    assert_eq!(cfg.questions[0].correct_answer, "3e8 m/s");
  }
}
