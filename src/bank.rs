//! Read-only question bank: subjects and questions, queryable by subject and by batch.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{error, info, instrument};

use crate::config::ExamConfig;
use crate::domain::{Question, Subject};
use crate::seeds::{seed_questions, seed_subjects};

/// One contiguous page of a subject's questions, 1-based and inclusive.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchInfo {
  pub number: usize,
  pub size: usize,
  pub first: usize,
  pub last: usize,
  pub label: String,
}

#[derive(Clone, Debug, Default)]
pub struct QuestionBank {
  subjects: Vec<Subject>,
  questions: Vec<Question>,
}

impl QuestionBank {
  pub fn new(subjects: Vec<Subject>, questions: Vec<Question>) -> Self {
    Self { subjects, questions }
  }

  /// Built-in seeds extended by the configured subjects and questions.
  /// Configured entries never overwrite existing ids; malformed ones are skipped.
  #[instrument(level = "info", skip_all)]
  pub fn from_config(cfg: Option<&ExamConfig>) -> Self {
    let mut subjects = seed_subjects();
    let mut questions = seed_questions();

    if let Some(cfg) = cfg {
      for sc in &cfg.subjects {
        if subjects.iter().any(|s| s.id == sc.id) {
          error!(target: "exam", id = %sc.id, "Skipping config subject: duplicate id.");
          continue;
        }
        subjects.push(Subject {
          id: sc.id.clone(),
          name: sc.name.clone(),
          description: sc.description.clone(),
          topics: sc.topics.clone(),
          image: sc.image.clone(),
        });
      }

      let mut ids: HashSet<String> = questions.iter().map(|q| q.id.clone()).collect();
      for qc in &cfg.questions {
        let q = Question {
          id: qc.id.clone(),
          subject_id: qc.subject_id.clone(),
          topic: qc.topic.clone(),
          text: qc.text.clone(),
          options: qc.options.clone(),
          correct_answer: qc.correct_answer.clone(),
          explanation: qc.explanation.clone(),
        };
        if !subjects.iter().any(|s| s.id == q.subject_id) {
          error!(target: "exam", id = %q.id, subject = %q.subject_id, "Skipping config question: unknown subject.");
          continue;
        }
        if !q.is_well_formed() {
          error!(target: "exam", id = %q.id, "Skipping config question: needs two options and a correct answer among them.");
          continue;
        }
        if !ids.insert(q.id.clone()) {
          error!(target: "exam", id = %q.id, "Skipping config question: duplicate id.");
          continue;
        }
        questions.push(q);
      }
    }

    let bank = Self::new(subjects, questions);
    for s in &bank.subjects {
      info!(target: "exam", subject = %s.id, questions = bank.questions_for_subject(&s.id).len(), "Startup question inventory");
    }
    bank
  }

  pub fn subjects(&self) -> &[Subject] {
    &self.subjects
  }

  pub fn subject_by_id(&self, id: &str) -> Option<&Subject> {
    self.subjects.iter().find(|s| s.id == id)
  }

  /// All questions of a subject in bank-storage order.
  pub fn questions_for_subject(&self, subject_id: &str) -> Vec<Question> {
    self
      .questions
      .iter()
      .filter(|q| q.subject_id == subject_id)
      .cloned()
      .collect()
  }

  /// Slice `[(batch-1)*size, batch*size)` of the subject's questions, clipped.
  /// Out-of-range batches (and `batch == 0` or `size == 0`) yield an empty list.
  pub fn questions_for_batch(&self, subject_id: &str, batch: usize, size: usize) -> Vec<Question> {
    if batch == 0 || size == 0 {
      return Vec::new();
    }
    let all = self.questions_for_subject(subject_id);
    let start = (batch - 1).saturating_mul(size);
    if start >= all.len() {
      return Vec::new();
    }
    let end = start.saturating_add(size).min(all.len());
    all[start..end].to_vec()
  }

  pub fn batch_count(&self, subject_id: &str, size: usize) -> usize {
    if size == 0 {
      return 0;
    }
    self.questions_for_subject(subject_id).len().div_ceil(size)
  }

  pub fn batches(&self, subject_id: &str, size: usize) -> Vec<BatchInfo> {
    let total = self.questions_for_subject(subject_id).len();
    (1..=self.batch_count(subject_id, size))
      .map(|number| {
        let first = (number - 1) * size + 1;
        let last = (number * size).min(total);
        BatchInfo {
          number,
          size,
          first,
          last,
          label: batch_label(number, first, last),
        }
      })
      .collect()
  }
}

pub fn batch_label(number: usize, first: usize, last: usize) -> String {
  format!("Batch {} (Q {}-{})", number, first, last)
}
