//! Tab-scoped key-value hand-off store.
//!
//! Each client (browser tab) gets its own namespace. Values are stored as JSON strings
//! and read back by the summary endpoints; writing a key overwrites the previous value.
//! The number of scopes is capped: when a write opens one scope too many, the scope
//! written least recently is evicted.

use std::collections::HashMap;

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::error::StoreError;

/// Key under which the finalized exam result is handed to the summary view.
pub const EXAM_RESULT_KEY: &str = "examResult";
/// Key under which the generated AI exam (subject name + question texts) is kept.
pub const AI_GENERATED_EXAM_KEY: &str = "aiGeneratedExam";

/// Scopes kept when no capacity is configured.
pub const DEFAULT_MAX_SCOPES: usize = 1024;

#[derive(Default)]
struct Scope {
  values: HashMap<String, String>,
  /// Write sequence number of the last `set` into this scope.
  last_write: u64,
}

#[derive(Default)]
struct Scopes {
  by_client: HashMap<String, Scope>,
  seq: u64,
}

pub struct HandoffStore {
  scopes: RwLock<Scopes>,
  max_scopes: usize,
}

impl Default for HandoffStore {
  fn default() -> Self {
    Self::with_capacity(DEFAULT_MAX_SCOPES)
  }
}

impl HandoffStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_capacity(max_scopes: usize) -> Self {
    Self { scopes: RwLock::new(Scopes::default()), max_scopes: max_scopes.max(1) }
  }

  pub async fn scope_count(&self) -> usize {
    self.scopes.read().await.by_client.len()
  }

  #[instrument(level = "debug", skip(self, value))]
  pub async fn set<T: Serialize>(&self, scope: &str, key: &str, value: &T) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value)
      .map_err(|source| StoreError::Serialize { key: key.to_string(), source })?;
    self.set_raw(scope, key, raw).await;
    Ok(())
  }

  pub async fn set_raw(&self, scope: &str, key: &str, raw: String) {
    let mut scopes = self.scopes.write().await;
    scopes.seq += 1;
    let seq = scopes.seq;
    let entry = scopes.by_client.entry(scope.to_string()).or_default();
    entry.values.insert(key.to_string(), raw);
    entry.last_write = seq;

    while scopes.by_client.len() > self.max_scopes {
      let oldest = scopes
        .by_client
        .iter()
        .min_by_key(|(_, s)| s.last_write)
        .map(|(id, _)| id.clone());
      let Some(oldest) = oldest else { break };
      scopes.by_client.remove(&oldest);
      debug!(target: "exam_backend", scope = %oldest, "Evicted least recently written hand-off scope");
    }
  }

  /// Reads and parses a value. A value that does not parse is removed and reported
  /// as corrupted.
  #[instrument(level = "debug", skip(self))]
  pub async fn get<T: DeserializeOwned>(&self, scope: &str, key: &str) -> Result<Option<T>, StoreError> {
    let raw = {
      let scopes = self.scopes.read().await;
      scopes.by_client.get(scope).and_then(|s| s.values.get(key)).cloned()
    };
    let Some(raw) = raw else { return Ok(None) };
    match serde_json::from_str::<T>(&raw) {
      Ok(v) => Ok(Some(v)),
      Err(source) => {
        warn!(target: "exam_backend", %scope, %key, error = %source, "Clearing corrupted hand-off value");
        self.remove(scope, key).await;
        Err(StoreError::Corrupted { key: key.to_string(), source })
      }
    }
  }

  pub async fn remove(&self, scope: &str, key: &str) {
    let mut scopes = self.scopes.write().await;
    if let Some(s) = scopes.by_client.get_mut(scope) {
      s.values.remove(key);
      if s.values.is_empty() {
        scopes.by_client.remove(scope);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::Deserialize;

  #[derive(Debug, Serialize, Deserialize, PartialEq)]
  struct Record {
    score: usize,
  }

  #[tokio::test]
  async fn scopes_are_isolated_and_overwritten() {
    let store = HandoffStore::new();
    store.set("tab-a", EXAM_RESULT_KEY, &Record { score: 1 }).await.unwrap();
    store.set("tab-a", EXAM_RESULT_KEY, &Record { score: 2 }).await.unwrap();

    let a: Option<Record> = store.get("tab-a", EXAM_RESULT_KEY).await.unwrap();
    assert_eq!(a, Some(Record { score: 2 }));
    let b: Option<Record> = store.get("tab-b", EXAM_RESULT_KEY).await.unwrap();
    assert_eq!(b, None);
  }

  #[tokio::test]
  async fn corrupted_values_are_cleared() {
    let store = HandoffStore::new();
    store.set_raw("tab", EXAM_RESULT_KEY, "{not json".into()).await;

    let err = store.get::<Record>("tab", EXAM_RESULT_KEY).await.unwrap_err();
    assert!(matches!(err, StoreError::Corrupted { .. }));
    assert_eq!(store.get::<Record>("tab", EXAM_RESULT_KEY).await.unwrap(), None);
  }

  #[tokio::test]
  async fn scope_count_is_capped_and_oldest_evicted() {
    let store = HandoffStore::with_capacity(8);
    for i in 0..200 {
      store.set(&format!("tab-{}", i), EXAM_RESULT_KEY, &Record { score: i }).await.unwrap();
    }
    assert_eq!(store.scope_count().await, 8);
    assert_eq!(store.get::<Record>("tab-0", EXAM_RESULT_KEY).await.unwrap(), None);
    assert_eq!(store.get::<Record>("tab-199", EXAM_RESULT_KEY).await.unwrap(), Some(Record { score: 199 }));
  }

  #[tokio::test]
  async fn rewriting_a_scope_keeps_it_alive() {
    let store = HandoffStore::with_capacity(2);
    store.set("tab-a", EXAM_RESULT_KEY, &Record { score: 1 }).await.unwrap();
    store.set("tab-b", EXAM_RESULT_KEY, &Record { score: 2 }).await.unwrap();
    store.set("tab-a", AI_GENERATED_EXAM_KEY, &Record { score: 3 }).await.unwrap();
    store.set("tab-c", EXAM_RESULT_KEY, &Record { score: 4 }).await.unwrap();

    assert_eq!(store.scope_count().await, 2);
    assert_eq!(store.get::<Record>("tab-b", EXAM_RESULT_KEY).await.unwrap(), None);
    assert_eq!(store.get::<Record>("tab-a", EXAM_RESULT_KEY).await.unwrap(), Some(Record { score: 1 }));
  }
}
