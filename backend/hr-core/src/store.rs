// src/store.rs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, warn};

use crate::entity::Entity;
use crate::error::{HrError, Result};
use crate::models::{AttendanceRecord, Department, Employee, RecordId, TimeOffRequest};

/// Common CRUD surface shared by the in-memory and remote backends.
///
/// Reads return owned snapshots; mutating a returned value never touches the store.
#[async_trait]
pub trait EntityStore<T: Entity>: Send + Sync {
    async fn list(&self) -> Result<Vec<T>>;

    /// Fails with `NotFound` when the id is unknown.
    async fn get(&self, id: RecordId) -> Result<T>;

    async fn create_many(&self, drafts: Vec<T::Draft>) -> Result<BatchOutcome<T>>;

    async fn update(&self, id: RecordId, patch: T::Patch) -> Result<T>;

    /// Removes the record and returns it. Fails with `NotFound` and leaves the store
    /// untouched when the id is unknown.
    async fn delete(&self, id: RecordId) -> Result<T>;

    async fn create(&self, draft: T::Draft) -> Result<T> {
        self.create_many(vec![draft]).await?.into_first()
    }

    /// Current contents for checks made before a write. Unlike `list`, a backend that
    /// cannot be read is an error, never an empty collection.
    async fn snapshot(&self) -> Result<Vec<T>> {
        self.list().await
    }
}

/// Result of a batch write. Entries fail independently.
#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<BatchFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub index: usize,
    pub message: String,
}

impl<T> BatchOutcome<T> {
    pub fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Logs the failed subset under `context`. Successful entries are left for the caller.
    pub fn log_failures(&self, context: &str) {
        if self.failed.is_empty() {
            return;
        }
        warn!(
            "{}: {} of {} record(s) failed",
            context,
            self.failed.len(),
            self.failed.len() + self.succeeded.len()
        );
        for failure in &self.failed {
            error!("{}: record #{} failed: {}", context, failure.index, failure.message);
        }
    }

    /// Single-record view of a batch: the first success, or an error when nothing succeeded.
    pub fn into_first(self) -> Result<T> {
        let failed = self.failed.len();
        let succeeded = self.succeeded.len();
        match self.succeeded.into_iter().next() {
            Some(record) => Ok(record),
            None => Err(HrError::PartialBatchFailure { failed, succeeded }),
        }
    }
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self::new()
    }
}

// --- Backend Selection ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Fixture-seeded in-memory collections.
    #[default]
    #[serde(alias = "mock", alias = "fixtures")]
    Memory,
    /// Remote records API.
    #[serde(alias = "api")]
    Remote,
}

impl FromStr for Backend {
    type Err = HrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mock" | "fixtures" => Ok(Backend::Memory),
            "remote" | "api" => Ok(Backend::Remote),
            other => Err(HrError::Config(format!("unknown backend '{}'", other))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Memory => f.write_str("memory"),
            Backend::Remote => f.write_str("remote"),
        }
    }
}

/// One store per entity type, all from the same backend.
#[derive(Clone)]
pub struct Stores {
    pub backend: Backend,
    pub employees: Arc<dyn EntityStore<Employee>>,
    pub departments: Arc<dyn EntityStore<Department>>,
    pub time_off: Arc<dyn EntityStore<TimeOffRequest>>,
    pub attendance: Arc<dyn EntityStore<AttendanceRecord>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parses_aliases() {
        assert_eq!("memory".parse::<Backend>().unwrap(), Backend::Memory);
        assert_eq!("Mock".parse::<Backend>().unwrap(), Backend::Memory);
        assert_eq!(" remote ".parse::<Backend>().unwrap(), Backend::Remote);
        assert!(matches!(
            "postgres".parse::<Backend>(),
            Err(HrError::Config(_))
        ));
    }

    #[test]
    fn backend_deserializes_the_same_aliases() {
        let parse = |s: &str| serde_json::from_value::<Backend>(serde_json::json!(s)).unwrap();
        assert_eq!(parse("mock"), Backend::Memory);
        assert_eq!(parse("fixtures"), Backend::Memory);
        assert_eq!(parse("api"), Backend::Remote);
        assert_eq!(serde_json::to_value(Backend::Remote).unwrap(), "remote");
    }

    #[test]
    fn into_first_without_success_is_batch_failure() {
        let mut outcome: BatchOutcome<i32> = BatchOutcome::new();
        outcome.failed.push(BatchFailure {
            index: 0,
            message: "rejected".into(),
        });
        assert!(!outcome.is_complete());
        assert!(matches!(
            outcome.into_first(),
            Err(HrError::PartialBatchFailure {
                failed: 1,
                succeeded: 0
            })
        ));
    }

    #[test]
    fn into_first_keeps_successful_subset() {
        let outcome = BatchOutcome {
            succeeded: vec![10, 11],
            failed: vec![BatchFailure {
                index: 1,
                message: "bad".into(),
            }],
        };
        outcome.log_failures("test batch");
        assert_eq!(outcome.into_first().unwrap(), 10);
    }
}
