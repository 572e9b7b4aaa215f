use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::modules::reconcile::error::SubjectError;
use crate::modules::reconcile::model::CountStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Key,
    Query,
    Write,
    /// The count query missed its deadline. Nothing was written.
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectFailure {
    pub key: String,
    pub stage: FailureStage,
    pub cause: String,
}

impl SubjectFailure {
    pub fn new(key: impl Into<String>, err: &SubjectError) -> Self {
        Self {
            key: key.into(),
            stage: err.stage(),
            cause: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    PartialFailure,
    TotalFailure,
}

impl RunOutcome {
    /// Process exit code. 1 is left for fatal errors.
    pub fn exit_code(self) -> u8 {
        match self {
            RunOutcome::Success => 0,
            RunOutcome::PartialFailure => 2,
            RunOutcome::TotalFailure => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub strategy: CountStrategy,
    /// Subjects that were attempted, whatever the result.
    pub processed: usize,
    /// Subjects whose counter was written (or would be, in a dry run).
    pub updated: usize,
    pub unchanged: usize,
    /// Subjects never scheduled because the run was cancelled.
    pub skipped: usize,
    pub failures: Vec<SubjectFailure>,
}

impl RunReport {
    pub fn success_count(&self) -> usize {
        self.updated + self.unchanged
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.failures.is_empty() {
            RunOutcome::Success
        } else if self.success_count() == 0 {
            RunOutcome::TotalFailure
        } else {
            RunOutcome::PartialFailure
        }
    }

    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} subjects processed: {} {}, {} unchanged, {} failed",
            self.processed,
            self.updated,
            if self.dry_run { "would be updated" } else { "updated" },
            self.unchanged,
            self.failed(),
        );
        if self.skipped > 0 {
            out.push_str(&format!(", {} skipped after cancellation", self.skipped));
        }
        for failure in &self.failures {
            out.push_str(&format!("\n  {} [{:?}]: {}", failure.key, failure.stage, failure.cause));
        }
        out
    }
}
