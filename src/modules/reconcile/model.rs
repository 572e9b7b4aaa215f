use serde::Serialize;

use crate::modules::reconcile::schema::SubjectFailure;

/// How a subject's aggregate is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountStrategy {
    /// Containment query if the store has one, else join.
    Auto,
    /// One containment count per subject.
    Query,
    /// Scan every fact once and count in memory.
    Join,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubjectOutcome {
    Updated {
        key: String,
        previous: Option<i64>,
        total: u64,
    },
    Unchanged {
        key: String,
        total: u64,
    },
    Failed(SubjectFailure),
}
