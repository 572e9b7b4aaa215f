use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::{future, stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::settings::JobSettings;
use crate::modules::reconcile::{
    error::{FatalError, SubjectError},
    model::{CountStrategy, SubjectOutcome},
    schema::{RunReport, SubjectFailure},
};
use crate::modules::slot::crud::SlotCrud;
use crate::modules::user::{
    crud::UserCrud,
    model::{MalformedSubject, Subject},
};
use crate::services::store::DocumentStore;

/// Where per-subject totals come from for one run.
enum Counts {
    /// Containment query against these fact collections.
    Query(Vec<String>),
    /// Totals from a single scan of every fact.
    Tally(HashMap<String, u64>),
}

/// Recomputes every user's booking counter from the slots that reference it.
pub struct Reconciler {
    users: UserCrud,
    slots: SlotCrud,
    store: Arc<dyn DocumentStore>,
    settings: JobSettings,
}

impl Reconciler {
    pub fn new(store: Arc<dyn DocumentStore>, settings: JobSettings) -> Self {
        Self {
            users: UserCrud::new(store.clone(), &settings),
            slots: SlotCrud::new(store.clone(), &settings),
            store,
            settings,
        }
    }

    fn resolve_strategy(&self) -> Result<CountStrategy, FatalError> {
        let native = self.store.supports_contains_query();
        match self.settings.strategy {
            CountStrategy::Auto if native => Ok(CountStrategy::Query),
            CountStrategy::Auto => Ok(CountStrategy::Join),
            CountStrategy::Query if !native => Err(FatalError::QueryUnsupported),
            other => Ok(other),
        }
    }

    /// One full pass. Per-subject failures land in the report; only errors
    /// that leave nothing to process are returned as `Err`.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunReport, FatalError> {
        self.settings.validate()?;

        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();
        let strategy = self.resolve_strategy()?;

        info!(
            run_id = %run_id,
            subjects = %self.users.collection(),
            facts = %self.slots.source(),
            strategy = ?strategy,
            concurrency = self.settings.concurrency,
            dry_run = self.settings.dry_run,
            "starting reconciliation"
        );

        let entries = self
            .users
            .list_subjects()
            .await
            .map_err(FatalError::SubjectScan)?;
        let total = entries.len();
        info!(count = total, "loaded subjects");

        let collections = self
            .slots
            .resolve_collections()
            .await
            .map_err(FatalError::FactScan)?;
        if collections.is_empty() {
            warn!(facts = %self.slots.source(), "no fact collections matched, every counter will be set to 0");
        }

        let counts = match strategy {
            CountStrategy::Join => {
                let tally = self
                    .slots
                    .tally_all(&collections)
                    .await
                    .map_err(FatalError::FactScan)?;
                info!(referenced = tally.len(), "tallied slot references");
                Counts::Tally(tally)
            }
            _ => Counts::Query(collections),
        };

        let this = self;
        let counts = &counts;
        let cancel = &cancel;

        // Cancellation is checked each time a new subject would be pulled,
        // so in-flight subjects always run to completion.
        let mut results: Vec<(usize, SubjectOutcome)> = stream::iter(entries.into_iter().enumerate())
            .take_while(move |_| future::ready(!cancel.is_cancelled()))
            .map(move |(idx, entry)| async move { (idx, this.process(entry, counts).await) })
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;
        results.sort_by_key(|(idx, _)| *idx);

        let mut report = RunReport {
            run_id,
            started_at,
            finished_at: started_at,
            dry_run: self.settings.dry_run,
            strategy,
            processed: results.len(),
            updated: 0,
            unchanged: 0,
            skipped: total - results.len(),
            failures: Vec::new(),
        };

        for (_, outcome) in results {
            match outcome {
                SubjectOutcome::Updated { .. } => report.updated += 1,
                SubjectOutcome::Unchanged { .. } => report.unchanged += 1,
                SubjectOutcome::Failed(failure) => report.failures.push(failure),
            }
        }
        report.finished_at = Utc::now();

        if report.skipped > 0 {
            warn!(skipped = report.skipped, "run cancelled before all subjects were scheduled");
        }
        info!(
            processed = report.processed,
            updated = report.updated,
            unchanged = report.unchanged,
            failed = report.failed(),
            "reconciliation finished"
        );

        Ok(report)
    }

    async fn process(&self, entry: Result<Subject, MalformedSubject>, counts: &Counts) -> SubjectOutcome {
        let subject = match entry {
            Ok(subject) => subject,
            Err(malformed) => {
                let key = malformed.raw_id.clone();
                let err = SubjectError::from(malformed);
                warn!(key = %key, error = %err, "skipping subject");
                return SubjectOutcome::Failed(SubjectFailure::new(key, &err));
            }
        };

        self.reconcile(&subject, counts).await.unwrap_or_else(|err| {
            warn!(key = %subject.key, stage = ?err.stage(), error = %err, "subject failed");
            SubjectOutcome::Failed(SubjectFailure::new(subject.key.clone(), &err))
        })
    }

    /// The per-subject deadline bounds the count query only; writes are always awaited.
    async fn count(&self, subject: &Subject, counts: &Counts) -> Result<u64, SubjectError> {
        match counts {
            Counts::Tally(tally) => Ok(tally.get(&subject.key).copied().unwrap_or(0)),
            Counts::Query(collections) => {
                let deadline = self.settings.subject_timeout();
                match tokio::time::timeout(deadline, self.slots.count_booked_by(collections, &subject.key)).await {
                    Ok(result) => result.map_err(SubjectError::Query),
                    Err(_) => Err(SubjectError::Timeout(deadline)),
                }
            }
        }
    }

    async fn reconcile(&self, subject: &Subject, counts: &Counts) -> Result<SubjectOutcome, SubjectError> {
        let total = self.count(subject, counts).await?;

        if subject.current.and_then(|c| u64::try_from(c).ok()) == Some(total) {
            debug!(key = %subject.key, total, "counter already correct");
            return Ok(SubjectOutcome::Unchanged {
                key: subject.key.clone(),
                total,
            });
        }

        if self.settings.dry_run {
            info!(key = %subject.key, previous = ?subject.current, total, "would update counter");
        } else {
            self.users
                .set_total_bookings(subject, total)
                .await
                .map_err(SubjectError::Write)?;
            info!(key = %subject.key, previous = ?subject.current, total, "updated counter");
        }

        Ok(SubjectOutcome::Updated {
            key: subject.key.clone(),
            previous: subject.current,
            total,
        })
    }
}
