use std::time::Duration;

use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::{Args, Parser};
use validator::{Validate, ValidationError};

use crate::modules::reconcile::model::CountStrategy;
use crate::services::store::FactSource;

#[derive(Debug, Parser)]
#[command(name = "restore_bookings", about = "Recompute denormalized booking counters")]
pub struct Cli {
    #[command(flatten)]
    pub database: DatabaseSettings,

    #[command(flatten)]
    pub job: JobSettings,

    /// Print the final report as JSON on stdout
    #[arg(long, env = "RECOUNT_JSON")]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct DatabaseSettings {
    #[arg(long = "mongodb-uri", env = "MONGODB_URI", hide_env_values = true)]
    pub uri: String,

    #[arg(long = "mongodb-database", env = "MONGODB_DATABASE", default_value = "recount")]
    pub database: String,
}

#[derive(Debug, Clone, Args, Validate)]
pub struct JobSettings {
    /// Collection holding the subjects whose counter is repaired
    #[arg(long, env = "RECOUNT_SUBJECTS", default_value = "users")]
    #[validate(length(min = 1, message = "Subject collection cannot be empty"))]
    pub subjects: String,

    /// Collection (or collection group) holding the facts
    #[arg(long, env = "RECOUNT_FACTS", default_value = "slots")]
    #[validate(length(min = 1, message = "Fact collection cannot be empty"))]
    pub facts: String,

    /// Treat `--facts` as a group: every collection named `<facts>` or `*.<facts>`
    #[arg(long, env = "RECOUNT_FACTS_GROUP", default_value_t = true, action = clap::ArgAction::Set)]
    pub group: bool,

    #[arg(long, env = "RECOUNT_REFERENCE_FIELD", default_value = "bookedBy")]
    #[validate(custom(function = "validate_field_name"))]
    pub reference_field: String,

    #[arg(long, env = "RECOUNT_AGGREGATE_FIELD", default_value = "totalBookings")]
    #[validate(custom(function = "validate_field_name"))]
    pub aggregate_field: String,

    /// auto, query (containment count per subject) or join (one scan of all facts)
    #[arg(long, env = "RECOUNT_STRATEGY", default_value = "auto", value_parser = strategy_parser())]
    pub strategy: CountStrategy,

    /// Subjects processed at once; 1 keeps the run strictly sequential
    #[arg(long, env = "RECOUNT_CONCURRENCY", default_value_t = 1)]
    #[validate(range(min = 1, max = 64, message = "Concurrency must be between 1 and 64"))]
    pub concurrency: usize,

    /// Deadline for one subject's count and write
    #[arg(long, env = "RECOUNT_SUBJECT_TIMEOUT_MS", default_value_t = 30_000)]
    #[validate(range(min = 1, max = 3_600_000, message = "Timeout must be between 1ms and 1h"))]
    pub subject_timeout_ms: u64,

    /// Compute and report without writing
    #[arg(long, env = "RECOUNT_DRY_RUN")]
    pub dry_run: bool,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            subjects: "users".to_string(),
            facts: "slots".to_string(),
            group: true,
            reference_field: "bookedBy".to_string(),
            aggregate_field: "totalBookings".to_string(),
            strategy: CountStrategy::Auto,
            concurrency: 1,
            subject_timeout_ms: 30_000,
            dry_run: false,
        }
    }
}

impl JobSettings {
    pub fn fact_source(&self) -> FactSource {
        if self.group {
            FactSource::Group(self.facts.clone())
        } else {
            FactSource::Collection(self.facts.clone())
        }
    }

    pub fn subject_timeout(&self) -> Duration {
        Duration::from_millis(self.subject_timeout_ms)
    }
}

fn strategy_parser() -> impl TypedValueParser<Value = CountStrategy> {
    PossibleValuesParser::new(["auto", "query", "join"]).map(strategy_from_name)
}

fn strategy_from_name(name: String) -> CountStrategy {
    match name.as_str() {
        "query" => CountStrategy::Query,
        "join" => CountStrategy::Join,
        _ => CountStrategy::Auto,
    }
}

fn validate_field_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() || name.starts_with('$') || name.contains('.') {
        let mut err = ValidationError::new("field_name");
        err.message = Some(format!("`{}` is not a plain top-level field name", name).into());
        return Err(err);
    }
    Ok(())
}
