//! Run with: cargo run --bin restore_bookings
//!
//! Recomputes `totalBookings` on every user from the slots whose `bookedBy`
//! lists that user. Exit codes: 0 success, 1 fatal error, 2 some users
//! failed, 3 every user failed.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use recount::config::{self, settings::Cli};
use recount::modules::reconcile::error::FatalError;
use recount::services::mongo::MongoStore;
use recount::{Reconciler, RunOutcome};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use validator::Validate;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    config::logging::init("info");

    match run(cli).await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<RunOutcome> {
    cli.job.validate().map_err(FatalError::from)?;

    info!(database = %cli.database.database, "connecting to MongoDB");
    let db = config::database::connect(&cli.database)
        .await
        .map_err(FatalError::from)
        .context("startup failed")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight users");
            on_signal.cancel();
        }
    });

    let reconciler = Reconciler::new(Arc::new(MongoStore::new(db)), cli.job);
    let report = reconciler.run(cancel).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary());
    }

    Ok(report.outcome())
}
