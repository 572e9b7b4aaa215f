pub mod config;
pub mod modules;
pub mod services;

pub use modules::reconcile::controller::Reconciler;
pub use modules::reconcile::schema::{RunOutcome, RunReport};
pub use services::store::{DocumentStore, FactSource, StoreError};
