pub mod reconcile;
pub mod slot;
pub mod user;
