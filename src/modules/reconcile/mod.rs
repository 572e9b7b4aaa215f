pub mod controller;
pub mod error;
pub mod model;
pub mod schema;
