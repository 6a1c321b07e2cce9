pub mod checker;
pub mod config;
pub mod db;
pub mod error;
pub mod guard;
pub mod models;
pub mod pipeline;
pub mod review;

pub use checker::{build_checker, CheckOutcome, FactChecker, LiveChecker};
pub use config::Config;
pub use error::{CoercionFailure, FactCheckError, FailureCause, GuardRejection, ShapeViolation};
