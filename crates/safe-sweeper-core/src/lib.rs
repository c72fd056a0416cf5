pub mod backup;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod progress;
pub mod report;
pub mod restore;
pub mod storage;

pub use config::AppConfig;
pub use engine::{ExecuteOptions, ExecutionEngine, ExecutionHandle, ExecutionResult, FailureRecord};
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
