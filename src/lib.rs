// Library interface for ergscore modules
// This allows integration tests and the CLI to share the core functionality

pub mod batch;
pub mod config;
pub mod database;
pub mod effort;
pub mod error;
pub mod import;
pub mod logging;
pub mod models;
pub mod personal_best;
pub mod pipeline;
pub mod zones;

// Re-export commonly used types for convenience
pub use database::Database;
pub use effort::{EffortBreakdown, EffortCalculator, EffortResult, WorkoutKind};
pub use error::{ErgScoreError, InputRangeError, Result, StoreError, ValidationError};
pub use import::{FieldValidator, WorkoutSubmission};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use models::*;
pub use personal_best::{
    InMemoryPbStore, PbCategory, PbOutcome, PersonalBestDetector, PersonalBestRecord,
    PersonalBestStore,
};
pub use pipeline::{DownstreamSink, ProcessedWorkout, WorkoutPipeline};
pub use zones::EffortZone;
