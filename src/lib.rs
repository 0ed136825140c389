pub mod api;
pub mod config;
pub mod content;
pub mod error;
pub mod media;
pub mod orchestrator;
pub mod telemetry;
pub mod throttle;

pub mod util {
    pub mod db;
    pub mod env;
}

pub use error::{MigrationError, PipelineResult};
pub use orchestrator::{BatchReport, LazyOutcome, MigrationResult, Migrator};
