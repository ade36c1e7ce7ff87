//! CLI command handlers.

pub mod config;
pub mod connection;
pub mod jobs;
pub mod plan;
pub mod sync;

pub use config::{run_config_show, run_config_validate};
pub use connection::run_connection_check;
pub use jobs::{JobsStatusArgs, run_jobs_status};
pub use plan::run_plan;
pub use sync::{SyncArgs, run_sync};
