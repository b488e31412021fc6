pub mod error;
pub mod tools;
pub mod utils;
pub mod naming;
pub mod samples;
pub mod params;
pub mod config;
pub mod runner;
pub mod project;
pub mod stage;
pub mod parallel;
pub mod report;
pub mod terminal;

pub mod prelude {
    pub use crate::config::{DatabaseConfig, HostOrganism, References};
    pub use crate::error::CleanseqError;
    pub use crate::naming::OutputNamer;
    pub use crate::project::Project;
    pub use crate::runner::{CommandRunner, RetentionPolicy, ToolInvocation};
    pub use crate::samples::{InputSelection, SampleGroup};
    pub use crate::stage::{StageExecutor, StageKind, StageOutcome};
    pub use crate::tools::{Tool, ToolPaths};
    pub use crate::utils::init_logger;
}
