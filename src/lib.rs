pub mod config;
pub mod discover;
pub mod error;
pub mod external;
pub mod fuzz;
pub mod gather;
pub mod output;
pub mod pipeline;
pub mod probe;
pub mod records;
pub mod utils;

// re-export the types callers wire together
pub use crate::config::Config;
pub use crate::error::{ConfigError, PrereqError};
pub use crate::external::{BinaryLocator, CommandRunner, Toolkit, ToolCommand};
pub use crate::output::{LineSet, StageResult};
pub use crate::pipeline::{Pipeline, RunContext, RunOptions, RunOutcome};
