//! Agent mode selection and the run executor.

mod config;
mod convert;
mod events;
mod executor;
mod schemas;

pub use config::{
    merge_run_config, AgentMode, ConfigError, Configurable, DEFAULT_SYSTEM_MESSAGE,
};
pub use convert::{build_request, to_chat_message};
pub use events::RunEvent;
pub use executor::{
    ChatOutcome, ChatProvider, ExecutionPath, PathDeps, RunError, RECURSION_LIMIT,
};
pub use schemas::{config_schema, input_schema, output_schema};
