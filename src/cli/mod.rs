pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{BuildArgs, CliArgs, Commands, ComponentsArgs, OutputFormatArg};
pub use output::{OutputFormat, OutputFormatter};
