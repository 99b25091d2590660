use v2c::cli::commands::{CliArgs, Commands};
use v2c::cli::handlers::{handle_build, handle_components};
use v2c::util::init_from_config;
use v2c::{V2cConfig, VERSION};

use clap::Parser;
use tracing::debug;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("v2c v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Build(build_args) => handle_build(build_args, args.quiet).await,
        Commands::Components(components_args) => handle_components(components_args).await,
    };

    std::process::exit(exit_code);
}

/// Command-line level flags win over `V2C_LOG_LEVEL`. A malformed environment
/// is reported by the command handler once logging is up.
fn init_logging_from_args(args: &CliArgs) {
    let config = V2cConfig::from_env().unwrap_or_default();
    let log_level = if let Some(level) = &args.log_level {
        level.clone()
    } else if args.verbose {
        "debug".to_string()
    } else if args.quiet {
        "error".to_string()
    } else {
        config.log_level.clone()
    };

    init_from_config(&V2cConfig { log_level, ..config });
}
