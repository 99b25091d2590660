use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Convert virtual machine disk images into container images
#[derive(Parser, Debug)]
#[command(
    name = "v2c",
    about = "Convert virtual machine disk images into container images",
    version,
    author,
    long_about = "v2c unpacks a VM disk image into a transport volume, runs detective \
                  components to find the operating system, applications and configuration \
                  inside it, and runs the matching provisioners to produce a layered \
                  container build context."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Build a container build context from a VM disk image",
        long_about = "Runs the packager, every installed detective and the matching \
                      provisioners, then assembles their output into the current \
                      directory, which must be empty.\n\n\
                      Examples:\n  \
                      v2c build --tag acme/legacy:1.0 /images/legacy.vmdk\n  \
                      v2c build --tag acme/legacy:1.0 --one-by-one --no-clean /dev/sdb"
    )]
    Build(BuildArgs),

    #[command(
        about = "List installed packagers, detectives and provisioners",
        long_about = "Lists the component images found on the Docker host.\n\n\
                      Examples:\n  \
                      v2c components\n  \
                      v2c components --format json"
    )]
    Components(ComponentsArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    #[arg(value_name = "DEVICE", help = "VM disk image or block device to convert")]
    pub device: String,

    #[arg(short = 't', long = "tag", value_name = "TARGET", help = "Output image repository and tag")]
    pub target: String,

    #[arg(long, help = "Keep the transport volume after the build")]
    pub no_clean: bool,

    #[arg(long, help = "Run detectives and provisioners one at a time")]
    pub one_by_one: bool,

    #[arg(
        long,
        value_name = "N",
        help = "Maximum number of component containers running at once"
    )]
    pub max_workers: Option<usize>,

    #[arg(
        short = 'C',
        long,
        value_name = "DIR",
        help = "Directory to assemble the build context in (defaults to current directory)"
    )]
    pub directory: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct ComponentsArgs {
    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Human,
}
