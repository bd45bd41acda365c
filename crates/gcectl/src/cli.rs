//! CLI structure and command definitions

use clap::{Parser, Subcommand};
use gcectl_core::workflows::create_instance::{
    DEFAULT_IMAGE_FAMILY, DEFAULT_IMAGE_PROJECT, DEFAULT_MACHINE_TYPE, DEFAULT_NETWORK,
};

/// Compute Engine operations that wait for their results
#[derive(Parser, Debug)]
#[command(name = "gcectl")]
#[command(
    version,
    about = "Compute Engine CLI for image roll-outs, group resizes and instance creation"
)]
#[command(long_about = "
Compute Engine CLI for image roll-outs, group resizes and instance creation

Every mutation is submitted and then polled until the remote operation is
DONE, so a command only returns once the change has actually happened.

EXAMPLES:
    # Set up a profile (the token is read from the environment at load time)
    gcectl profile set prod --project my-project --zone europe-west1-d \\
        --access-token '${GCECTL_ACCESS_TOKEN}'

    # Bake a disk into an image and roll it into an instance group
    gcectl image roll --disk build-disk --instance-group web

    # Resize a group and wait for it to settle
    gcectl group resize --instance-group web --size 5

    # Create an instance and list what is running
    gcectl instance create --name demo-instance --metadata env=staging
    gcectl instance list -q '[].name'

For more help on a specific command, run:
    gcectl <command> --help
")]
pub struct Cli {
    /// Profile to use for this command
    #[arg(long, short, global = true, env = "GCECTL_PROFILE")]
    pub profile: Option<String>,

    /// Path to alternate configuration file
    #[arg(long, global = true, env = "GCECTL_CONFIG_FILE")]
    pub config_file: Option<String>,

    /// Project to operate on (overrides the profile)
    #[arg(long, global = true, env = "GCECTL_PROJECT")]
    pub project: Option<String>,

    /// Zone for zonal resources [default: profile zone, then europe-west1-d]
    #[arg(long, global = true, env = "GCECTL_ZONE")]
    pub zone: Option<String>,

    /// Bearer token for the Compute API (overrides the profile)
    #[arg(long, global = true, env = "GCECTL_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// API root (overrides the profile)
    #[arg(long, global = true, env = "GCECTL_ENDPOINT", hide = true)]
    pub endpoint: Option<String>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value = "auto")]
    pub output: OutputFormat,

    /// JMESPath query to filter output
    #[arg(long, short = 'q', global = true)]
    pub query: Option<String>,

    /// Enable verbose logging
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Seconds between operation status queries (at least 1)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval: Option<u64>,

    /// Give up on an operation after this many seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Override retry attempts for transient API failures
    #[arg(long, global = true)]
    pub retry_attempts: Option<u32>,

    /// Disable retry of transient API failures
    #[arg(long, global = true)]
    pub no_retry: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Automatically choose format based on command and context
    Auto,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
    /// Human-readable table format
    Table,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build images from disks and roll them into instance groups
    #[command(subcommand)]
    #[command(after_help = "EXAMPLES:
    # Snapshot build-disk, turn it into an image and retarget group web
    gcectl image roll --disk build-disk --instance-group web

    # Keep the intermediate snapshot and disk for inspection
    gcectl image roll --disk build-disk --instance-group web --keep-temporary

    # Delete intermediate resources if a later step fails
    gcectl image roll --disk build-disk --instance-group web --cleanup-on-failure
")]
    Image(ImageCommands),

    /// Managed instance group operations
    #[command(subcommand)]
    Group(GroupCommands),

    /// Instance operations
    #[command(subcommand)]
    Instance(InstanceCommands),

    /// Inspect or wait for individual operations
    #[command(subcommand, visible_alias = "op")]
    Operation(OperationCommands),

    /// Profile management
    #[command(subcommand, visible_alias = "prof")]
    #[command(after_help = "EXAMPLES:
    # Create a profile
    gcectl profile set prod --project my-project --zone europe-west1-d

    # List all profiles
    gcectl profile list

    # Show profile details
    gcectl profile show prod

    # Make a profile the default
    gcectl profile default prod
")]
    Profile(ProfileCommands),

    /// Version information
    #[command(visible_alias = "ver")]
    Version,

    /// Generate shell completions
    #[command(visible_alias = "comp")]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ImageCommands {
    /// Snapshot a disk, build an image from it and roll it into a group
    Roll {
        /// Disk whose contents become the new image
        #[arg(long, short)]
        disk: String,

        /// Managed instance group to retarget
        #[arg(long, short)]
        instance_group: String,

        /// Identifier used in generated names [default: current Unix time]
        #[arg(long)]
        run_id: Option<String>,

        /// Suffix for temporary resource names [default: profile setting, then "tmp"]
        #[arg(long)]
        temporary_suffix: Option<String>,

        /// Keep the intermediate snapshot and disk
        #[arg(long)]
        keep_temporary: bool,

        /// Delete intermediate resources if a step fails
        #[arg(long)]
        cleanup_on_failure: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum GroupCommands {
    /// Resize a managed instance group and wait until it settles
    Resize {
        /// Managed instance group to resize
        #[arg(long, short)]
        instance_group: String,

        /// Target number of instances
        #[arg(long, short = 'n')]
        size: u32,

        /// Seconds to wait for pending actions to drain [default: 100]
        #[arg(long)]
        settle_timeout: Option<u64>,
    },

    /// Show a managed instance group
    Get {
        /// Managed instance group name
        instance_group: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum InstanceCommands {
    /// Create an instance from the newest image of an image family
    Create {
        /// Instance name
        #[arg(long)]
        name: String,

        /// Machine type name or full machine type path
        #[arg(long, default_value = DEFAULT_MACHINE_TYPE)]
        machine_type: String,

        /// Project owning the image family
        #[arg(long, default_value = DEFAULT_IMAGE_PROJECT)]
        image_project: String,

        /// Image family to boot from
        #[arg(long, default_value = DEFAULT_IMAGE_FAMILY)]
        image_family: String,

        /// Network for the primary interface
        #[arg(long, default_value = DEFAULT_NETWORK)]
        network: String,

        /// Metadata item as KEY=VALUE (repeatable)
        #[arg(long, value_parser = parse_key_val)]
        metadata: Vec<(String, String)>,
    },

    /// List instances in the zone
    List,
}

#[derive(Subcommand, Debug)]
pub enum OperationCommands {
    /// Show the current state of an operation
    Get {
        /// Operation name
        name: String,

        /// "global" or a zone [default: the current zone]
        #[arg(long)]
        scope: Option<String>,
    },

    /// Wait for an operation to reach a terminal state
    Wait {
        /// Operation name
        name: String,

        /// "global" or a zone [default: the current zone]
        #[arg(long)]
        scope: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// List all profiles
    #[command(visible_alias = "ls")]
    List,

    /// Show the path to the configuration file
    Path,

    /// Show details of a profile
    Show {
        /// Profile name [default: the resolved profile]
        name: Option<String>,
    },

    /// Create or update a profile
    Set {
        /// Profile name
        name: String,

        /// Project ID
        #[arg(long)]
        project: String,

        /// Default zone
        #[arg(long)]
        zone: Option<String>,

        /// Access token, or a ${VAR} reference expanded when the config loads
        #[arg(long)]
        access_token: Option<String>,

        /// API root
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Remove a profile
    #[command(visible_alias = "rm")]
    Remove {
        /// Profile name
        name: String,
    },

    /// Set the default profile
    Default {
        /// Profile name
        name: String,
    },
}

/// Supported shells for completion generation
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
    Elvish,
}

/// Parse a `KEY=VALUE` pair
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("env=staging").unwrap(),
            ("env".to_string(), "staging".to_string())
        );
        assert_eq!(
            parse_key_val("startup=a=b").unwrap(),
            ("startup".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_poll_interval_must_be_positive() {
        let zero = Cli::try_parse_from(["gcectl", "--poll-interval", "0", "instance", "list"]);
        assert!(zero.is_err());

        let cli =
            Cli::try_parse_from(["gcectl", "--poll-interval", "3", "instance", "list"]).unwrap();
        assert_eq!(cli.poll_interval, Some(3));
    }

    #[test]
    fn test_image_roll_args() {
        let cli = Cli::try_parse_from([
            "gcectl",
            "image",
            "roll",
            "--disk",
            "build-disk",
            "--instance-group",
            "web",
            "--keep-temporary",
        ])
        .unwrap();
        match cli.command {
            Commands::Image(ImageCommands::Roll {
                disk,
                instance_group,
                keep_temporary,
                cleanup_on_failure,
                ..
            }) => {
                assert_eq!(disk, "build-disk");
                assert_eq!(instance_group, "web");
                assert!(keep_temporary);
                assert!(!cleanup_on_failure);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
