use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use gcectl_core::Config;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod connection;
mod error;
mod output;
mod progress;

use cli::{Cli, Commands};
use connection::ConnectionManager;
use error::GcectlError;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let conn_mgr = match load_connection_manager(&cli) {
        Ok(conn_mgr) => conn_mgr,
        Err(e) => {
            e.print_diagnostic();
            std::process::exit(1);
        }
    };

    if let Err(e) = execute_command(&cli, &conn_mgr).await {
        e.print_diagnostic();
        std::process::exit(1);
    }

    Ok(())
}

/// Read the profile file named by `--config-file`, or the per-user one
fn load_connection_manager(cli: &Cli) -> Result<ConnectionManager, GcectlError> {
    let custom_path = cli.config_file.as_ref().map(PathBuf::from);
    let config = match &custom_path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    debug!(
        "Loaded {} profile(s) from {}",
        config.profiles.len(),
        custom_path
            .as_deref()
            .map_or_else(|| "the default location".to_string(), |p| p.display().to_string())
    );
    Ok(ConnectionManager::with_config_path(config, custom_path))
}

/// Install the stderr subscriber; RUST_LOG wins over `-v` when set
fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        EnvFilter::new(format!("gcectl={level},gcectl_core={level}"))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose > 1)
                .compact(),
        )
        .init();
}

async fn execute_command(cli: &Cli, conn_mgr: &ConnectionManager) -> Result<(), GcectlError> {
    info!("Running: {}", format_command(&cli.command));

    let started = Instant::now();
    let result = match &cli.command {
        Commands::Version => print_version(cli.output),
        Commands::Completions { shell } => {
            generate_completions(*shell);
            Ok(())
        }
        Commands::Profile(profile_cmd) => {
            commands::profile::handle_profile_command(
                profile_cmd,
                conn_mgr,
                cli.output,
                cli.query.as_deref(),
            )
            .await
        }
        Commands::Image(image_cmd) => {
            commands::image::handle_image_command(image_cmd, conn_mgr, cli).await
        }
        Commands::Group(group_cmd) => {
            commands::group::handle_group_command(group_cmd, conn_mgr, cli).await
        }
        Commands::Instance(instance_cmd) => {
            commands::instance::handle_instance_command(instance_cmd, conn_mgr, cli).await
        }
        Commands::Operation(operation_cmd) => {
            commands::operation::handle_operation_command(operation_cmd, conn_mgr, cli).await
        }
    };

    match &result {
        Ok(()) => info!("Finished in {:?}", started.elapsed()),
        Err(e) => error!("Failed after {:?}: {}", started.elapsed(), e),
    }
    result
}

fn print_version(format: cli::OutputFormat) -> Result<(), GcectlError> {
    let version = env!("CARGO_PKG_VERSION");
    match format {
        cli::OutputFormat::Json | cli::OutputFormat::Yaml => {
            let data = serde_json::json!({ "name": "gcectl", "version": version });
            let fmt = output::OutputFormat::resolve(format, output::OutputFormat::Json);
            output::print_output(&data, fmt, None)?;
        }
        _ => println!("gcectl {version}"),
    }
    Ok(())
}

fn generate_completions(shell: cli::Shell) {
    let mut cmd = Cli::command();
    let bin = cmd.get_name().to_string();
    let target = match shell {
        cli::Shell::Bash => clap_complete::Shell::Bash,
        cli::Shell::Zsh => clap_complete::Shell::Zsh,
        cli::Shell::Fish => clap_complete::Shell::Fish,
        cli::Shell::PowerShell => clap_complete::Shell::PowerShell,
        cli::Shell::Elvish => clap_complete::Shell::Elvish,
    };
    generate(target, &mut cmd, bin, &mut std::io::stdout());
}

/// Short description of a command for the log, with tokens left out
fn format_command(command: &Commands) -> String {
    match command {
        Commands::Version => "version".to_string(),
        Commands::Completions { shell } => format!("completions {:?}", shell),
        Commands::Profile(cmd) => {
            use cli::ProfileCommands::*;
            match cmd {
                List => "profile list".to_string(),
                Path => "profile path".to_string(),
                Show { name } => format!("profile show {}", name.as_deref().unwrap_or("")),
                Set { name, .. } => format!("profile set {} [credentials redacted]", name),
                Remove { name } => format!("profile remove {}", name),
                Default { name } => format!("profile default {}", name),
            }
        }
        Commands::Image(cli::ImageCommands::Roll {
            disk,
            instance_group,
            ..
        }) => format!("image roll {} -> {}", disk, instance_group),
        Commands::Group(cmd) => format!("group {:?}", cmd),
        Commands::Instance(cli::InstanceCommands::Create { name, .. }) => {
            format!("instance create {}", name)
        }
        Commands::Instance(cli::InstanceCommands::List) => "instance list".to_string(),
        Commands::Operation(cmd) => format!("operation {:?}", cmd),
    }
}
