//! Profile management command implementations

use crate::cli::{OutputFormat, ProfileCommands};
use crate::connection::ConnectionManager;
use crate::error::{GcectlError, Result as CliResult};
use crate::output;
use colored::Colorize;
use gcectl_core::{Profile, config::DEFAULT_ZONE};
use serde_json::{Value, json};
use tracing::{debug, info, trace};

/// Handle profile management commands
pub async fn handle_profile_command(
    profile_cmd: &ProfileCommands,
    conn_mgr: &ConnectionManager,
    output_format: OutputFormat,
    query: Option<&str>,
) -> CliResult<()> {
    use ProfileCommands::*;

    match profile_cmd {
        List => handle_list(conn_mgr, output_format, query).await,
        Path => handle_path(conn_mgr, output_format).await,
        Show { name } => handle_show(conn_mgr, name.as_deref(), output_format, query).await,
        Set {
            name,
            project,
            zone,
            access_token,
            endpoint,
        } => {
            handle_set(
                conn_mgr,
                name,
                project,
                zone.as_deref(),
                access_token.as_deref(),
                endpoint.as_deref(),
            )
            .await
        }
        Remove { name } => handle_remove(conn_mgr, name).await,
        Default { name } => handle_default(conn_mgr, name).await,
    }
}

/// Hide literal tokens; `${VAR}` references are safe to show
fn masked_token(token: Option<&str>) -> Option<String> {
    token.map(|t| {
        if t.starts_with("${") {
            t.to_string()
        } else {
            "****".to_string()
        }
    })
}

fn profile_json(name: &str, profile: &Profile, is_default: bool) -> Value {
    let mut obj = json!({
        "name": name,
        "project": profile.project,
        "zone": profile.zone,
        "endpoint": profile.endpoint,
        "is_default": is_default,
    });
    if let Some(token) = masked_token(profile.access_token.as_deref()) {
        obj["access_token"] = json!(token);
    }
    obj
}

async fn handle_list(
    conn_mgr: &ConnectionManager,
    output_format: OutputFormat,
    query: Option<&str>,
) -> CliResult<()> {
    debug!("Listing all configured profiles");
    let profiles = conn_mgr.config.list_profiles();
    trace!("Found {} profiles", profiles.len());
    let default = conn_mgr.config.default_profile.as_deref();

    match output_format {
        OutputFormat::Json | OutputFormat::Yaml => {
            let config_path = conn_mgr
                .config_file()
                .ok()
                .map(|p| p.to_string_lossy().to_string());
            let profile_list: Vec<Value> = profiles
                .iter()
                .map(|(name, profile)| profile_json(name, profile, default == Some(name.as_str())))
                .collect();

            let output_data = json!({
                "config_path": config_path,
                "profiles": profile_list,
                "count": profiles.len()
            });

            let fmt = output::OutputFormat::resolve(output_format, output::OutputFormat::Json);
            output::print_output(&output_data, fmt, query)?;
        }
        _ => {
            if let Ok(path) = conn_mgr.config_file() {
                println!("Configuration file: {}", path.display());
                println!();
            }

            if profiles.is_empty() {
                info!("No profiles configured");
                println!("No profiles configured.");
                println!("Use 'gcectl profile set' to create a profile.");
                return Ok(());
            }

            for (name, profile) in &profiles {
                if default == Some(name.as_str()) {
                    println!("{} {}", name.bold().cyan(), "(default)".green());
                } else {
                    println!("{}", name.bold().cyan());
                }
                println!("    {} {}", "Project:".dimmed(), profile.project);
                println!("    {}    {}", "Zone:".dimmed(), profile.zone);
            }
        }
    }

    Ok(())
}

async fn handle_path(conn_mgr: &ConnectionManager, output_format: OutputFormat) -> CliResult<()> {
    let config_path = conn_mgr.config_file()?;

    match output_format {
        OutputFormat::Json | OutputFormat::Yaml => {
            let output_data = json!({
                "config_path": config_path.to_string_lossy()
            });
            let fmt = output::OutputFormat::resolve(output_format, output::OutputFormat::Json);
            output::print_output(&output_data, fmt, None)?;
        }
        _ => {
            println!("{}", config_path.display());
        }
    }
    Ok(())
}

async fn handle_show(
    conn_mgr: &ConnectionManager,
    name: Option<&str>,
    output_format: OutputFormat,
    query: Option<&str>,
) -> CliResult<()> {
    let name = conn_mgr.config.resolve_profile(name)?;
    debug!("Showing profile: {}", name);
    let profile = conn_mgr.config.profile(&name)?;
    let is_default = conn_mgr.config.default_profile.as_deref() == Some(name.as_str());

    match output_format {
        OutputFormat::Json | OutputFormat::Yaml => {
            let mut obj = profile_json(&name, profile, is_default);
            obj["orchestration"] = serde_json::to_value(profile.orchestration())?;
            let fmt = output::OutputFormat::resolve(output_format, output::OutputFormat::Json);
            output::print_output(&obj, fmt, query)?;
        }
        _ => {
            let orchestration = profile.orchestration();
            println!("Profile: {}", name.bold().cyan());
            println!("  Project:  {}", profile.project);
            println!("  Zone:     {}", profile.zone);
            println!("  Endpoint: {}", profile.endpoint);
            if let Some(token) = masked_token(profile.access_token.as_deref()) {
                println!("  Token:    {}", token);
            }
            println!("  Poll interval: {}s", orchestration.poll_interval_secs);
            match orchestration.timeout_secs {
                Some(timeout) => println!("  Timeout:       {}s", timeout),
                None => println!("  Timeout:       none"),
            }
            println!("  Settle timeout: {}s", orchestration.settle_timeout_secs);
            println!(
                "  Clean up temporaries: {}",
                orchestration.cleanup_temporary_resources
            );
            if is_default {
                println!("  {}", "(default)".green());
            }
        }
    }

    Ok(())
}

async fn handle_set(
    conn_mgr: &ConnectionManager,
    name: &str,
    project: &str,
    zone: Option<&str>,
    access_token: Option<&str>,
    endpoint: Option<&str>,
) -> CliResult<()> {
    debug!("Setting profile: {}", name);

    if project.trim().is_empty() {
        return Err(GcectlError::InvalidInput {
            message: "--project must not be empty".to_string(),
        });
    }

    let mut config = conn_mgr.config.clone();

    // Updating keeps settings that were not given on the command line
    let mut profile = config
        .profiles
        .get(name)
        .cloned()
        .unwrap_or_else(|| Profile::new(project));
    profile.project = project.to_string();
    if let Some(zone) = zone {
        profile.zone = zone.to_string();
    } else if profile.zone.is_empty() {
        profile.zone = DEFAULT_ZONE.to_string();
    }
    if let Some(token) = access_token {
        profile.access_token = Some(token.to_string());
    }
    if let Some(endpoint) = endpoint {
        profile.endpoint = endpoint.to_string();
    }

    let first_profile = config.profiles.is_empty();
    config.set_profile(name.to_string(), profile);
    if first_profile {
        config.default_profile = Some(name.to_string());
    }

    conn_mgr.save_config(&config)?;

    println!("Profile '{}' saved successfully.", name);
    if first_profile {
        println!("Set as default profile.");
    }
    Ok(())
}

async fn handle_remove(conn_mgr: &ConnectionManager, name: &str) -> CliResult<()> {
    debug!("Removing profile: {}", name);

    if !conn_mgr.config.profiles.contains_key(name) {
        return Err(GcectlError::ProfileNotFound { name: name.into() });
    }

    let mut config = conn_mgr.config.clone();
    let was_default = config.default_profile.as_deref() == Some(name);
    config.remove_profile(name);
    conn_mgr.save_config(&config)?;

    println!("Profile '{}' removed successfully.", name);
    if was_default {
        println!("It was the default profile; no default is set now.");
    }
    Ok(())
}

async fn handle_default(conn_mgr: &ConnectionManager, name: &str) -> CliResult<()> {
    debug!("Setting default profile: {}", name);

    if !conn_mgr.config.profiles.contains_key(name) {
        return Err(GcectlError::ProfileNotFound { name: name.into() });
    }

    let mut config = conn_mgr.config.clone();
    config.default_profile = Some(name.to_string());
    conn_mgr.save_config(&config)?;

    println!("Default profile set to '{}'.", name);
    Ok(())
}
