//! Instance command implementations

use crate::cli::{Cli, InstanceCommands};
use crate::commands::{print_report, run_workflow};
use crate::connection::ConnectionManager;
use crate::error::Result as CliResult;
use crate::output::{self, OutputFormat};
use crate::progress::Spinner;
use gcectl_core::resource::link_name;
use gcectl_core::workflows::create_instance::{CreateInstanceParams, create_instance_workflow};
use gcectl_core::{ResourceKind, WorkflowContext};
use serde_json::{Value, json};
use tracing::{debug, info};

/// Handle instance commands
pub async fn handle_instance_command(
    instance_cmd: &InstanceCommands,
    conn_mgr: &ConnectionManager,
    cli: &Cli,
) -> CliResult<()> {
    match instance_cmd {
        InstanceCommands::Create {
            name,
            machine_type,
            image_project,
            image_family,
            network,
            metadata,
        } => {
            let session = conn_mgr.session(cli)?;
            let mut params = CreateInstanceParams::new(&session.project, &session.zone, name);
            params.machine_type = machine_type.clone();
            params.image_project = image_project.clone();
            params.image_family = image_family.clone();
            params.network = network.clone();
            params.metadata = metadata.clone();
            debug!("Create parameters: {:?}", params);
            info!("Creating instance '{}' in {}", name, session.zone);

            let workflow = create_instance_workflow(params)?;
            let spinner = Spinner::new(format!("Creating instance {}", name));
            let orchestrator = conn_mgr.orchestrator(&session, Some(spinner.callback()))?;
            let ctx = WorkflowContext::new(&session.project, &session.zone);

            let report = run_workflow(&orchestrator, &spinner, &workflow, ctx).await?;

            let format = OutputFormat::resolve(cli.output, OutputFormat::Table);
            print_report(&report, format, cli.query.as_deref())
        }
        InstanceCommands::List => {
            let session = conn_mgr.session(cli)?;
            let orchestrator = conn_mgr.orchestrator(&session, None)?;
            let instances = orchestrator
                .list_resources(&session.project, &session.zone_scope(), ResourceKind::Instance)
                .await?;
            debug!("Found {} instances", instances.len());

            let format = OutputFormat::resolve(cli.output, OutputFormat::Table);
            if format == OutputFormat::Table && cli.query.is_none() {
                if instances.is_empty() {
                    println!("No instances in {}", session.zone);
                    return Ok(());
                }
                let rows: Vec<Value> = instances.iter().map(summary).collect();
                output::print_output(&rows, format, None)?;
            } else {
                output::print_output(&instances, format, cli.query.as_deref())?;
            }
            Ok(())
        }
    }
}

/// One table row per instance
fn summary(instance: &Value) -> Value {
    let short = |key: &str| instance.get(key).and_then(Value::as_str).map(link_name);
    json!({
        "name": instance.get("name").and_then(Value::as_str),
        "status": instance.get("status").and_then(Value::as_str),
        "machineType": short("machineType"),
        "zone": short("zone"),
    })
}
