//! Managed instance group command implementations

use crate::cli::{Cli, GroupCommands};
use crate::commands::{print_report, run_workflow};
use crate::connection::{ConnectionManager, secs};
use crate::error::Result as CliResult;
use crate::output::{self, OutputFormat};
use crate::progress::Spinner;
use gcectl_core::workflows::resize::{ResizeParams, pending_actions, resize_workflow};
use gcectl_core::resource::link_name;
use gcectl_core::{ResourceKind, ResourceRef, WorkflowContext};
use serde_json::{Value, json};
use tracing::{debug, info};

/// Handle group commands
pub async fn handle_group_command(
    group_cmd: &GroupCommands,
    conn_mgr: &ConnectionManager,
    cli: &Cli,
) -> CliResult<()> {
    match group_cmd {
        GroupCommands::Resize {
            instance_group,
            size,
            settle_timeout,
        } => handle_resize(conn_mgr, cli, instance_group, *size, *settle_timeout).await,
        GroupCommands::Get { instance_group } => handle_get(conn_mgr, cli, instance_group).await,
    }
}

async fn handle_resize(
    conn_mgr: &ConnectionManager,
    cli: &Cli,
    instance_group: &str,
    size: u32,
    settle_timeout: Option<u64>,
) -> CliResult<()> {
    let session = conn_mgr.session(cli)?;
    info!("Resizing group '{}' to {}", instance_group, size);

    let mut params = ResizeParams::new(&session.project, &session.zone, instance_group, size)
        .with_settle(session.orchestration.settle_poll());
    if let Some(timeout) = settle_timeout {
        params = params.with_settle_timeout(secs(timeout));
    }
    debug!("Resize parameters: {:?}", params);
    let workflow = resize_workflow(params)?;

    let spinner = Spinner::new(format!("Resizing {} to {}", instance_group, size));
    let orchestrator = conn_mgr.orchestrator(&session, Some(spinner.callback()))?;
    let ctx = WorkflowContext::new(&session.project, &session.zone);

    let report = run_workflow(&orchestrator, &spinner, &workflow, ctx).await?;

    let format = OutputFormat::resolve(cli.output, OutputFormat::Table);
    print_report(&report, format, cli.query.as_deref())
}

async fn handle_get(conn_mgr: &ConnectionManager, cli: &Cli, instance_group: &str) -> CliResult<()> {
    let session = conn_mgr.session(cli)?;
    let orchestrator = conn_mgr.orchestrator(&session, None)?;
    let manager = ResourceRef::zonal(
        &session.project,
        &session.zone,
        ResourceKind::InstanceGroupManager,
        instance_group,
    );
    debug!("Fetching {}", manager);

    let doc = orchestrator.get_resource(&manager).await?;

    let format = OutputFormat::resolve(cli.output, OutputFormat::Table);
    if format == OutputFormat::Table && cli.query.is_none() {
        output::print_output(summary(&doc), format, None)?;
    } else {
        output::print_output(&doc, format, cli.query.as_deref())?;
    }
    Ok(())
}

/// Key facts about a managed instance group
fn summary(manager: &Value) -> Value {
    json!({
        "name": manager.get("name").cloned().unwrap_or(Value::Null),
        "targetSize": manager.get("targetSize").cloned().unwrap_or(Value::Null),
        "instanceTemplate": manager
            .get("instanceTemplate")
            .and_then(Value::as_str)
            .map(link_name),
        "pendingActions": pending_actions(manager),
    })
}
