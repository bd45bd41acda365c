//! Image roll-out command implementations

use crate::cli::{Cli, ImageCommands};
use crate::commands::{print_report, run_workflow};
use crate::connection::{ConnectionManager, Session};
use crate::error::Result as CliResult;
use crate::output::OutputFormat;
use crate::progress::Spinner;
use gcectl_core::workflows::roll_image::{RollImageParams, roll_image_workflow};
use gcectl_core::{FailurePolicy, WorkflowContext};
use tracing::{debug, info};

/// Handle image commands
pub async fn handle_image_command(
    image_cmd: &ImageCommands,
    conn_mgr: &ConnectionManager,
    cli: &Cli,
) -> CliResult<()> {
    match image_cmd {
        ImageCommands::Roll {
            disk,
            instance_group,
            run_id,
            temporary_suffix,
            keep_temporary,
            cleanup_on_failure,
        } => {
            let session = conn_mgr.session(cli)?;
            let params = roll_params(
                &session,
                disk,
                instance_group,
                run_id.as_deref(),
                temporary_suffix.as_deref(),
                *keep_temporary,
                *cleanup_on_failure,
            );
            handle_roll(conn_mgr, &session, params, cli).await
        }
    }
}

/// Merge the roll flags with the session's orchestration settings
fn roll_params(
    session: &Session,
    disk: &str,
    instance_group: &str,
    run_id: Option<&str>,
    temporary_suffix: Option<&str>,
    keep_temporary: bool,
    cleanup_on_failure: bool,
) -> RollImageParams {
    let orchestration = &session.orchestration;

    let policy = if cleanup_on_failure {
        FailurePolicy::DeleteTemporaries
    } else {
        orchestration.on_failure
    };

    let mut params = RollImageParams::new(&session.project, &session.zone, disk, instance_group)
        .with_temporary_suffix(
            temporary_suffix.unwrap_or(orchestration.temporary_suffix.as_str()),
        )
        .with_cleanup(orchestration.cleanup_temporary_resources && !keep_temporary)
        .with_failure_policy(policy);
    if let Some(run_id) = run_id {
        params = params.with_run_id(run_id);
    }
    params
}

async fn handle_roll(
    conn_mgr: &ConnectionManager,
    session: &Session,
    params: RollImageParams,
    cli: &Cli,
) -> CliResult<()> {
    debug!("Roll parameters: {:?}", params);
    info!(
        "Rolling disk '{}' into image '{}' for group '{}'",
        params.disk,
        params.image_name(),
        params.instance_group
    );

    let image_name = params.image_name();
    let workflow = roll_image_workflow(params)?;

    let spinner = Spinner::new(format!("Rolling image {}", image_name));
    let orchestrator = conn_mgr.orchestrator(session, Some(spinner.callback()))?;
    let ctx = WorkflowContext::new(&session.project, &session.zone);

    let report = run_workflow(&orchestrator, &spinner, &workflow, ctx).await?;

    let format = OutputFormat::resolve(cli.output, OutputFormat::Table);
    print_report(&report, format, cli.query.as_deref())
}
