use metaledger_engine::DeploymentParams;
use metaledger_storage::Network;

use super::Context;
use crate::error::CliError;
use crate::output::print_record;

/// A deployment whose app path fails validation is still stored, in status
/// `failed`. It is printed like any other record and the command then
/// exits with the validation code.
pub(crate) async fn cmd_create(
    ctx: &Context,
    app: String,
    path: String,
    network: Network,
    wallet: Option<String>,
    algorithms: Vec<String>,
    ipfs: Option<String>,
) -> Result<(), CliError> {
    let ipfs_gateway =
        ipfs.unwrap_or_else(|| ctx.settings.config.network.preset(network).ipfs_gateway.clone());
    let engine = ctx.engine().await?;
    let record = engine
        .create_deployment(DeploymentParams {
            owner_app_id: app,
            app_path: path,
            network,
            wallet_ref: wallet,
            algorithms,
            ipfs_gateway,
        })
        .await?;
    print_record(&record, ctx.output, ctx.quiet);

    match record.as_deployment().and_then(|d| d.failure_reason.as_deref()) {
        Some(reason) => Err(CliError::failed(
            4,
            "validation",
            format!("deployment {} failed: {}", record.id, reason),
        )),
        None => Ok(()),
    }
}

pub(crate) async fn cmd_activate(ctx: &Context, id: &str) -> Result<(), CliError> {
    let record = ctx.engine().await?.activate_deployment(id).await?;
    print_record(&record, ctx.output, ctx.quiet);
    Ok(())
}

pub(crate) async fn cmd_archive(ctx: &Context, id: &str) -> Result<(), CliError> {
    let record = ctx.engine().await?.archive_deployment(id).await?;
    print_record(&record, ctx.output, ctx.quiet);
    Ok(())
}
