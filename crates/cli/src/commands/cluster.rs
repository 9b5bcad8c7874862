use metaledger_engine::ClusterParams;
use metaledger_storage::ClusterNode;

use super::Context;
use crate::error::CliError;
use crate::output::print_record;

pub(crate) async fn cmd_create(
    ctx: &Context,
    app: String,
    nodes: Vec<ClusterNode>,
    rpc: Option<String>,
) -> Result<(), CliError> {
    let rpc_endpoint =
        rpc.unwrap_or_else(|| ctx.settings.config.network.testnet.rpc_endpoint.clone());
    let record = ctx
        .engine()
        .await?
        .create_cluster(ClusterParams {
            owner_app_id: app,
            nodes,
            rpc_endpoint,
        })
        .await?;
    print_record(&record, ctx.output, ctx.quiet);
    Ok(())
}

pub(crate) async fn cmd_configure(ctx: &Context, id: &str) -> Result<(), CliError> {
    let record = ctx.engine().await?.configure_cluster(id).await?;
    print_record(&record, ctx.output, ctx.quiet);
    Ok(())
}

pub(crate) async fn cmd_archive(ctx: &Context, id: &str) -> Result<(), CliError> {
    let record = ctx.engine().await?.archive_cluster(id).await?;
    print_record(&record, ctx.output, ctx.quiet);
    Ok(())
}
