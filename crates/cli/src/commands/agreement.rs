use metaledger_engine::{check_with_retry, AgreementParams, LedgerError};
use metaledger_storage::Network;

use super::Context;
use crate::error::CliError;
use crate::output::print_record;

pub(crate) async fn cmd_create(
    ctx: &Context,
    app: String,
    agreement_type: String,
    network: String,
    rpc: Option<String>,
    meta: Vec<(String, String)>,
) -> Result<(), CliError> {
    // Known network names pick up the configured endpoint when --rpc is absent.
    let rpc_endpoint = match rpc {
        Some(rpc) => rpc,
        None => match network.parse::<Network>() {
            Ok(n) => ctx.settings.config.network.preset(n).rpc_endpoint.clone(),
            Err(_) => String::new(),
        },
    };
    let engine = ctx.engine().await?;
    let record = engine
        .create_agreement(AgreementParams {
            owner_app_id: app,
            agreement_type,
            network,
            rpc_endpoint,
            meta: meta.into_iter().collect(),
        })
        .await?;
    print_record(&record, ctx.output, ctx.quiet);
    Ok(())
}

pub(crate) async fn cmd_deploy(ctx: &Context, id: &str) -> Result<(), CliError> {
    let record = ctx.engine().await?.deploy_agreement(id).await?;
    print_record(&record, ctx.output, ctx.quiet);
    Ok(())
}

pub(crate) async fn cmd_verify(ctx: &Context, id: &str) -> Result<(), CliError> {
    let record = ctx.engine().await?.verify_agreement(id).await?;
    print_record(&record, ctx.output, ctx.quiet);
    Ok(())
}

/// Check the agreement can be connected, probe the endpoint with the
/// configured retry policy, then record the connection. The store is not
/// touched while probing.
pub(crate) async fn cmd_connect(ctx: &Context, id: &str, rpc: Option<&str>) -> Result<(), CliError> {
    let engine = ctx.engine().await?;
    let current = engine.connectable_agreement(id).await?;

    let endpoint = rpc
        .map(str::to_string)
        .filter(|e| !e.trim().is_empty())
        .or_else(|| current.as_agreement().map(|a| a.rpc_endpoint.clone()))
        .unwrap_or_default();
    if endpoint.trim().is_empty() {
        return Err(LedgerError::Validation(format!(
            "agreement {} has no rpc_endpoint; pass --rpc",
            id
        ))
        .into());
    }

    let report = check_with_retry(
        &ctx.probe(),
        &endpoint,
        ctx.settings.config.probe.retry_policy(),
    )
    .await;
    let record = engine.connect_testnet(id, &endpoint, &report).await?;
    print_record(&record, ctx.output, ctx.quiet);
    Ok(())
}

pub(crate) async fn cmd_archive(ctx: &Context, id: &str) -> Result<(), CliError> {
    let record = ctx.engine().await?.archive_agreement(id).await?;
    print_record(&record, ctx.output, ctx.quiet);
    Ok(())
}
