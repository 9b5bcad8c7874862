use metaledger_engine::{check_with_retry, LedgerError, RetryPolicy};

use super::Context;
use crate::error::CliError;
use crate::output::print_json;
use crate::OutputFormat;

/// Probe `endpoint`, or the configured testnet endpoint. An unreachable
/// endpoint is a connectivity error carrying the report.
pub(crate) async fn cmd_probe(
    ctx: &Context,
    endpoint: Option<&str>,
    no_retry: bool,
) -> Result<(), CliError> {
    let endpoint = endpoint
        .map(str::to_string)
        .unwrap_or_else(|| ctx.settings.config.network.testnet.rpc_endpoint.clone());
    let policy = if no_retry {
        RetryPolicy::no_retry()
    } else {
        ctx.settings.config.probe.retry_policy()
    };

    let report = check_with_retry(&ctx.probe(), &endpoint, policy).await;
    if !report.reachable {
        return Err(LedgerError::Connectivity { report }.into());
    }

    match ctx.output {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text if ctx.quiet => {
            println!("{}", report.height.unwrap_or_default());
        }
        OutputFormat::Text => {
            println!(
                "{} reachable, block height {} ({} ms)",
                report.endpoint,
                report.height.unwrap_or_default(),
                report.latency_ms.unwrap_or_default()
            );
        }
    }
    Ok(())
}
