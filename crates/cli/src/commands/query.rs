use metaledger_storage::RecordKind;

use super::Context;
use crate::error::CliError;
use crate::output::{print_history, print_record, print_records};

pub(crate) async fn cmd_status(ctx: &Context, id: &str) -> Result<(), CliError> {
    let record = ctx.engine().await?.get_status(id).await?;
    print_record(&record, ctx.output, ctx.quiet);
    Ok(())
}

pub(crate) async fn cmd_list(
    ctx: &Context,
    kind: RecordKind,
    app: Option<&str>,
) -> Result<(), CliError> {
    let records = ctx.engine().await?.list(kind, app).await?;
    print_records(&records, ctx.output, ctx.quiet);
    Ok(())
}

pub(crate) async fn cmd_history(ctx: &Context, id: &str) -> Result<(), CliError> {
    let events = ctx.engine().await?.history(id).await?;
    print_history(&events, ctx.output, ctx.quiet);
    Ok(())
}
