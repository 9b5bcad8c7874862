use super::Context;
use crate::error::CliError;
use crate::output::print_record;

pub(crate) async fn cmd_create(ctx: &Context, provider: &str, subject: &str) -> Result<(), CliError> {
    let record = ctx.engine().await?.create_proof(provider, subject).await?;
    print_record(&record, ctx.output, ctx.quiet);
    Ok(())
}

pub(crate) async fn cmd_verify(ctx: &Context, id: &str) -> Result<(), CliError> {
    let record = ctx.engine().await?.verify_proof(id).await?;
    print_record(&record, ctx.output, ctx.quiet);
    Ok(())
}
