//! Reconcile command implementation.

use crate::context::Context;
use crate::error::Result;
use crate::output::Formatter;

/// Execute the reconcile command.
pub async fn execute_reconcile(ctx: &Context, formatter: &Formatter) -> Result<()> {
    let report = ctx.reconciler().run().await?;
    println!("{}", formatter.format_reconcile(&report)?);
    Ok(())
}
