//! Prompt command implementation.

use crate::cli::PromptArgs;
use crate::context::Context;
use crate::error::Result;
use crate::output::Formatter;
use casegraph_domain::CaseId;

/// Execute the prompt command.
pub async fn execute_prompt(args: PromptArgs, ctx: &Context, formatter: &Formatter) -> Result<()> {
    let entities = ctx
        .query()
        .entities_for_prompt(CaseId::new(args.case), args.pass.into(), args.section.into())?;
    println!("{}", formatter.format_prompt(&entities)?);
    Ok(())
}
