//! Clear and clear-case command implementations.

use crate::cli::{ClearArgs, ClearCaseArgs};
use crate::context::Context;
use crate::error::Result;
use crate::output::Formatter;
use casegraph_domain::CaseId;
use std::io::{self, Write};

/// Execute the clear command.
pub async fn execute_clear(args: ClearArgs, ctx: &Context, formatter: &Formatter) -> Result<()> {
    let report = ctx
        .janitor()
        .clear_pass_section(CaseId::new(args.case), args.pass.into(), args.section.into())
        .await?;
    println!("{}", formatter.format_clear(&report)?);
    Ok(())
}

/// Execute the clear-case command.
pub async fn execute_clear_case(args: ClearCaseArgs, ctx: &Context, formatter: &Formatter) -> Result<()> {
    let case_id = CaseId::new(args.case);

    // Confirm unless --yes is specified
    if !args.yes {
        println!(
            "About to remove all staged and committed entities of case {}, \
             and retract it from every shared class.",
            case_id
        );
        print!("Continue? [y/N] ");
        io::stdout().flush()?;

        let mut response = String::new();
        io::stdin().read_line(&mut response)?;

        if !response.trim().eq_ignore_ascii_case("y") {
            println!("{}", formatter.info("Operation cancelled"));
            return Ok(());
        }
    }

    let report = ctx.janitor().clear_all_case_data(case_id).await?;
    println!("{}", formatter.format_case_clear(&report)?);
    Ok(())
}
