//! List command implementation.

use crate::cli::ListArgs;
use crate::context::Context;
use crate::error::Result;
use crate::output::Formatter;
use casegraph_domain::traits::StagingFilter;
use casegraph_domain::CaseId;

/// Execute the list command.
pub async fn execute_list(args: ListArgs, ctx: &Context, formatter: &Formatter) -> Result<()> {
    let filter = build_filter(&args);
    let records = ctx.staging().list(&filter)?;
    println!("{}", formatter.format_records(&records)?);
    Ok(())
}

fn build_filter(args: &ListArgs) -> StagingFilter {
    let mut filter = StagingFilter::for_case(CaseId::new(args.case));
    if let Some(pass) = args.pass {
        filter = filter.with_pass(pass.into());
    }
    if let Some(section) = args.section {
        filter = filter.with_section(section.into());
    }
    if args.all {
        filter = filter.any_state();
    }
    filter
}
