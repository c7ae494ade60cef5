//! Commit command implementation.

use crate::cli::CommitArgs;
use crate::context::Context;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use casegraph_domain::traits::StagingFilter;
use casegraph_domain::{CaseId, EntityId};

/// Execute the commit command.
pub async fn execute_commit(args: CommitArgs, ctx: &Context, formatter: &Formatter) -> Result<()> {
    let case_id = CaseId::new(args.case);

    let ids = if args.all {
        // The coordinator collapses identifiers staged in several sections
        ctx.staging()
            .list(&StagingFilter::for_case(case_id))?
            .into_iter()
            .map(|record| record.entity.id)
            .collect()
    } else {
        parse_ids(&args.ids)?
    };

    if ids.is_empty() {
        println!("{}", formatter.info(&format!("Case {} has nothing staged to commit", case_id)));
        return Ok(());
    }

    let report = ctx.coordinator().commit(case_id, &ids).await?;
    println!("{}", formatter.format_commit(&report)?);
    Ok(())
}

/// Parse identifiers given on the command line.
pub fn parse_ids(raw: &[String]) -> Result<Vec<EntityId>> {
    if raw.is_empty() {
        return Err(CliError::InvalidInput(
            "Specify entity identifiers or --all".to_string(),
        ));
    }

    raw.iter()
        .map(|id| {
            EntityId::parse(id).map_err(|e| CliError::InvalidInput(format!("Invalid identifier '{}': {}", id, e)))
        })
        .collect()
}
