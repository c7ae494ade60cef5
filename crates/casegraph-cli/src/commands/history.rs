//! History command implementation.

use crate::cli::HistoryArgs;
use crate::context::Context;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use casegraph_domain::CaseId;
use casegraph_store::DocumentKey;

/// Execute the history command.
pub async fn execute_history(args: HistoryArgs, ctx: &Context, formatter: &Formatter) -> Result<()> {
    let key = document_key(&args);
    let permanent = ctx.handles().permanent();

    match args.show {
        Some(version) => {
            let bytes = permanent
                .read_raw(&key, version)?
                .ok_or_else(|| CliError::InvalidInput(format!("{} has no version {}", key, version)))?;
            print!("{}", String::from_utf8_lossy(&bytes));
        }
        None => {
            let versions = permanent.history(&key)?;
            println!("{}", formatter.format_history(&key.to_string(), &versions)?);
        }
    }
    Ok(())
}

fn document_key(args: &HistoryArgs) -> DocumentKey {
    match args.case {
        Some(case) => DocumentKey::Individuals(CaseId::new(case)),
        None => DocumentKey::Classes,
    }
}
