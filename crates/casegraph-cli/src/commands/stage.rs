//! Stage command implementation.

use crate::cli::StageArgs;
use crate::context::Context;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use casegraph_domain::Candidate;
use serde::Deserialize;
use std::fs;
use std::io::{self, Read};

/// Execute the stage command.
pub async fn execute_stage(args: StageArgs, ctx: &Context, formatter: &Formatter) -> Result<()> {
    let json_data = if args.stdin {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else if let Some(file_path) = args.file {
        fs::read_to_string(file_path)?
    } else {
        return Err(CliError::InvalidInput(
            "Must specify either --file or --stdin".to_string(),
        ));
    };

    let candidates = parse_candidates(&json_data)?;
    let staged = ctx.staging().stage_batch(candidates).await?;

    println!("{}", formatter.format_records(&staged)?);
    Ok(())
}

/// One candidate or an array of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CandidateInput {
    Many(Vec<Candidate>),
    One(Box<Candidate>),
}

/// Parse stage input, rejecting an empty batch.
pub fn parse_candidates(json_data: &str) -> Result<Vec<Candidate>> {
    let candidates = match serde_json::from_str(json_data)? {
        CandidateInput::Many(candidates) => candidates,
        CandidateInput::One(candidate) => vec![*candidate],
    };

    if candidates.is_empty() {
        return Err(CliError::InvalidInput("No candidates provided".to_string()));
    }
    Ok(candidates)
}
