//! Duplicates command implementation.

use crate::cli::DuplicatesArgs;
use crate::context::Context;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use casegraph_gatekeeper::DedupConfig;

/// Execute the duplicates command.
pub async fn execute_duplicates(args: DuplicatesArgs, ctx: &Context, formatter: &Formatter) -> Result<()> {
    let config = dedup_config(&args, ctx.config().dedup.clone())?;
    let candidates = ctx.dedup(config)?.find_candidates(&args.label, &args.definition)?;
    println!("{}", formatter.format_candidates(&candidates)?);
    Ok(())
}

/// Apply command-line overrides to the configured settings.
fn dedup_config(args: &DuplicatesArgs, mut config: DedupConfig) -> Result<DedupConfig> {
    if args.label.trim().is_empty() {
        return Err(CliError::InvalidInput("Label must not be empty".to_string()));
    }

    if let Some(threshold) = args.threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(CliError::InvalidInput(
                "Threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        config.threshold = threshold;
    }
    if let Some(limit) = args.limit {
        config.max_results = limit;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(threshold: Option<f32>, limit: Option<usize>) -> DuplicatesArgs {
        DuplicatesArgs {
            label: "Public Safety Obligation".to_string(),
            definition: String::new(),
            threshold,
            limit,
        }
    }

    #[test]
    fn test_overrides_applied() {
        let config = dedup_config(&args(Some(0.3), Some(3)), DedupConfig::default()).unwrap();
        assert_eq!(config.threshold, 0.3);
        assert_eq!(config.max_results, 3);
    }

    #[test]
    fn test_defaults_kept() {
        let config = dedup_config(&args(None, None), DedupConfig::default()).unwrap();
        assert_eq!(config, DedupConfig::default());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let result = dedup_config(&args(Some(1.5), None), DedupConfig::default());
        assert!(matches!(result, Err(CliError::InvalidInput(_))));
    }
}
