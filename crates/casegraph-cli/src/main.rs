//! Casegraph CLI - Stage, inspect and commit case entities.

use anyhow::Context as _;
use casegraph_cli::commands;
use casegraph_cli::{Cli, Command, Config, Context, Formatter};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    // Initialize tracing (log to stderr so JSON output stays clean)
    let filter = EnvFilter::try_from_env("CASEGRAPH_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let format = cli.format.map(Into::into).unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    let data_dir = config.data_dir.clone();
    let ctx = Context::open(config).with_context(|| format!("opening stores in {}", data_dir.display()))?;

    // Repair commits interrupted between the document write and the staging flip
    if !matches!(cli.command, Command::Reconcile) {
        let report = ctx.reconciler().run().await.context("startup reconciliation")?;
        tracing::debug!("{}", report.summary());
    }

    match cli.command {
        Command::Stage(args) => commands::execute_stage(args, &ctx, &formatter).await?,
        Command::List(args) => commands::execute_list(args, &ctx, &formatter).await?,
        Command::Prompt(args) => commands::execute_prompt(args, &ctx, &formatter).await?,
        Command::Commit(args) => commands::execute_commit(args, &ctx, &formatter).await?,
        Command::Clear(args) => commands::execute_clear(args, &ctx, &formatter).await?,
        Command::ClearCase(args) => commands::execute_clear_case(args, &ctx, &formatter).await?,
        Command::Duplicates(args) => commands::execute_duplicates(args, &ctx, &formatter).await?,
        Command::Reconcile => commands::execute_reconcile(&ctx, &formatter).await?,
        Command::History(args) => commands::execute_history(args, &ctx, &formatter).await?,
    }

    Ok(())
}
