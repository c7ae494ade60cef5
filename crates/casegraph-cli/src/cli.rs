//! CLI command definitions and argument parsing.

use casegraph_domain::{ExtractionPass, SectionType};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Casegraph CLI - Stage, inspect and commit case entities.
#[derive(Debug, Parser)]
#[command(name = "casegraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory (overrides the configuration file)
    #[arg(long, global = true, env = "CASEGRAPH_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (identifiers and counts only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stage candidate entities from a JSON file or stdin
    Stage(StageArgs),

    /// List a case's staged entities with provenance
    List(ListArgs),

    /// Show the entities visible to a case's extraction prompt
    Prompt(PromptArgs),

    /// Commit staged entities to the permanent store
    Commit(CommitArgs),

    /// Clear a case's uncommitted entities for one pass and section
    Clear(ClearArgs),

    /// Remove every trace of a case, committed entities included
    ClearCase(ClearCaseArgs),

    /// Find committed classes resembling a label and definition
    Duplicates(DuplicatesArgs),

    /// Flip staging rows whose entities were written before a crash
    Reconcile,

    /// Show the version history of a permanent document
    History(HistoryArgs),
}

/// Arguments for the stage command.
#[derive(Debug, Parser)]
pub struct StageArgs {
    /// JSON file containing one candidate or an array of candidates
    #[arg(short = 'i', long)]
    pub file: Option<PathBuf>,

    /// Read candidates from stdin
    #[arg(long)]
    pub stdin: bool,
}

/// Arguments for the list command.
#[derive(Debug, Parser)]
pub struct ListArgs {
    /// Case identifier
    #[arg(long)]
    pub case: u64,

    /// Filter by extraction pass
    #[arg(short, long, value_enum)]
    pub pass: Option<PassArg>,

    /// Filter by section
    #[arg(short, long, value_enum)]
    pub section: Option<SectionArg>,

    /// Include rows already committed
    #[arg(short, long)]
    pub all: bool,
}

/// Arguments for the prompt command.
#[derive(Debug, Parser)]
pub struct PromptArgs {
    /// Case identifier
    #[arg(long)]
    pub case: u64,

    /// Extraction pass the prompt is built for
    #[arg(short, long, value_enum)]
    pub pass: PassArg,

    /// Section the prompt is built for
    #[arg(short, long, value_enum)]
    pub section: SectionArg,
}

/// Arguments for the commit command.
#[derive(Debug, Parser)]
pub struct CommitArgs {
    /// Case identifier
    #[arg(long)]
    pub case: u64,

    /// Entity identifiers to commit
    pub ids: Vec<String>,

    /// Commit every uncommitted entity the case has staged
    #[arg(short, long, conflicts_with = "ids")]
    pub all: bool,
}

/// Arguments for the clear command.
#[derive(Debug, Parser)]
pub struct ClearArgs {
    /// Case identifier
    #[arg(long)]
    pub case: u64,

    /// Extraction pass to clear
    #[arg(short, long, value_enum)]
    pub pass: PassArg,

    /// Section to clear
    #[arg(short, long, value_enum)]
    pub section: SectionArg,
}

/// Arguments for the clear-case command.
#[derive(Debug, Parser)]
pub struct ClearCaseArgs {
    /// Case identifier
    #[arg(long)]
    pub case: u64,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Arguments for the duplicates command.
#[derive(Debug, Parser)]
pub struct DuplicatesArgs {
    /// Label of the class being considered
    pub label: String,

    /// Its definition
    #[arg(short, long, default_value = "")]
    pub definition: String,

    /// Minimum blended score (0.0-1.0), overriding the configuration
    #[arg(short, long)]
    pub threshold: Option<f32>,

    /// Maximum number of results, overriding the configuration
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Arguments for the history command.
#[derive(Debug, Parser)]
pub struct HistoryArgs {
    /// Case whose individuals document to show (classes document when omitted)
    #[arg(long)]
    pub case: Option<u64>,

    /// Print the raw contents of one version
    #[arg(long)]
    pub show: Option<u64>,
}

/// Extraction pass argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum PassArg {
    /// Pass 1 (contextual framework)
    #[value(name = "1")]
    First,
    /// Pass 2 (normative requirements)
    #[value(name = "2")]
    Second,
    /// Pass 3 (temporal dynamics)
    #[value(name = "3")]
    Third,
}

/// Section argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SectionArg {
    /// Facts of the case
    Facts,
    /// Board discussion
    Discussion,
    /// Questions posed
    Questions,
    /// Conclusions reached
    Conclusions,
    /// Code and precedent references
    References,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}

impl From<PassArg> for ExtractionPass {
    fn from(pass: PassArg) -> Self {
        match pass {
            PassArg::First => ExtractionPass::First,
            PassArg::Second => ExtractionPass::Second,
            PassArg::Third => ExtractionPass::Third,
        }
    }
}

impl From<SectionArg> for SectionType {
    fn from(section: SectionArg) -> Self {
        match section {
            SectionArg::Facts => SectionType::Facts,
            SectionArg::Discussion => SectionType::Discussion,
            SectionArg::Questions => SectionType::Questions,
            SectionArg::Conclusions => SectionType::Conclusions,
            SectionArg::References => SectionType::References,
        }
    }
}
