//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use casegraph_coordinator::{CommitReport, PromptEntities, PromptEntity, ReconcileReport};
use casegraph_domain::StagingRecord;
use casegraph_gatekeeper::DuplicateCandidate;
use casegraph_janitor::{CaseClearReport, ClearReport};
use colored::*;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format staged records.
    pub fn format_records(&self, records: &[StagingRecord]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(records)?),
            OutputFormat::Quiet => Ok(join_ids(records.iter().map(|r| r.entity.id.as_str()))),
            OutputFormat::Table => {
                if records.is_empty() {
                    return Ok(self.colorize("No staged entities found.", "yellow"));
                }

                let mut builder = Builder::default();
                builder.push_record(["Name", "Kind", "Label", "Pass", "Section", "State", "Identifier"]);
                for record in records {
                    let entity = &record.entity;
                    builder.push_record([
                        entity.id.local_name().to_string(),
                        entity.kind.to_string(),
                        entity.label.clone(),
                        entity.extraction_pass.number().to_string(),
                        entity.section_type.to_string(),
                        entity.commit_state.as_str().to_string(),
                        entity.id.to_string(),
                    ]);
                }
                Ok(self.render(builder))
            }
        }
    }

    /// Format the entities visible to a prompt.
    pub fn format_prompt(&self, entities: &PromptEntities) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let entries: Vec<serde_json::Value> = entities
                    .iter()
                    .map(|entry| {
                        let entity = entry.entity();
                        serde_json::json!({
                            "source": source_name(&entry),
                            "identifier": entity.id.to_string(),
                            "kind": entity.kind,
                            "label": entity.label,
                            "definition": entity.definition,
                            "committed": entry.is_committed(),
                        })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&serde_json::json!({
                    "entities": entries,
                    "shadowed": entities.shadowed,
                }))?)
            }
            OutputFormat::Quiet => Ok(join_ids(entities.iter().map(|e| e.entity().id.as_str()))),
            OutputFormat::Table => {
                if entities.is_empty() {
                    return Ok(self.colorize("No entities visible to this prompt.", "yellow"));
                }

                let mut builder = Builder::default();
                builder.push_record(["Source", "Name", "Kind", "Label", "Definition"]);
                for entry in entities.iter() {
                    let entity = entry.entity();
                    builder.push_record([
                        source_name(&entry).to_string(),
                        entity.id.local_name().to_string(),
                        entity.kind.to_string(),
                        entity.label.clone(),
                        truncate(&entity.definition, 60),
                    ]);
                }

                let mut out = self.render(builder);
                if entities.shadowed > 0 {
                    out.push('\n');
                    out.push_str(&self.info(&format!(
                        "{} staged entities hidden by committed ones",
                        entities.shadowed
                    )));
                }
                Ok(out)
            }
        }
    }

    /// Format duplicate candidates.
    pub fn format_candidates(&self, candidates: &[DuplicateCandidate]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let entries: Vec<serde_json::Value> = candidates
                    .iter()
                    .map(|c| {
                        serde_json::json!({
                            "identifier": c.identifier.to_string(),
                            "label": c.label,
                            "lexical": c.lexical,
                            "semantic": c.semantic,
                            "score": c.score,
                        })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&entries)?)
            }
            OutputFormat::Quiet => Ok(join_ids(candidates.iter().map(|c| c.identifier.as_str()))),
            OutputFormat::Table => {
                if candidates.is_empty() {
                    return Ok(self.colorize("No similar committed classes found.", "green"));
                }

                let mut builder = Builder::default();
                builder.push_record(["Score", "Lexical", "Semantic", "Label", "Identifier"]);
                for c in candidates {
                    builder.push_record([
                        format!("{:.2}", c.score),
                        format!("{:.2}", c.lexical),
                        format!("{:.2}", c.semantic),
                        c.label.clone(),
                        c.identifier.to_string(),
                    ]);
                }
                Ok(self.render(builder))
            }
        }
    }

    /// Format a commit report.
    pub fn format_commit(&self, report: &CommitReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
                "operation_id": report.operation_id.to_string(),
                "case_id": report.case_id,
                "classes_appended": report.classes_appended,
                "classes_merged": report.classes_merged,
                "individuals_appended": report.individuals_appended,
                "already_committed": report.already_committed,
                "rows_flipped": report.rows_flipped,
                "documents_written": report.documents_written,
            }))?),
            OutputFormat::Quiet => Ok(report.committed().to_string()),
            OutputFormat::Table => Ok(self.success(&report.summary())),
        }
    }

    /// Format a pass/section clear report.
    pub fn format_clear(&self, report: &ClearReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
            OutputFormat::Quiet => Ok(report.deleted_staged.to_string()),
            OutputFormat::Table => {
                let mut out = self.success(&report.summary());
                if report.remaining_committed() > 0 {
                    out.push('\n');
                    out.push_str(&self.info(
                        "Committed entities stay visible; use clear-case to remove a case's committed work",
                    ));
                }
                Ok(out)
            }
        }
    }

    /// Format a whole-case clear report.
    pub fn format_case_clear(&self, report: &CaseClearReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
            OutputFormat::Quiet => Ok(report.deleted_staged.to_string()),
            OutputFormat::Table if report.is_empty() => {
                Ok(self.info(&format!("Case {} has nothing to clear", report.case_id)))
            }
            OutputFormat::Table => Ok(self.success(&report.summary())),
        }
    }

    /// Format a reconciliation report.
    pub fn format_reconcile(&self, report: &ReconcileReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let flipped: serde_json::Map<String, serde_json::Value> = report
                    .flipped
                    .iter()
                    .map(|(case, rows)| (case.to_string(), serde_json::Value::from(*rows)))
                    .collect();
                Ok(serde_json::to_string_pretty(&serde_json::json!({
                    "cases_scanned": report.cases_scanned,
                    "rows_flipped": report.rows_flipped(),
                    "flipped": flipped,
                }))?)
            }
            OutputFormat::Quiet => Ok(report.rows_flipped().to_string()),
            OutputFormat::Table if report.rows_flipped() > 0 => Ok(self.warning(&report.summary())),
            OutputFormat::Table => Ok(self.success(&report.summary())),
        }
    }

    /// Format a document's version history.
    pub fn format_history(&self, document: &str, versions: &[u64]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
                "document": document,
                "versions": versions,
            }))?),
            OutputFormat::Quiet => Ok(join_ids(versions.iter().map(|v| v.to_string()))),
            OutputFormat::Table => {
                if versions.is_empty() {
                    return Ok(self.colorize(&format!("No versions of {} yet.", document), "yellow"));
                }
                let list: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
                Ok(self.info(&format!(
                    "{}: {} versions ({})",
                    document,
                    versions.len(),
                    list.join(", ")
                )))
            }
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn render(&self, builder: Builder) -> String {
        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

fn source_name(entry: &PromptEntity<'_>) -> &'static str {
    match entry {
        PromptEntity::Class(_) => "class",
        PromptEntity::Individual(_) => "individual",
        PromptEntity::Staged(_) => "staged",
    }
}

fn join_ids<I, T>(ids: I) -> String
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    ids.into_iter()
        .map(|id| id.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", cut)
}
