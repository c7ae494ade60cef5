//! SQLite-backed staging workspace
//!
//! Rows are keyed by (case, pass, section, identifier). Entity attributes and
//! provenance are stored as JSON columns; everything used for filtering or
//! ordering is a real column.

use crate::StoreError;
use casegraph_domain::traits::{StagingClearCounts, StagingFilter, StagingStore};
use casegraph_domain::{
    CaseId, CommitState, Entity, EntityId, EntityKind, ExtractionPass, ProvenanceRecord, SectionType,
    StagingKey, StagingRecord,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

const SELECT_COLUMNS: &str = "seq, case_id, pass, section, identifier, kind, label, definition, \
     attributes, provenance, commit_state, created_at, committed_at";

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based implementation of [`StagingStore`]
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. Share a store behind a mutex, or
/// give each thread its own instance pointed at the same database file.
pub struct SqliteStagingStore {
    conn: Connection,
}

impl SqliteStagingStore {
    /// Open (or create) a staging store at the given path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use casegraph_store::SqliteStagingStore;
    ///
    /// let store = SqliteStagingStore::new("staging.db").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open a staging store, waiting at most `timeout` on a locked database
    pub fn with_busy_timeout<P: AsRef<Path>>(path: P, timeout: Duration) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(timeout)?;
        let mut store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    /// Number of rows in the workspace, committed markers included
    pub fn row_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM staging_records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn conversion_error(index: usize, ty: Type, message: String) -> rusqlite::Error {
        rusqlite::Error::FromSqlConversionFailure(index, ty, Box::new(StoreError::InvalidData(message)))
    }

    /// Map a row selected with [`SELECT_COLUMNS`] to a record
    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<StagingRecord> {
        let sequence: i64 = row.get(0)?;
        let case_id = CaseId::new(row.get::<_, i64>(1)? as u64);

        let pass_num: i64 = row.get(2)?;
        let pass = u8::try_from(pass_num)
            .ok()
            .and_then(ExtractionPass::from_number)
            .ok_or_else(|| Self::conversion_error(2, Type::Integer, format!("Unknown pass: {}", pass_num)))?;

        let section_str: String = row.get(3)?;
        let section = SectionType::parse(&section_str)
            .ok_or_else(|| Self::conversion_error(3, Type::Text, format!("Unknown section: {}", section_str)))?;

        let identifier: String = row.get(4)?;

        let kind_str: String = row.get(5)?;
        let kind = EntityKind::parse(&kind_str)
            .ok_or_else(|| Self::conversion_error(5, Type::Text, format!("Unknown kind: {}", kind_str)))?;

        let attributes_json: String = row.get(8)?;
        let attributes: BTreeMap<String, String> = serde_json::from_str(&attributes_json)
            .map_err(|e| Self::conversion_error(8, Type::Text, e.to_string()))?;

        let provenance_json: String = row.get(9)?;
        let provenance: ProvenanceRecord = serde_json::from_str(&provenance_json)
            .map_err(|e| Self::conversion_error(9, Type::Text, e.to_string()))?;

        let state_str: String = row.get(10)?;
        let commit_state = CommitState::parse(&state_str)
            .ok_or_else(|| Self::conversion_error(10, Type::Text, format!("Unknown state: {}", state_str)))?;

        let created_at: i64 = row.get(11)?;
        let committed_at: Option<i64> = row.get(12)?;

        Ok(StagingRecord {
            entity: Entity {
                id: EntityId::new(identifier),
                kind,
                label: row.get(6)?,
                definition: row.get(7)?,
                attributes,
                commit_state,
                case_id,
                extraction_pass: pass,
                section_type: section,
                created_at: created_at as u64,
                committed_at: committed_at.map(|t| t as u64),
            },
            provenance,
            sequence: sequence as u64,
        })
    }

    fn key_params(key: &StagingKey) -> (i64, u8, &'static str, &str) {
        (
            key.case_id.value() as i64,
            key.pass.number(),
            key.section.as_str(),
            key.entity_id.as_str(),
        )
    }
}

impl StagingStore for SqliteStagingStore {
    type Error = StoreError;

    fn put(&mut self, record: StagingRecord) -> Result<StagingRecord, Self::Error> {
        let key = record.key();
        let (case_id, pass, section, identifier) = Self::key_params(&key);
        let attributes = serde_json::to_string(&record.entity.attributes)?;
        let provenance = serde_json::to_string(&record.provenance)?;

        let tx = self.conn.transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT commit_state FROM staging_records
                 WHERE case_id = ?1 AND pass = ?2 AND section = ?3 AND identifier = ?4",
                params![case_id, pass, section, identifier],
                |row| row.get(0),
            )
            .optional()?;

        if existing.as_deref() == Some(CommitState::Committed.as_str()) {
            return Err(StoreError::AlreadyCommitted(key.entity_id.to_string()));
        }

        // Replacing keeps the original seq, so insertion order is stable
        tx.execute(
            "INSERT INTO staging_records
                (case_id, pass, section, identifier, kind, label, definition, attributes, provenance,
                 commit_state, created_at, committed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'uncommitted', ?10, NULL)
             ON CONFLICT(case_id, pass, section, identifier) DO UPDATE SET
                kind = excluded.kind,
                label = excluded.label,
                definition = excluded.definition,
                attributes = excluded.attributes,
                provenance = excluded.provenance,
                created_at = excluded.created_at",
            params![
                case_id,
                pass,
                section,
                identifier,
                record.entity.kind.as_str(),
                &record.entity.label,
                &record.entity.definition,
                &attributes,
                &provenance,
                record.entity.created_at as i64,
            ],
        )?;

        let stored = tx.query_row(
            &format!(
                "SELECT {} FROM staging_records
                 WHERE case_id = ?1 AND pass = ?2 AND section = ?3 AND identifier = ?4",
                SELECT_COLUMNS
            ),
            params![case_id, pass, section, identifier],
            Self::row_to_record,
        )?;

        tx.commit()?;
        Ok(stored)
    }

    fn get(&self, key: &StagingKey) -> Result<Option<StagingRecord>, Self::Error> {
        let (case_id, pass, section, identifier) = Self::key_params(key);
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM staging_records
                     WHERE case_id = ?1 AND pass = ?2 AND section = ?3 AND identifier = ?4",
                    SELECT_COLUMNS
                ),
                params![case_id, pass, section, identifier],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn list(&self, filter: &StagingFilter) -> Result<Vec<StagingRecord>, Self::Error> {
        let mut sql = format!("SELECT {} FROM staging_records WHERE case_id = ?", SELECT_COLUMNS);
        let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(filter.case_id.value() as i64)];

        if let Some(pass) = filter.pass {
            sql.push_str(" AND pass = ?");
            params.push(Box::new(pass.number()));
        }

        if let Some(section) = filter.section {
            sql.push_str(" AND section = ?");
            params.push(Box::new(section.as_str()));
        }

        if let Some(state) = filter.state {
            sql.push_str(" AND commit_state = ?");
            params.push(Box::new(state.as_str()));
        }

        sql.push_str(" ORDER BY seq");

        let mut stmt = self.conn.prepare(&sql)?;
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let records = stmt
            .query_map(&param_refs[..], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn clear(
        &mut self,
        case_id: CaseId,
        pass: ExtractionPass,
        section: SectionType,
    ) -> Result<StagingClearCounts, Self::Error> {
        let tx = self.conn.transaction()?;

        let retained: i64 = tx.query_row(
            "SELECT COUNT(*) FROM staging_records
             WHERE case_id = ?1 AND pass = ?2 AND section = ?3 AND commit_state = 'committed'",
            params![case_id.value() as i64, pass.number(), section.as_str()],
            |row| row.get(0),
        )?;

        let deleted = tx.execute(
            "DELETE FROM staging_records
             WHERE case_id = ?1 AND pass = ?2 AND section = ?3 AND commit_state = 'uncommitted'",
            params![case_id.value() as i64, pass.number(), section.as_str()],
        )?;

        tx.commit()?;

        Ok(StagingClearCounts {
            deleted,
            committed_retained: retained as usize,
        })
    }

    fn records_for_ids(&self, case_id: CaseId, ids: &[EntityId]) -> Result<Vec<StagingRecord>, Self::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM staging_records WHERE case_id = ? AND identifier IN ({}) ORDER BY seq",
            SELECT_COLUMNS, placeholders
        );

        let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(case_id.value() as i64)];
        for id in ids {
            params.push(Box::new(id.as_str().to_string()));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let records = stmt
            .query_map(&param_refs[..], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn owners_of(&self, id: &EntityId) -> Result<Vec<CaseId>, Self::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT case_id FROM staging_records WHERE identifier = ?1 ORDER BY case_id")?;

        let cases = stmt
            .query_map(params![id.as_str()], |row| row.get::<_, i64>(0))?
            .map(|r| r.map(|v| CaseId::new(v as u64)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(cases)
    }

    fn mark_committed(&mut self, case_id: CaseId, ids: &[EntityId], committed_at: u64) -> Result<usize, Self::Error> {
        let tx = self.conn.transaction()?;
        let mut changed = 0;

        {
            let mut stmt = tx.prepare(
                "UPDATE staging_records SET commit_state = 'committed', committed_at = ?3
                 WHERE case_id = ?1 AND identifier = ?2 AND commit_state = 'uncommitted'",
            )?;

            for id in ids {
                changed += stmt.execute(params![case_id.value() as i64, id.as_str(), committed_at as i64])?;
            }
        }

        tx.commit()?;
        Ok(changed)
    }

    fn delete_case(&mut self, case_id: CaseId) -> Result<usize, Self::Error> {
        let deleted = self.conn.execute(
            "DELETE FROM staging_records WHERE case_id = ?1",
            params![case_id.value() as i64],
        )?;
        Ok(deleted)
    }

    fn cases_with_uncommitted(&self) -> Result<Vec<CaseId>, Self::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT case_id FROM staging_records WHERE commit_state = 'uncommitted' ORDER BY case_id",
        )?;

        let cases = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .map(|r| r.map(|v| CaseId::new(v as u64)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(cases)
    }
}
