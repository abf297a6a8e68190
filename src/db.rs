// 🗄️ Company Store - SQLite persistence for companies and sync history
//
// One table per concept:
// - companies:    the records themselves (registry_number UNIQUE + CHECK)
// - sync_history: append-only log of sync attempts, cascades on delete
//
// Timestamps are stored as fixed-width RFC 3339 text (microseconds, Z), so
// ORDER BY on the text column is ORDER BY time.

use crate::entities::{
    Company, CompanyUpdate, NewSyncAttempt, RegistryNumber, SyncAttempt, SyncFields,
};
use crate::error::{ErrorKind, Result, SyncError};
use crate::registry::DataSource;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::{debug, info};

const COMPANY_COLUMNS: &str =
    "id, registry_number, name, phone, email, address, created_at, updated_at, last_synced_at";

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery (in-memory databases ignore it)
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", true)?;

    // ==========================================================================
    // Companies Table
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS companies (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT UNIQUE NOT NULL,
            registry_number TEXT UNIQUE NOT NULL
                CHECK (length(registry_number) = 8 AND registry_number NOT GLOB '*[^0-9]*'),
            name TEXT,
            phone TEXT,
            email TEXT,
            address TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_synced_at TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Sync History Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sync_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
            attempted_at TEXT NOT NULL,
            succeeded INTEGER NOT NULL,
            source TEXT,
            error_kind TEXT,
            error TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_companies_created_at ON companies(created_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sync_history_company ON sync_history(company_id, attempted_at)",
        [],
    )?;

    Ok(())
}

/// Current time at the precision the database keeps
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn to_db_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_db_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn company_from_row(row: &Row) -> rusqlite::Result<Company> {
    let registry_number: String = row.get(1)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;
    let last_synced_at: Option<String> = row.get(8)?;

    Ok(Company {
        id: row.get(0)?,
        registry_number: RegistryNumber::parse(&registry_number)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?,
        name: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
        address: row.get(5)?,
        created_at: parse_db_time(6, &created_at)?,
        updated_at: parse_db_time(7, &updated_at)?,
        last_synced_at: last_synced_at
            .map(|raw| parse_db_time(8, &raw))
            .transpose()?,
    })
}

fn attempt_from_row(row: &Row) -> rusqlite::Result<SyncAttempt> {
    let attempted_at: String = row.get(2)?;
    let source: Option<String> = row.get(4)?;
    let error_kind: Option<String> = row.get(5)?;

    Ok(SyncAttempt {
        id: row.get(0)?,
        company_id: row.get(1)?,
        attempted_at: parse_db_time(2, &attempted_at)?,
        succeeded: row.get(3)?,
        source: source.as_deref().and_then(DataSource::parse),
        error_kind: error_kind.as_deref().and_then(ErrorKind::parse),
        error: row.get(6)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ============================================================================
// COMPANY STORE
// ============================================================================

pub struct CompanyStore {
    conn: Connection,
}

impl CompanyStore {
    /// Wraps an open connection and provisions the schema
    pub fn new(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(CompanyStore { conn })
    }

    pub fn open(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "opening company database");
        CompanyStore::new(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        CompanyStore::new(Connection::open_in_memory()?)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Insert a bare record: no descriptive fields, both timestamps now
    pub fn create(&self, registry_number: &str) -> Result<Company> {
        let number = RegistryNumber::parse(registry_number)?;
        let company = Company::new(number, now());

        let result = self.conn.execute(
            "INSERT INTO companies (id, registry_number, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                company.id,
                company.registry_number.as_str(),
                to_db_time(&company.created_at),
                to_db_time(&company.updated_at),
            ],
        );

        match result {
            Ok(_) => {
                info!(
                    id = %company.id,
                    registry_number = %company.registry_number,
                    "company created"
                );
                Ok(company)
            }
            Err(ref e) if is_constraint_violation(e) => Err(SyncError::AlreadyExists(
                company.registry_number.to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get(&self, id: &str) -> Result<Company> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM companies WHERE id = ?1", COMPANY_COLUMNS),
                params![id],
                company_from_row,
            )
            .optional()?
            .ok_or_else(|| SyncError::company_not_found(id))
    }

    pub fn find_by_registry_number(&self, number: &RegistryNumber) -> Result<Option<Company>> {
        let company = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM companies WHERE registry_number = ?1",
                    COMPANY_COLUMNS
                ),
                params![number.as_str()],
                company_from_row,
            )
            .optional()?;

        Ok(company)
    }

    /// Newest first; same created_at falls back to later insertion first
    pub fn list(&self) -> Result<Vec<Company>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM companies ORDER BY created_at DESC, seq DESC",
            COMPANY_COLUMNS
        ))?;

        let companies = stmt
            .query_map([], company_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(companies)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM companies", [], |row| row.get(0))?;

        Ok(count as usize)
    }

    /// Partial update: only supplied fields change, updated_at always moves
    pub fn update(&self, id: &str, fields: &CompanyUpdate) -> Result<Company> {
        let changed = self.conn.execute(
            "UPDATE companies
             SET name = COALESCE(?1, name),
                 phone = COALESCE(?2, phone),
                 email = COALESCE(?3, email),
                 address = COALESCE(?4, address),
                 updated_at = ?5
             WHERE id = ?6",
            params![
                fields.name,
                fields.phone,
                fields.email,
                fields.address,
                to_db_time(&now()),
                id,
            ],
        )?;

        if changed == 0 {
            return Err(SyncError::company_not_found(id));
        }

        info!(id = %id, "company updated");
        self.get(id)
    }

    /// Total overwrite from a registry result, nulls included
    pub fn apply_sync(&self, id: &str, fields: &SyncFields) -> Result<Company> {
        let synced_at = to_db_time(&now());

        let changed = self.conn.execute(
            "UPDATE companies
             SET name = ?1,
                 phone = ?2,
                 email = ?3,
                 address = ?4,
                 updated_at = ?5,
                 last_synced_at = ?5
             WHERE id = ?6",
            params![
                fields.name,
                fields.phone,
                fields.email,
                fields.address,
                synced_at,
                id,
            ],
        )?;

        if changed == 0 {
            return Err(SyncError::company_not_found(id));
        }

        info!(id = %id, "company synced");
        self.get(id)
    }

    /// `apply_sync` plus its history row, committed together or not at all
    pub fn apply_sync_recorded(
        &self,
        id: &str,
        fields: &SyncFields,
        attempt: &NewSyncAttempt,
    ) -> Result<Company> {
        let tx = self.conn.unchecked_transaction()?;
        let company = self.apply_sync(id, fields)?;
        self.record_sync_attempt(id, attempt)?;
        tx.commit()?;

        Ok(company)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM companies WHERE id = ?1", params![id])?;

        if deleted == 0 {
            return Err(SyncError::company_not_found(id));
        }

        info!(id = %id, "company deleted");
        Ok(())
    }

    // ========================================================================
    // SYNC HISTORY
    // ========================================================================

    pub fn record_sync_attempt(
        &self,
        company_id: &str,
        attempt: &NewSyncAttempt,
    ) -> Result<SyncAttempt> {
        let result = self.conn.execute(
            "INSERT INTO sync_history (
                company_id, attempted_at, succeeded, source, error_kind, error
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                company_id,
                to_db_time(&attempt.attempted_at),
                attempt.succeeded,
                attempt.source.map(|s| s.as_str()),
                attempt.error_kind.map(|k| k.as_str()),
                attempt.error,
            ],
        );

        match result {
            Ok(_) => {}
            // Foreign key: the company is gone
            Err(ref e) if is_constraint_violation(e) => {
                return Err(SyncError::company_not_found(company_id))
            }
            Err(e) => return Err(e.into()),
        }

        Ok(SyncAttempt {
            id: self.conn.last_insert_rowid(),
            company_id: company_id.to_string(),
            attempted_at: attempt.attempted_at.trunc_subsecs(6),
            succeeded: attempt.succeeded,
            source: attempt.source,
            error_kind: attempt.error_kind,
            error: attempt.error.clone(),
        })
    }

    /// Newest attempt first
    pub fn sync_history(&self, company_id: &str) -> Result<Vec<SyncAttempt>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, company_id, attempted_at, succeeded, source, error_kind, error
             FROM sync_history
             WHERE company_id = ?1
             ORDER BY attempted_at DESC, id DESC",
        )?;

        let attempts = stmt
            .query_map(params![company_id], attempt_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(attempts)
    }
}

// ============================================================================
// TESTS
// ============================================================================
