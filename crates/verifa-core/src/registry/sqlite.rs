//! Read-only SQLite registry.

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::{VerifyError, VerifyResult};
use crate::traits::{AcademicRegistry, IdentityRegistry};
use crate::types::{AcademicRecord, IdentityRecord};

/// Tables the registry reads. Provisioning is the owner's job; this is
/// exported so fixtures and tools can create a compatible database.
pub const REGISTRY_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS identities (
        identity_number TEXT PRIMARY KEY,
        full_name TEXT NOT NULL,
        birth_place TEXT,
        birth_date TEXT,
        gender TEXT,
        province TEXT,
        city TEXT
    );

    CREATE TABLE IF NOT EXISTS academics (
        diploma_number TEXT PRIMARY KEY,
        full_name TEXT NOT NULL,
        identity_number TEXT,
        institution TEXT,
        major TEXT,
        education_level TEXT,
        gpa REAL,
        graduation_year INTEGER
    );
";

const IDENTITY_COLUMNS: &str =
    "identity_number, full_name, birth_place, birth_date, gender, province, city";
const ACADEMIC_COLUMNS: &str = "diploma_number, full_name, identity_number, institution, major, education_level, gpa, graduation_year";

/// SQLite-backed registry.
pub struct SqliteRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRegistry {
    /// Open an existing database read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> VerifyResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already-open connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> VerifyResult<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| VerifyError::registry(e.to_string()))?;
        Ok(f(&conn)?)
    }
}

fn identity_from_row(row: &Row<'_>) -> rusqlite::Result<IdentityRecord> {
    let birth_date: Option<String> = row.get(3)?;
    Ok(IdentityRecord {
        identity_number: row.get(0)?,
        full_name: row.get(1)?,
        birth_place: row.get(2)?,
        birth_date: birth_date.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        gender: row.get(4)?,
        province: row.get(5)?,
        city: row.get(6)?,
    })
}

fn academic_from_row(row: &Row<'_>) -> rusqlite::Result<AcademicRecord> {
    let level: Option<String> = row.get(5)?;
    Ok(AcademicRecord {
        diploma_number: row.get(0)?,
        full_name: row.get(1)?,
        identity_number: row.get(2)?,
        institution: row.get(3)?,
        major: row.get(4)?,
        education_level: level.and_then(|l| l.parse().ok()),
        gpa: row.get(6)?,
        graduation_year: row.get(7)?,
    })
}

#[async_trait]
impl IdentityRegistry for SqliteRegistry {
    async fn find_identity(&self, identity_number: &str) -> VerifyResult<Option<IdentityRecord>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM identities WHERE identity_number = ?1",
                    IDENTITY_COLUMNS
                ),
                params![identity_number],
                identity_from_row,
            )
            .optional()
        })
    }

    async fn identity_candidates(
        &self,
        prefix: &str,
        limit: usize,
    ) -> VerifyResult<Vec<IdentityRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM identities
                 WHERE substr(identity_number, 1, length(?1)) = ?1
                 ORDER BY identity_number LIMIT ?2",
                IDENTITY_COLUMNS
            ))?;
            let rows = stmt.query_map(params![prefix, limit as i64], identity_from_row)?;
            rows.collect()
        })
    }
}

#[async_trait]
impl AcademicRegistry for SqliteRegistry {
    async fn find_academic(&self, diploma_number: &str) -> VerifyResult<Option<AcademicRecord>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM academics WHERE diploma_number = ?1",
                    ACADEMIC_COLUMNS
                ),
                params![diploma_number],
                academic_from_row,
            )
            .optional()
        })
    }

    async fn academic_candidates(
        &self,
        prefix: &str,
        limit: usize,
    ) -> VerifyResult<Vec<AcademicRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM academics
                 WHERE substr(diploma_number, 1, length(?1)) = ?1
                 ORDER BY diploma_number LIMIT ?2",
                ACADEMIC_COLUMNS
            ))?;
            let rows = stmt.query_map(params![prefix, limit as i64], academic_from_row)?;
            rows.collect()
        })
    }
}
