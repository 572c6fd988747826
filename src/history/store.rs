//! Durable, append-only postmortem history backed by SQLite.

use std::path::Path;
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;

use crate::types::config::HistoryConfig;
use crate::types::errors::RehearseError;
use crate::RehearseResult;

use super::postmortem::Postmortem;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS postmortems (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL UNIQUE,
        problem_id TEXT NOT NULL,
        mode TEXT NOT NULL,
        pattern TEXT NOT NULL,
        outcome TEXT NOT NULL,
        bug_class TEXT,
        time_to_solution_secs INTEGER NOT NULL,
        recorded_at TEXT NOT NULL,
        payload TEXT NOT NULL,
        digest TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_postmortems_pattern ON postmortems(pattern);

    CREATE TRIGGER IF NOT EXISTS postmortems_no_update
    BEFORE UPDATE ON postmortems
    BEGIN
        SELECT RAISE(ABORT, 'postmortem history is append-only');
    END;

    CREATE TRIGGER IF NOT EXISTS postmortems_no_delete
    BEFORE DELETE ON postmortems
    BEGIN
        SELECT RAISE(ABORT, 'postmortem history is append-only');
    END;
"#;

/// Result of re-hashing every stored record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub total: usize,
    pub valid: usize,
    /// Sequence numbers whose payload or digest does not check out.
    pub corrupted: Vec<i64>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.corrupted.is_empty()
    }
}

/// The postmortem log. Rows are only ever inserted.
pub struct HistoryStore {
    conn: Connection,
}

impl HistoryStore {
    /// Opens (or creates) the history database at `path`.
    pub fn open(path: &Path, busy_timeout: Duration) -> RehearseResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        tracing::debug!(path = %path.display(), "History store opened");
        Self::init(conn)
    }

    /// Opens the store named by the configuration.
    pub fn from_config(config: &HistoryConfig) -> RehearseResult<Self> {
        Self::open(
            &config.db_path,
            Duration::from_millis(config.busy_timeout_ms),
        )
    }

    /// A throwaway store, for tests and dry runs.
    pub fn open_in_memory() -> RehearseResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> RehearseResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Appends one postmortem, sealing it with its digest. The write takes
    /// the database write lock up front and either lands whole or not at all.
    pub fn append(&mut self, postmortem: &Postmortem) -> RehearseResult<Postmortem> {
        let sealed = postmortem.clone().sealed()?;
        let payload = sealed.canonical_json()?;
        let digest = sealed.digest.clone().unwrap_or_default();

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM postmortems WHERE session_id = ?1)",
            params![sealed.session_id],
            |row| row.get(0),
        )?;
        if exists {
            return Err(RehearseError::DuplicateRecord(sealed.session_id));
        }

        tx.execute(
            "INSERT INTO postmortems (session_id, problem_id, mode, pattern, outcome,
                                      bug_class, time_to_solution_secs, recorded_at,
                                      payload, digest)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                sealed.session_id,
                sealed.problem_id,
                sealed.mode.to_string(),
                sealed.pattern.to_string(),
                sealed.outcome.to_string(),
                sealed.bug_class.as_ref().map(|c| c.to_string()),
                sealed.time_to_solution_secs as i64,
                sealed.recorded_at.to_rfc3339(),
                payload,
                digest
            ],
        )?;
        tx.commit()?;

        tracing::info!(
            session_id = %sealed.session_id,
            pattern = %sealed.pattern,
            outcome = %sealed.outcome,
            "Postmortem recorded"
        );

        Ok(sealed)
    }

    /// Every postmortem, oldest first.
    pub fn all(&self) -> RehearseResult<Vec<Postmortem>> {
        let mut stmt = self
            .conn
            .prepare("SELECT seq, payload, digest FROM postmortems ORDER BY seq ASC")?;

        let records = stmt
            .query_map([], decode_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// The most recent postmortem.
    pub fn last(&self) -> RehearseResult<Option<Postmortem>> {
        let record = self
            .conn
            .query_row(
                "SELECT seq, payload, digest FROM postmortems ORDER BY seq DESC LIMIT 1",
                [],
                decode_row,
            )
            .optional()?;

        Ok(record)
    }

    /// Number of stored records.
    pub fn len(&self) -> RehearseResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM postmortems", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> RehearseResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Whether a postmortem for `session_id` exists.
    pub fn contains(&self, session_id: &str) -> RehearseResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM postmortems WHERE session_id = ?1)",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Re-hashes every payload and compares it with the stored digest.
    pub fn verify(&self) -> RehearseResult<VerifyReport> {
        let mut stmt = self
            .conn
            .prepare("SELECT seq, payload, digest FROM postmortems ORDER BY seq ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut report = VerifyReport::default();
        for row in rows {
            let (seq, payload, digest) = row?;
            report.total += 1;
            let intact = serde_json::from_str::<Postmortem>(&payload)
                .map(|p| Postmortem {
                    digest: Some(digest.clone()),
                    ..p
                })
                .map(|p| p.verify_digest())
                .unwrap_or(false);
            if intact {
                report.valid += 1;
            } else {
                tracing::warn!(seq, "Postmortem failed verification");
                report.corrupted.push(seq);
            }
        }

        Ok(report)
    }
}

/// Maps a `seq, payload, digest` row. A payload that no longer parses is a
/// conversion failure, so readers see an error instead of a shorter history.
fn decode_row(row: &Row<'_>) -> rusqlite::Result<Postmortem> {
    let seq: i64 = row.get(0)?;
    let payload: String = row.get(1)?;
    let digest: String = row.get(2)?;

    match serde_json::from_str::<Postmortem>(&payload) {
        Ok(record) => Ok(Postmortem {
            digest: Some(digest),
            ..record
        }),
        Err(e) => {
            tracing::error!(seq, error = %e, "Unreadable postmortem in history");
            Err(rusqlite::Error::FromSqlConversionFailure(
                1,
                Type::Text,
                format!("postmortem seq {}: {}", seq, e).into(),
            ))
        }
    }
}
