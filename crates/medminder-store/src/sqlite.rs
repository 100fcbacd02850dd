//! SQLite-based store implementation

use chrono::{DateTime, Local};
use medminder_api::{Medication, MedicationFilter, UserPreferences};
use medminder_util::{MedicationId, UserId};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{AuditEvent, Store, StoreError, StoreResult};

const HISTORY_DOSE: &str = "dose";
const HISTORY_REFILL: &str = "refill";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            -- Medication documents
            CREATE TABLE IF NOT EXISTS medications (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                is_active INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                doc_json TEXT NOT NULL
            );

            -- Per-user preferences
            CREATE TABLE IF NOT EXISTS preferences (
                user_id TEXT PRIMARY KEY,
                prefs_json TEXT NOT NULL
            );

            -- Dose and refill history
            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                medication_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                at TEXT NOT NULL
            );

            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_medications_user ON medications(user_id, is_active);
            CREATE INDEX IF NOT EXISTS idx_history_medication ON history(medication_id, kind);
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }

    fn record_history(
        &self,
        id: &MedicationId,
        kind: &str,
        at: DateTime<Local>,
    ) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO history (medication_id, kind, at) VALUES (?, ?, ?)",
            params![id.as_str(), kind, at.to_rfc3339()],
        )?;

        debug!(medication_id = %id, kind, at = %at, "History recorded");
        Ok(())
    }

    fn history(
        &self,
        id: &MedicationId,
        kind: &str,
        limit: usize,
    ) -> StoreResult<Vec<DateTime<Local>>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT at FROM history WHERE medication_id = ? AND kind = ? ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map(params![id.as_str(), kind, limit as i64], |row| {
            row.get::<_, String>(0)
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(parse_timestamp(&row?)?);
        }
        Ok(out)
    }
}

fn parse_timestamp(s: &str) -> StoreResult<DateTime<Local>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|source| StoreError::Timestamp {
            value: s.to_string(),
            source,
        })
}

impl Store for SqliteStore {
    fn list_medications(
        &self,
        user_id: &UserId,
        filter: &MedicationFilter,
    ) -> StoreResult<Vec<Medication>> {
        let conn = self.lock()?;

        // The active flag is indexed; the remaining filters run over the documents
        let mut stmt = conn.prepare(
            r#"
            SELECT doc_json FROM medications
            WHERE user_id = ?1 AND (?2 IS NULL OR is_active = ?2)
            ORDER BY created_at ASC, id ASC
            "#,
        )?;

        let rows = stmt.query_map(params![user_id.as_str(), filter.active], |row| {
            row.get::<_, String>(0)
        })?;

        let mut medications = Vec::new();
        for row in rows {
            let medication: Medication = serde_json::from_str(&row?)?;
            if filter.matches(&medication) {
                medications.push(medication);
            }
        }

        Ok(medications)
    }

    fn get_medication(&self, id: &MedicationId) -> StoreResult<Option<Medication>> {
        let conn = self.lock()?;

        let json: Option<String> = conn
            .query_row(
                "SELECT doc_json FROM medications WHERE id = ?",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    fn save_medication(&self, medication: &Medication) -> StoreResult<()> {
        let conn = self.lock()?;
        let json = serde_json::to_string(medication)?;

        conn.execute(
            r#"
            INSERT INTO medications (id, user_id, is_active, created_at, doc_json)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id)
            DO UPDATE SET user_id = excluded.user_id,
                          is_active = excluded.is_active,
                          doc_json = excluded.doc_json
            "#,
            params![
                medication.id.as_str(),
                medication.user_id.as_str(),
                medication.is_active,
                medication.created_at.to_rfc3339(),
                json
            ],
        )?;

        debug!(medication_id = %medication.id, name = %medication.name, "Medication saved");
        Ok(())
    }

    fn set_medication_active(
        &self,
        id: &MedicationId,
        active: bool,
        now: DateTime<Local>,
    ) -> StoreResult<()> {
        let mut medication = self
            .get_medication(id)?
            .ok_or_else(|| StoreError::MedicationNotFound(id.clone()))?;

        medication.is_active = active;
        medication.updated_at = now;
        self.save_medication(&medication)
    }

    fn delete_medication(&self, id: &MedicationId) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM history WHERE medication_id = ?", [id.as_str()])?;
        let removed = conn.execute("DELETE FROM medications WHERE id = ?", [id.as_str()])?;
        if removed == 0 {
            return Err(StoreError::MedicationNotFound(id.clone()));
        }

        debug!(medication_id = %id, "Medication deleted");
        Ok(())
    }

    fn get_preferences(&self, user_id: &UserId) -> StoreResult<Option<UserPreferences>> {
        let conn = self.lock()?;

        let json: Option<String> = conn
            .query_row(
                "SELECT prefs_json FROM preferences WHERE user_id = ?",
                [user_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    fn save_preferences(&self, user_id: &UserId, prefs: &UserPreferences) -> StoreResult<()> {
        let conn = self.lock()?;
        let json = serde_json::to_string(prefs)?;

        conn.execute(
            r#"
            INSERT INTO preferences (user_id, prefs_json)
            VALUES (?, ?)
            ON CONFLICT(user_id)
            DO UPDATE SET prefs_json = excluded.prefs_json
            "#,
            params![user_id.as_str(), json],
        )?;

        debug!(user_id = %user_id, default_time = %prefs.default_time, "Preferences saved");
        Ok(())
    }

    fn record_dose_taken(&self, id: &MedicationId, at: DateTime<Local>) -> StoreResult<()> {
        self.record_history(id, HISTORY_DOSE, at)
    }

    fn record_refill(&self, id: &MedicationId, at: DateTime<Local>) -> StoreResult<()> {
        self.record_history(id, HISTORY_REFILL, at)
    }

    fn dose_history(&self, id: &MedicationId, limit: usize) -> StoreResult<Vec<DateTime<Local>>> {
        self.history(id, HISTORY_DOSE, limit)
    }

    fn refill_history(
        &self,
        id: &MedicationId,
        limit: usize,
    ) -> StoreResult<Vec<DateTime<Local>>> {
        self.history(id, HISTORY_REFILL, limit)
    }

    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.lock()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Local))
                .unwrap_or_else(|_| medminder_util::now());
            let event: crate::AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
