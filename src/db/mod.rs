mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use crate::models::*;
use crate::store::Store;

const FEATURE_COLUMNS: &str = "id, name, description, category, instructions, priority, status, \
     started_at, completed_at, error_message, retry_count, created_at";

/// SQLite-backed [`Store`].
///
/// Stored order is `rowid` order, i.e. insertion order.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "feature-queue")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().join("feature-queue.db"))
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }
}

impl Store for Database {
    // ============================================================
    // Feature operations
    // ============================================================

    fn select_features(&self) -> Result<Vec<Feature>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM features ORDER BY rowid",
            FEATURE_COLUMNS
        ))?;

        let features = stmt
            .query_map([], feature_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(features)
    }

    fn get_feature(&self, id: Uuid) -> Result<Option<Feature>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM features WHERE id = ?",
            FEATURE_COLUMNS
        ))?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            Ok(Some(feature_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    fn insert_feature(&self, feature: &Feature) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            &format!(
                "INSERT INTO features ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                FEATURE_COLUMNS
            ),
            rusqlite::params![
                feature.id.to_string(),
                &feature.name,
                &feature.description,
                &feature.category,
                &feature.instructions,
                feature.priority,
                feature.status.as_str(),
                feature.started_at.map(|t| t.to_rfc3339()),
                feature.completed_at.map(|t| t.to_rfc3339()),
                &feature.error_message,
                feature.retry_count,
                feature.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn update_feature(
        &self,
        id: Uuid,
        expected: Option<FeatureStatus>,
        patch: &FeaturePatch,
    ) -> Result<bool> {
        if patch.is_empty() {
            return Ok(false);
        }
        let conn = self.conn.lock().expect("database lock poisoned");

        let mut updates = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = patch.status {
            updates.push("status = ?");
            params.push(Box::new(status.as_str()));
        }
        if let Some(priority) = patch.priority {
            updates.push("priority = ?");
            params.push(Box::new(priority));
        }
        if let Some(started_at) = patch.started_at {
            updates.push("started_at = ?");
            params.push(Box::new(started_at.map(|t| t.to_rfc3339())));
        }
        if let Some(completed_at) = patch.completed_at {
            updates.push("completed_at = ?");
            params.push(Box::new(completed_at.map(|t| t.to_rfc3339())));
        }
        if let Some(ref error_message) = patch.error_message {
            updates.push("error_message = ?");
            params.push(Box::new(error_message.clone()));
        }
        if let Some(retry_count) = patch.retry_count {
            updates.push("retry_count = ?");
            params.push(Box::new(retry_count));
        }

        let mut sql = format!("UPDATE features SET {} WHERE id = ?", updates.join(", "));
        params.push(Box::new(id.to_string()));
        if let Some(status) = expected {
            sql.push_str(" AND status = ?");
            params.push(Box::new(status.as_str()));
        }

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = conn.execute(&sql, params_ref.as_slice())?;

        Ok(rows > 0)
    }

    fn delete_feature(&self, id: Uuid, expected: Option<FeatureStatus>) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = match expected {
            Some(status) => conn.execute(
                "DELETE FROM features WHERE id = ? AND status = ?",
                (id.to_string(), status.as_str()),
            )?,
            None => conn.execute("DELETE FROM features WHERE id = ?", [id.to_string()])?,
        };
        Ok(rows > 0)
    }

    // ============================================================
    // Config operations
    // ============================================================

    fn select_config(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare("SELECT key, value FROM config ORDER BY key")?;
        let entries = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn upsert_config(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT INTO config (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            (key, value, Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }

    // ============================================================
    // Log operations
    // ============================================================

    fn select_logs(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, created_at, level, message
             FROM logs ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )?;

        let entries = stmt
            .query_map([limit as i64], |row| {
                Ok(LogEntry {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    created_at: parse_datetime(row.get::<_, String>(1)?),
                    level: LogLevel::from_str(&row.get::<_, String>(2)?).unwrap_or(LogLevel::Info),
                    message: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn insert_log(&self, entry: &LogEntry) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT INTO logs (id, created_at, level, message) VALUES (?, ?, ?, ?)",
            (
                entry.id.to_string(),
                entry.created_at.to_rfc3339(),
                entry.level.as_str(),
                &entry.message,
            ),
        )?;
        Ok(())
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn feature_from_row(row: &Row<'_>) -> rusqlite::Result<Feature> {
    Ok(Feature {
        id: parse_uuid(row.get::<_, String>(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        instructions: row.get(4)?,
        priority: row.get(5)?,
        status: FeatureStatus::from_str(&row.get::<_, String>(6)?)
            .unwrap_or(FeatureStatus::Pending),
        started_at: row.get::<_, Option<String>>(7)?.map(parse_datetime),
        completed_at: row.get::<_, Option<String>>(8)?.map(parse_datetime),
        error_message: row.get(9)?,
        retry_count: row.get(10)?,
        created_at: parse_datetime(row.get::<_, String>(11)?),
    })
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
