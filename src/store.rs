//! Output store for versioned statute groups
//! SQLite with FTS5 base-name search; writes are idempotent
//! replace-by-group-id, never partial updates

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{GroupMetadata, GroupedMember, Relation, StatuteGroup};

const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Namespace for deterministic group identifiers
const GROUP_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0x1f, 0x02, 0x9a, 0x5d, 0x41, 0x4c, 0x8e, 0x9a, 0x77, 0x3d, 0x10, 0xbe, 0x5a, 0xc2,
    0x41,
]);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("FTS5 not available in this build")]
    Fts5NotAvailable,
}

/// Deterministic group id: the same partition, batch, base name, and member
/// set always produce the same identifier, so repeated runs on unchanged
/// input overwrite rather than duplicate.
pub fn group_id(batch_key: &str, base_name: &str, member_record_ids: &[&str]) -> String {
    let mut ids: Vec<&str> = member_record_ids.to_vec();
    ids.sort_unstable();
    let seed = format!("{}|{}|{}", batch_key, base_name, ids.join(","));
    Uuid::new_v5(&GROUP_ID_NAMESPACE, seed.as_bytes()).to_string()
}

/// SQLite-backed group store
pub struct GroupStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl GroupStore {
    /// Open or create the store on disk
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.verify_fts5()?;
        Ok(store)
    }

    /// In-memory store for tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Self { conn, path: None };
        store.verify_fts5()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Initialize or migrate the schema
    pub fn initialize(&self) -> Result<(), StoreError> {
        let version = self.schema_version()?;
        if version < CURRENT_SCHEMA_VERSION {
            self.migrate_v1()?;
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        }
        Ok(())
    }

    fn verify_fts5(&self) -> Result<(), StoreError> {
        match self.conn.execute(
            "CREATE VIRTUAL TABLE IF NOT EXISTS _fts5_probe USING fts5(content)",
            [],
        ) {
            Ok(_) => {
                self.conn.execute("DROP TABLE IF EXISTS _fts5_probe", [])?;
                Ok(())
            }
            Err(_) => Err(StoreError::Fts5NotAvailable),
        }
    }

    fn schema_version(&self) -> Result<i32, StoreError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        let version: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match version {
            Some(v) => v
                .parse()
                .map_err(|_| StoreError::Migration("Invalid schema version".into())),
            None => Ok(0),
        }
    }

    fn set_schema_version(&self, version: i32) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES ('schema_version', ?1)",
            params![version.to_string()],
        )?;
        Ok(())
    }

    fn migrate_v1(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            -- Versioned group documents
            CREATE TABLE IF NOT EXISTS statute_groups (
                id TEXT PRIMARY KEY,
                base_name TEXT NOT NULL,
                jurisdiction TEXT NOT NULL,
                instrument_type TEXT NOT NULL,
                category TEXT,
                batch_key TEXT NOT NULL,
                version_count INTEGER NOT NULL,
                metadata_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_groups_jur_type
                ON statute_groups(jurisdiction, instrument_type);
            CREATE INDEX IF NOT EXISTS idx_groups_batch
                ON statute_groups(batch_key);

            -- Group members, ordered by version_number
            CREATE TABLE IF NOT EXISTS group_members (
                group_id TEXT NOT NULL,
                record_id TEXT NOT NULL,
                title TEXT NOT NULL,
                extracted_year INTEGER,
                is_base_version INTEGER NOT NULL,
                version_number INTEGER NOT NULL,
                relation TEXT NOT NULL,
                similarity REAL NOT NULL,
                confidence REAL NOT NULL,
                PRIMARY KEY (group_id, version_number),
                FOREIGN KEY (group_id) REFERENCES statute_groups(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_members_year ON group_members(extracted_year);
            CREATE INDEX IF NOT EXISTS idx_members_record ON group_members(record_id);

            -- FTS5 base-name search (sync'd with statute_groups via rowid)
            CREATE VIRTUAL TABLE IF NOT EXISTS group_fts USING fts5(
                base_name,
                content='statute_groups',
                tokenize='porter unicode61'
            );

            CREATE TRIGGER IF NOT EXISTS statute_groups_ai AFTER INSERT ON statute_groups BEGIN
                INSERT INTO group_fts(rowid, base_name) VALUES (new.rowid, new.base_name);
            END;

            CREATE TRIGGER IF NOT EXISTS statute_groups_ad AFTER DELETE ON statute_groups BEGIN
                INSERT INTO group_fts(group_fts, rowid, base_name)
                VALUES ('delete', old.rowid, old.base_name);
            END;

            CREATE TRIGGER IF NOT EXISTS statute_groups_au AFTER UPDATE ON statute_groups BEGIN
                INSERT INTO group_fts(group_fts, rowid, base_name)
                VALUES ('delete', old.rowid, old.base_name);
                INSERT INTO group_fts(rowid, base_name) VALUES (new.rowid, new.base_name);
            END;
            "#,
        )?;
        Ok(())
    }

    /// Write one batch's groups in a single transaction, replacing any prior
    /// rows with the same group ids
    pub fn replace_groups(&mut self, groups: &[StatuteGroup]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;

        for group in groups {
            let metadata_json = serde_json::to_string(&group.metadata)?;

            tx.execute(
                "DELETE FROM group_members WHERE group_id = ?1",
                params![group.id],
            )?;
            tx.execute("DELETE FROM statute_groups WHERE id = ?1", params![group.id])?;

            tx.execute(
                "INSERT INTO statute_groups
                    (id, base_name, jurisdiction, instrument_type, category, batch_key,
                     version_count, metadata_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    group.id,
                    group.base_name,
                    group.jurisdiction,
                    group.instrument_type,
                    group.category,
                    group.batch_key,
                    group.metadata.version_count,
                    metadata_json,
                ],
            )?;

            for member in &group.members {
                tx.execute(
                    "INSERT INTO group_members
                        (group_id, record_id, title, extracted_year, is_base_version,
                         version_number, relation, similarity, confidence)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        group.id,
                        member.record_id,
                        member.title,
                        member.extracted_year,
                        member.is_base_version,
                        member.version_number,
                        member.relation.to_string(),
                        member.similarity,
                        member.confidence,
                    ],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Lookup by group id
    pub fn get_group(&self, id: &str) -> Result<Option<StatuteGroup>, StoreError> {
        let header = self
            .conn
            .query_row(
                "SELECT id, base_name, jurisdiction, instrument_type, category, batch_key,
                        metadata_json
                 FROM statute_groups WHERE id = ?1",
                params![id],
                Self::header_from_row,
            )
            .optional()?;

        match header {
            Some(header) => Ok(Some(self.attach_members(header)?)),
            None => Ok(None),
        }
    }

    /// Lookup by (jurisdiction, instrument type)
    pub fn list_by_jurisdiction_type(
        &self,
        jurisdiction: &str,
        instrument_type: &str,
    ) -> Result<Vec<StatuteGroup>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, base_name, jurisdiction, instrument_type, category, batch_key,
                    metadata_json
             FROM statute_groups
             WHERE jurisdiction = ?1 AND instrument_type = ?2
             ORDER BY base_name",
        )?;
        let headers = stmt
            .query_map(params![jurisdiction, instrument_type], Self::header_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        headers
            .into_iter()
            .map(|h| self.attach_members(h))
            .collect()
    }

    /// Full-text search on base name
    pub fn search_base_name(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<StatuteGroup>, StoreError> {
        // Phrase query; FTS operators in user input are not interpreted
        let phrase = format!("\"{}\"", query.replace('"', " "));

        let mut stmt = self.conn.prepare(
            "SELECT g.id, g.base_name, g.jurisdiction, g.instrument_type, g.category,
                    g.batch_key, g.metadata_json
             FROM group_fts f
             JOIN statute_groups g ON g.rowid = f.rowid
             WHERE group_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;
        let headers = stmt
            .query_map(params![phrase, limit as i64], Self::header_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        headers
            .into_iter()
            .map(|h| self.attach_members(h))
            .collect()
    }

    /// Groups containing a member with the given extracted year
    pub fn find_by_member_year(&self, year: i32) -> Result<Vec<StatuteGroup>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT g.id, g.base_name, g.jurisdiction, g.instrument_type, g.category,
                    g.batch_key, g.metadata_json
             FROM group_members m
             JOIN statute_groups g ON g.id = m.group_id
             WHERE m.extracted_year = ?1
             ORDER BY g.base_name",
        )?;
        let headers = stmt
            .query_map(params![year], Self::header_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        headers
            .into_iter()
            .map(|h| self.attach_members(h))
            .collect()
    }

    /// All groups, for summaries and tests
    pub fn list_groups(&self, limit: usize) -> Result<Vec<StatuteGroup>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, base_name, jurisdiction, instrument_type, category, batch_key,
                    metadata_json
             FROM statute_groups
             ORDER BY jurisdiction, instrument_type, base_name
             LIMIT ?1",
        )?;
        let headers = stmt
            .query_map(params![limit as i64], Self::header_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        headers
            .into_iter()
            .map(|h| self.attach_members(h))
            .collect()
    }

    pub fn count_groups(&self) -> Result<i64, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM statute_groups", [], |row| row.get(0))?)
    }

    fn header_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupHeader> {
        Ok(GroupHeader {
            id: row.get(0)?,
            base_name: row.get(1)?,
            jurisdiction: row.get(2)?,
            instrument_type: row.get(3)?,
            category: row.get(4)?,
            batch_key: row.get(5)?,
            metadata_json: row.get(6)?,
        })
    }

    fn attach_members(&self, header: GroupHeader) -> Result<StatuteGroup, StoreError> {
        let metadata: GroupMetadata = serde_json::from_str(&header.metadata_json)?;

        let mut stmt = self.conn.prepare(
            "SELECT record_id, title, extracted_year, is_base_version, version_number,
                    relation, similarity, confidence
             FROM group_members
             WHERE group_id = ?1
             ORDER BY version_number",
        )?;
        let members = stmt
            .query_map(params![header.id], |row| {
                let relation: String = row.get(5)?;
                Ok(GroupedMember {
                    record_id: row.get(0)?,
                    title: row.get(1)?,
                    extracted_year: row.get(2)?,
                    is_base_version: row.get(3)?,
                    version_number: row.get(4)?,
                    relation: relation.parse().unwrap_or(Relation::Unknown),
                    similarity: row.get(6)?,
                    confidence: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StatuteGroup {
            id: header.id,
            base_name: header.base_name,
            jurisdiction: header.jurisdiction,
            instrument_type: header.instrument_type,
            category: header.category,
            batch_key: header.batch_key,
            members,
            metadata,
        })
    }
}

struct GroupHeader {
    id: String,
    base_name: String,
    jurisdiction: String,
    instrument_type: String,
    category: Option<String>,
    batch_key: String,
    metadata_json: String,
}
