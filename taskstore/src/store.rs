//! Generic persistent record store: a SQLite index over an append-only
//! JSONL log per collection.
//!
//! The JSONL log is the durable source of truth (one line per write, last
//! write for a given id wins); the SQLite table is a rebuildable cache used
//! for point lookups and filtered listing. `rebuild_indexes` replays the
//! log from scratch, so a corrupted or deleted index file never loses data.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::record::{Filter, FilterOp, IndexValue, Record};

/// A collection-agnostic store: every `Record` type gets its own SQLite
/// table and JSONL log file inside `base`, named after `collection_name()`.
pub struct Store {
    base: PathBuf,
    conn: Connection,
    _lock: File,
}

impl Store {
    /// Open (creating if absent) a store rooted at `base`. Takes an
    /// exclusive advisory lock on `<base>/.store.lock` for the process
    /// lifetime of the returned handle, matching the single-writer
    /// discipline the scheduler relies on.
    pub fn open(base: impl AsRef<Path>) -> StoreResult<Self> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        fs::create_dir_all(base.join("log"))?;

        let lock_path = base.join(".store.lock");
        let lock_file = OpenOptions::new().create(true).write(true).truncate(false).open(&lock_path)?;
        lock_file
            .try_lock_exclusive()
            .map_err(|e| StoreError::LockFailed(format!("{}: {e}", lock_path.display())))?;

        let conn = Connection::open(base.join("index.sqlite3"))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        debug!(base = %base.display(), "Store::open: opened");
        Ok(Self {
            base,
            conn,
            _lock: lock_file,
        })
    }

    fn log_path(&self, collection: &str) -> PathBuf {
        self.base.join("log").join(format!("{collection}.jsonl"))
    }

    fn ensure_table(&self, collection: &str) -> StoreResult<()> {
        self.conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS \"{collection}\" (\
                    id TEXT PRIMARY KEY, \
                    updated_at INTEGER NOT NULL, \
                    fields TEXT NOT NULL, \
                    data TEXT NOT NULL\
                )"
            ),
            [],
        )?;
        Ok(())
    }

    fn table_exists(&self, collection: &str) -> StoreResult<bool> {
        let name: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type='table' AND name = ?1",
                params![collection],
                |r| r.get(0),
            )
            .optional()?;
        Ok(name.is_some())
    }

    fn append_log<R: Record>(&self, record: &R) -> StoreResult<()> {
        let line = serde_json::to_string(record)?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(R::collection_name()))?;
        writeln!(f, "{line}")?;
        f.sync_data()?;
        Ok(())
    }

    /// Insert a brand-new record. Fails with [`StoreError::AlreadyExists`]
    /// if the id is already present in this collection.
    pub fn create<R: Record>(&mut self, record: R) -> StoreResult<String> {
        debug!(id = record.id(), collection = R::collection_name(), "Store::create: called");
        let collection = R::collection_name();
        self.ensure_table(collection)?;

        let existing: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT id FROM \"{collection}\" WHERE id = ?1"),
                params![record.id()],
                |r| r.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(StoreError::AlreadyExists(record.id().to_string()));
        }

        let fields = serde_json::to_string(&record.indexed_fields())?;
        let data = serde_json::to_string(&record)?;
        self.conn.execute(
            &format!("INSERT INTO \"{collection}\" (id, updated_at, fields, data) VALUES (?1, ?2, ?3, ?4)"),
            params![record.id(), record.updated_at(), fields, data],
        )?;
        self.append_log(&record)?;
        Ok(record.id().to_string())
    }

    /// Overwrite an existing record. Fails with [`StoreError::NotFound`] if
    /// no row with this id exists yet (use `create` for the first write).
    pub fn update<R: Record>(&mut self, record: R) -> StoreResult<()> {
        debug!(id = record.id(), collection = R::collection_name(), "Store::update: called");
        let collection = R::collection_name();
        self.ensure_table(collection)?;

        let fields = serde_json::to_string(&record.indexed_fields())?;
        let data = serde_json::to_string(&record)?;
        let changed = self.conn.execute(
            &format!("UPDATE \"{collection}\" SET updated_at = ?2, fields = ?3, data = ?4 WHERE id = ?1"),
            params![record.id(), record.updated_at(), fields, data],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(record.id().to_string()));
        }
        self.append_log(&record)?;
        Ok(())
    }

    /// Point lookup by id. Returns `Ok(None)` for a missing record or an
    /// uninitialized collection; never errors on a simple miss.
    pub fn get<R: Record>(&self, id: &str) -> StoreResult<Option<R>> {
        let collection = R::collection_name();
        if !self.table_exists(collection)? {
            return Ok(None);
        }
        let data: Option<String> = self
            .conn
            .query_row(&format!("SELECT data FROM \"{collection}\" WHERE id = ?1"), params![id], |r| {
                r.get(0)
            })
            .optional()?;
        match data {
            Some(d) => Ok(Some(serde_json::from_str(&d)?)),
            None => Ok(None),
        }
    }

    /// List every record in the collection matching all of `filters`
    /// (conjunction), ordered by `updated_at` ascending.
    pub fn list<R: Record>(&self, filters: &[Filter]) -> StoreResult<Vec<R>> {
        let collection = R::collection_name();
        if !self.table_exists(collection)? {
            return Ok(Vec::new());
        }
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT fields, data FROM \"{collection}\" ORDER BY updated_at ASC"))?;
        let rows = stmt.query_map([], |r| {
            let fields: String = r.get(0)?;
            let data: String = r.get(1)?;
            Ok((fields, data))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (fields_json, data_json) = row?;
            let fields: HashMap<String, IndexValue> = serde_json::from_str(&fields_json)?;
            if filters.iter().all(|f| matches_filter(&fields, f)) {
                out.push(serde_json::from_str(&data_json)?);
            }
        }
        Ok(out)
    }

    /// Remove a record from the index and append a tombstone to the log so
    /// a future `rebuild_indexes` does not resurrect it.
    pub fn delete<R: Record>(&mut self, id: &str) -> StoreResult<()> {
        debug!(id, collection = R::collection_name(), "Store::delete: called");
        let collection = R::collection_name();
        self.ensure_table(collection)?;
        let changed = self
            .conn
            .execute(&format!("DELETE FROM \"{collection}\" WHERE id = ?1"), params![id])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let mut f = OpenOptions::new().create(true).append(true).open(self.log_path(collection))?;
        writeln!(f, "{}", serde_json::json!({ "_tombstone": id }))?;
        Ok(())
    }

    /// Flush the WAL to the main database file. Cheap to call after a
    /// batch of writes or before process exit.
    pub fn sync(&self) -> StoreResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }

    /// Rebuild the SQLite index for `R` from its JSONL log from scratch.
    /// Returns the number of live (non-tombstoned) records afterward.
    pub fn rebuild_indexes<R: Record>(&mut self) -> StoreResult<usize> {
        let collection = R::collection_name();
        debug!(collection, "Store::rebuild_indexes: called");
        self.ensure_table(collection)?;
        self.conn.execute(&format!("DELETE FROM \"{collection}\""), [])?;

        let path = self.log_path(collection);
        if !path.exists() {
            return Ok(0);
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut latest: HashMap<String, R> = HashMap::new();
        let mut tombstoned: HashSet<String> = HashSet::new();

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(candidate) = serde_json::from_str::<serde_json::Value>(&line) {
                if let Some(id) = candidate.get("_tombstone").and_then(|v| v.as_str()) {
                    tombstoned.insert(id.to_string());
                    latest.remove(id);
                    continue;
                }
            }
            match serde_json::from_str::<R>(&line) {
                Ok(record) => {
                    tombstoned.remove(record.id());
                    latest.insert(record.id().to_string(), record);
                }
                Err(e) => {
                    warn!(collection, line = lineno + 1, error = %e, "rebuild_indexes: skipping unreadable log line");
                }
            }
        }

        let count = latest.len();
        for record in latest.into_values() {
            let fields = serde_json::to_string(&record.indexed_fields())?;
            let data = serde_json::to_string(&record)?;
            self.conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO \"{collection}\" (id, updated_at, fields, data) VALUES (?1, ?2, ?3, ?4)"
                ),
                params![record.id(), record.updated_at(), fields, data],
            )?;
        }
        Ok(count)
    }
}

fn matches_filter(fields: &HashMap<String, IndexValue>, filter: &Filter) -> bool {
    match fields.get(&filter.field) {
        None => false,
        Some(v) => compare(v, filter.op, &filter.value),
    }
}

fn compare(lhs: &IndexValue, op: FilterOp, rhs: &IndexValue) -> bool {
    use std::cmp::Ordering;
    let ord = match (lhs, rhs) {
        (IndexValue::String(a), IndexValue::String(b)) => a.cmp(b),
        (IndexValue::Int(a), IndexValue::Int(b)) => a.cmp(b),
        (IndexValue::Bool(a), IndexValue::Bool(b)) => a.cmp(b),
        _ => return matches!(op, FilterOp::Ne),
    };
    match op {
        FilterOp::Eq => ord == Ordering::Equal,
        FilterOp::Ne => ord != Ordering::Equal,
        FilterOp::Lt => ord == Ordering::Less,
        FilterOp::Le => ord != Ordering::Greater,
        FilterOp::Gt => ord == Ordering::Greater,
        FilterOp::Ge => ord != Ordering::Less,
    }
}
