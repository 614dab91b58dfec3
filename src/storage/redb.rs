//! redb implementation of [`RelationalStore`].
//!
//! Grounded on the teacher's `storage/redb.rs` lifecycle
//! (`create_database`/`initialize_new`/`open_existing`,
//! schema-version-mismatch detection, touch-metadata-on-reopen). The
//! teacher's own `impl StorageEngine` only covered lifecycle methods
//! (metadata/close/path); every entity read/write/list method below is
//! new code written in that file's idiom against the generalized
//! [`RelationalStore`] trait.
//!
//! # File Layout
//!
//! Opening a database at `<workspace>/context.redb` creates:
//! - `<workspace>/context.redb` - main database file
//! - `<workspace>/context.redb.lock` - advisory lock file

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ::redb::{Database, ReadableTable, ReadableTableMetadata};
use tracing::{debug, info, instrument, warn};

use super::schema::{
    category_key_index, decode_id_from_time_key, encode_time_id_key, item_index_key,
    time_range_since, time_range_start, ContextHistoryRow, ContextLinkRow, CustomDataRow,
    DatabaseMetadata, DecisionRow, EmbeddingRow, ProgressRow, SingletonContext, SystemPatternRow,
    ACTIVE_CONTEXT_HISTORY_TABLE, ACTIVE_CONTEXT_TABLE, CONTEXT_LINKS_BY_ITEM_TABLE,
    CONTEXT_LINKS_BY_TIME_TABLE, CONTEXT_LINKS_TABLE, COUNTERS_TABLE,
    CUSTOM_DATA_BY_CATEGORY_KEY_TABLE, CUSTOM_DATA_BY_CATEGORY_TABLE, CUSTOM_DATA_BY_TIME_TABLE,
    CUSTOM_DATA_TABLE, DECISIONS_BY_TIME_TABLE, DECISIONS_TABLE, EMBEDDINGS_TABLE, METADATA_TABLE,
    PRODUCT_CONTEXT_HISTORY_TABLE, PRODUCT_CONTEXT_TABLE, PROGRESS_BY_PARENT_TABLE,
    PROGRESS_BY_TIME_TABLE, PROGRESS_TABLE, SCHEMA_VERSION, SINGLETON_KEY,
    SYSTEM_PATTERNS_BY_NAME_TABLE, SYSTEM_PATTERNS_BY_TIME_TABLE, SYSTEM_PATTERNS_TABLE,
};
use super::{ContextKind, RecentActivity, RelationalStore};
use crate::config::{EmbeddingDimension, EngineConfig};
use crate::error::{ConflictError, EngineError, NotFoundError, Result, StorageError, ValidationError};
use crate::types::{JsonMap, RowId, Timestamp};

const METADATA_KEY: &str = "db_metadata";

/// redb-backed relational store for one workspace.
///
/// `Send + Sync`: redb's `Database` is internally synchronized (MVCC
/// readers, single writer); the only additional state here is the
/// cached, rarely-mutated [`DatabaseMetadata`], guarded by a `Mutex`.
pub struct RedbStore {
    db: Database,
    metadata: Mutex<DatabaseMetadata>,
    path: PathBuf,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").field("path", &self.path).finish()
    }
}

impl RedbStore {
    /// Opens the database at `path`, creating it (and stamping fresh
    /// metadata) if it does not yet exist.
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: &EngineConfig) -> Result<Self> {
        config
            .validate()
            .map_err(EngineError::Validation)?;
        let path = path.as_ref().to_path_buf();
        let is_new = !path.exists();

        let db = if is_new {
            info!("creating new workspace database");
            Database::create(&path)?
        } else {
            debug!("opening existing workspace database");
            Database::open(&path)?
        };

        let metadata = if is_new {
            Self::initialize_new(&db, config.embedding_dimension)?
        } else {
            Self::open_existing(&db, config.embedding_dimension)?
        };

        Ok(Self {
            db,
            metadata: Mutex::new(metadata),
            path,
        })
    }

    fn initialize_new(db: &Database, dimension: EmbeddingDimension) -> Result<DatabaseMetadata> {
        let metadata = DatabaseMetadata::new(dimension);
        let txn = db.begin_write()?;
        {
            let mut meta_table = txn.open_table(METADATA_TABLE)?;
            let bytes = bincode::serialize(&metadata)?;
            meta_table.insert(METADATA_KEY, bytes.as_slice())?;

            // Touching every table here ensures redb persists their
            // existence even if the workspace is closed before any
            // entity is ever written.
            txn.open_table(COUNTERS_TABLE)?;
            txn.open_table(PRODUCT_CONTEXT_TABLE)?;
            txn.open_table(ACTIVE_CONTEXT_TABLE)?;
            txn.open_table(PRODUCT_CONTEXT_HISTORY_TABLE)?;
            txn.open_table(ACTIVE_CONTEXT_HISTORY_TABLE)?;
            txn.open_table(DECISIONS_TABLE)?;
            txn.open_table(DECISIONS_BY_TIME_TABLE)?;
            txn.open_table(PROGRESS_TABLE)?;
            txn.open_table(PROGRESS_BY_TIME_TABLE)?;
            txn.open_multimap_table(PROGRESS_BY_PARENT_TABLE)?;
            txn.open_table(SYSTEM_PATTERNS_TABLE)?;
            txn.open_table(SYSTEM_PATTERNS_BY_TIME_TABLE)?;
            txn.open_table(SYSTEM_PATTERNS_BY_NAME_TABLE)?;
            txn.open_table(CUSTOM_DATA_TABLE)?;
            txn.open_table(CUSTOM_DATA_BY_TIME_TABLE)?;
            txn.open_table(CUSTOM_DATA_BY_CATEGORY_KEY_TABLE)?;
            txn.open_multimap_table(CUSTOM_DATA_BY_CATEGORY_TABLE)?;
            txn.open_table(CONTEXT_LINKS_TABLE)?;
            txn.open_table(CONTEXT_LINKS_BY_TIME_TABLE)?;
            txn.open_multimap_table(CONTEXT_LINKS_BY_ITEM_TABLE)?;
            txn.open_table(EMBEDDINGS_TABLE)?;
        }
        txn.commit()?;
        Ok(metadata)
    }

    fn open_existing(db: &Database, requested: EmbeddingDimension) -> Result<DatabaseMetadata> {
        let txn = db.begin_write()?;
        let mut metadata: DatabaseMetadata = {
            let meta_table = txn.open_table(METADATA_TABLE)?;
            let bytes = meta_table
                .get(METADATA_KEY)?
                .ok_or_else(|| EngineError::config("workspace database missing metadata row"))?;
            bincode::deserialize(bytes.value())?
        };

        if !metadata.is_compatible() {
            return Err(EngineError::Storage(StorageError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                found: metadata.schema_version,
            }));
        }
        if metadata.embedding_dimension.value() != requested.value() {
            return Err(EngineError::Validation(ValidationError::dimension_mismatch(
                requested.value(),
                metadata.embedding_dimension.value(),
            )));
        }

        metadata.touch();
        {
            let mut meta_table = txn.open_table(METADATA_TABLE)?;
            let bytes = bincode::serialize(&metadata)?;
            meta_table.insert(METADATA_KEY, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(metadata)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Allocates the next row id for `table`, persisting the updated
    /// counter in the same write transaction the caller is already
    /// holding.
    fn next_id(txn: &::redb::WriteTransaction, table: &'static str) -> Result<RowId> {
        let mut counters = txn.open_table(COUNTERS_TABLE)?;
        let current = counters.get(table)?.map(|v| v.value()).unwrap_or(0);
        let next = current
            .checked_add(1)
            .ok_or(StorageError::CounterOverflow { table })?;
        counters.insert(table, next)?;
        Ok(RowId::new(next))
    }

    fn context_tables(
        kind: ContextKind,
    ) -> (
        ::redb::TableDefinition<'static, u8, &'static [u8]>,
        ::redb::TableDefinition<'static, u64, &'static [u8]>,
    ) {
        match kind {
            ContextKind::Product => (PRODUCT_CONTEXT_TABLE, PRODUCT_CONTEXT_HISTORY_TABLE),
            ContextKind::Active => (ACTIVE_CONTEXT_TABLE, ACTIVE_CONTEXT_HISTORY_TABLE),
        }
    }
}

impl RelationalStore for RedbStore {
    fn metadata(&self) -> DatabaseMetadata {
        self.metadata.lock().expect("metadata mutex poisoned").clone()
    }

    // ---- singleton context --------------------------------------------

    #[instrument(skip(self))]
    fn get_context(&self, kind: ContextKind) -> Result<serde_json::Map<String, serde_json::Value>> {
        let (doc_table, _) = Self::context_tables(kind);
        let txn = self.db.begin_read()?;
        let table = txn.open_table(doc_table)?;
        match table.get(SINGLETON_KEY)? {
            Some(bytes) => {
                let stored: SingletonContext = bincode::deserialize(bytes.value())?;
                Ok(stored.content)
            }
            None => Ok(serde_json::Map::new()),
        }
    }

    #[instrument(skip(self, new_content))]
    fn update_context(
        &self,
        kind: ContextKind,
        new_content: serde_json::Map<String, serde_json::Value>,
        change_source: Option<String>,
    ) -> Result<()> {
        let (doc_table, history_table) = Self::context_tables(kind);
        let txn = self.db.begin_write()?;
        {
            let mut doc = txn.open_table(doc_table)?;
            // A singleton that has never been written behaves as though it
            // held `{}` (spec §3: contexts "start as `{}` on first read").
            // That pre-image is eligible for history recording exactly
            // like any other: the Python original's `_get_or_create`
            // inserts the `{}` row before the first update ever runs, so
            // the first real write is itself an UPDATE that fires the
            // history hook.
            let old_content = match doc.get(SINGLETON_KEY)? {
                Some(bytes) => {
                    let stored: SingletonContext = bincode::deserialize(bytes.value())?;
                    stored.content
                }
                None => serde_json::Map::new(),
            };

            if old_content != new_content {
                let mut history = txn.open_table(history_table)?;
                let latest_version = history
                    .iter()?
                    .next_back()
                    .transpose()?
                    .map(|(_, v)| {
                        let row: ContextHistoryRow =
                            bincode::deserialize(v.value()).expect("corrupt history row");
                        row.version
                    })
                    .unwrap_or(0);
                let history_id = Self::next_id(&txn, history_table.name())?;
                let row = ContextHistoryRow {
                    id: history_id,
                    timestamp: Timestamp::now(),
                    version: latest_version + 1,
                    content: old_content,
                    change_source,
                };
                let bytes = bincode::serialize(&row)?;
                history.insert(history_id.get(), bytes.as_slice())?;
                debug!(version = row.version, "recorded context history row");
            }

            let stored = SingletonContext { content: new_content };
            let bytes = bincode::serialize(&stored)?;
            doc.insert(SINGLETON_KEY, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn list_context_history(
        &self,
        kind: ContextKind,
        limit: Option<usize>,
        version: Option<u64>,
    ) -> Result<Vec<ContextHistoryRow>> {
        let (_, history_table) = Self::context_tables(kind);
        let txn = self.db.begin_read()?;
        let table = txn.open_table(history_table)?;
        let mut rows: Vec<ContextHistoryRow> = table
            .iter()?
            .rev()
            .map(|entry| {
                let (_, v) = entry?;
                Ok::<_, EngineError>(bincode::deserialize(v.value())?)
            })
            .collect::<Result<_>>()?;
        if let Some(version) = version {
            rows.retain(|row| row.version == version);
        }
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    /// Resolves the document's content as of `version`, or the live
    /// content when `version` is `None`.
    ///
    /// A history row's `content` is the *pre*-mutation value (spec §3),
    /// so the row stamped `version = v` holds the document as it stood
    /// **before** change `v`, i.e. as it stood right after change `v -
    /// 1`. The document as it stood right after change `v` is therefore
    /// the next row's content (`version = v + 1`) — or, if `v` is the
    /// most recent change recorded, there is no later row to hold it and
    /// it is simply the live document.
    #[instrument(skip(self))]
    fn get_context_version(
        &self,
        kind: ContextKind,
        version: Option<u64>,
    ) -> Result<serde_json::Map<String, serde_json::Value>> {
        match version {
            None => self.get_context(kind),
            Some(version) => {
                let (_, history_table) = Self::context_tables(kind);
                let txn = self.db.begin_read()?;
                let table = txn.open_table(history_table)?;
                let mut max_version = 0u64;
                let mut post_image = None;
                for entry in table.iter()? {
                    let (_, v) = entry?;
                    let row: ContextHistoryRow = bincode::deserialize(v.value())?;
                    max_version = max_version.max(row.version);
                    if row.version == version + 1 {
                        post_image = Some(row.content);
                    }
                }
                if let Some(content) = post_image {
                    return Ok(content);
                }
                if max_version > 0 && version == max_version {
                    return self.get_context(kind);
                }
                Err(EngineError::NotFound(NotFoundError::entity(
                    kind.as_str(),
                    version.to_string(),
                    self.path.display().to_string(),
                )))
            }
        }
    }

    // ---- decisions -----------------------------------------------------

    #[instrument(skip(self, summary, rationale, implementation_details, tags))]
    fn create_decision(
        &self,
        summary: String,
        rationale: Option<String>,
        implementation_details: Option<String>,
        tags: Vec<String>,
    ) -> Result<DecisionRow> {
        let txn = self.db.begin_write()?;
        let id = Self::next_id(&txn, "decisions")?;
        let row = DecisionRow {
            id,
            timestamp: Timestamp::now(),
            summary,
            rationale,
            implementation_details,
            tags,
        };
        {
            let mut table = txn.open_table(DECISIONS_TABLE)?;
            let bytes = bincode::serialize(&row)?;
            table.insert(id.get(), bytes.as_slice())?;
            let mut by_time = txn.open_table(DECISIONS_BY_TIME_TABLE)?;
            let key = encode_time_id_key(row.timestamp, id);
            by_time.insert(&key, &id.to_be_bytes())?;
        }
        txn.commit()?;
        info!(id = id.get(), "created decision");
        Ok(row)
    }

    fn get_decision(&self, id: RowId) -> Result<DecisionRow> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DECISIONS_TABLE)?;
        let bytes = table
            .get(id.get())?
            .ok_or_else(|| NotFoundError::entity("decision", id.to_string(), self.path.display().to_string()))?;
        Ok(bincode::deserialize(bytes.value())?)
    }

    fn delete_decision(&self, id: RowId) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DECISIONS_TABLE)?;
            let existing = table
                .remove(id.get())?
                .ok_or_else(|| NotFoundError::entity("decision", id.to_string(), self.path.display().to_string()))?;
            let row: DecisionRow = bincode::deserialize(existing.value())?;
            let mut by_time = txn.open_table(DECISIONS_BY_TIME_TABLE)?;
            by_time.remove(&encode_time_id_key(row.timestamp, id))?;
        }
        txn.commit()?;
        Ok(())
    }

    fn list_decisions(
        &self,
        limit: Option<usize>,
        tags_filter: Option<&[String]>,
    ) -> Result<Vec<DecisionRow>> {
        let txn = self.db.begin_read()?;
        let by_time = txn.open_table(DECISIONS_BY_TIME_TABLE)?;
        let table = txn.open_table(DECISIONS_TABLE)?;
        let mut out = Vec::new();
        for entry in by_time.iter()?.rev() {
            let (_, id_bytes) = entry?;
            let id = RowId::from_be_bytes(*id_bytes.value());
            let Some(bytes) = table.get(id.get())? else {
                continue;
            };
            let row: DecisionRow = bincode::deserialize(bytes.value())?;
            if let Some(tags) = tags_filter {
                if !tags.iter().all(|t| row.tags.contains(t)) {
                    continue;
                }
            }
            out.push(row);
            if let Some(limit) = limit {
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    // ---- progress entries -----------------------------------------------

    #[instrument(skip(self, status, description))]
    fn create_progress(
        &self,
        status: String,
        description: String,
        parent_id: Option<RowId>,
    ) -> Result<ProgressRow> {
        let txn = self.db.begin_write()?;
        if let Some(parent_id) = parent_id {
            let table = txn.open_table(PROGRESS_TABLE)?;
            if table.get(parent_id.get())?.is_none() {
                return Err(NotFoundError::entity(
                    "progress_entry",
                    parent_id.to_string(),
                    self.path.display().to_string(),
                )
                .into());
            }
        }
        let id = Self::next_id(&txn, "progress")?;
        let row = ProgressRow {
            id,
            timestamp: Timestamp::now(),
            status,
            description,
            parent_id,
        };
        {
            let mut table = txn.open_table(PROGRESS_TABLE)?;
            let bytes = bincode::serialize(&row)?;
            table.insert(id.get(), bytes.as_slice())?;
            let mut by_time = txn.open_table(PROGRESS_BY_TIME_TABLE)?;
            by_time.insert(&encode_time_id_key(row.timestamp, id), &id.to_be_bytes())?;
            if let Some(parent_id) = parent_id {
                let mut by_parent = txn.open_multimap_table(PROGRESS_BY_PARENT_TABLE)?;
                by_parent.insert(parent_id.get(), id.get())?;
            }
        }
        txn.commit()?;
        Ok(row)
    }

    fn get_progress(&self, id: RowId) -> Result<ProgressRow> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(PROGRESS_TABLE)?;
        let bytes = table.get(id.get())?.ok_or_else(|| {
            NotFoundError::entity("progress_entry", id.to_string(), self.path.display().to_string())
        })?;
        Ok(bincode::deserialize(bytes.value())?)
    }

    #[instrument(skip(self, status, description))]
    fn update_progress(
        &self,
        id: RowId,
        status: Option<String>,
        description: Option<String>,
        parent_id: Option<Option<RowId>>,
    ) -> Result<ProgressRow> {
        let txn = self.db.begin_write()?;
        let mut row: ProgressRow = {
            let table = txn.open_table(PROGRESS_TABLE)?;
            let bytes = table.get(id.get())?.ok_or_else(|| {
                NotFoundError::entity("progress_entry", id.to_string(), self.path.display().to_string())
            })?;
            bincode::deserialize(bytes.value())?
        };

        if let Some(status) = status {
            row.status = status;
        }
        if let Some(description) = description {
            row.description = description;
        }
        if let Some(new_parent) = parent_id {
            let mut by_parent = txn.open_multimap_table(PROGRESS_BY_PARENT_TABLE)?;
            if let Some(old_parent) = row.parent_id {
                by_parent.remove(old_parent.get(), id.get())?;
            }
            if let Some(new_parent_id) = new_parent {
                by_parent.insert(new_parent_id.get(), id.get())?;
            }
            row.parent_id = new_parent;
        }

        {
            let mut table = txn.open_table(PROGRESS_TABLE)?;
            let bytes = bincode::serialize(&row)?;
            table.insert(id.get(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(row)
    }

    fn delete_progress(&self, id: RowId) -> Result<Vec<RowId>> {
        let txn = self.db.begin_write()?;
        let mut deleted = Vec::new();
        {
            let mut table = txn.open_table(PROGRESS_TABLE)?;
            let mut by_time = txn.open_table(PROGRESS_BY_TIME_TABLE)?;
            let mut by_parent = txn.open_multimap_table(PROGRESS_BY_PARENT_TABLE)?;

            // Root must exist; its descendants are discovered and removed
            // breadth-first as we go (cascade-delete, per spec §4.5).
            if table.get(id.get())?.is_none() {
                return Err(NotFoundError::entity(
                    "progress_entry",
                    id.to_string(),
                    self.path.display().to_string(),
                )
                .into());
            }

            let mut queue = vec![id];
            while let Some(current) = queue.pop() {
                let children: Vec<u64> = by_parent
                    .get(current.get())?
                    .map(|v| v.map(|g| g.value()))
                    .collect::<std::result::Result<_, _>>()?;
                by_parent.remove_all(current.get())?;
                queue.extend(children.into_iter().map(RowId::new));

                let existing = table.remove(current.get())?.ok_or_else(|| {
                    NotFoundError::entity(
                        "progress_entry",
                        current.to_string(),
                        self.path.display().to_string(),
                    )
                })?;
                let row: ProgressRow = bincode::deserialize(existing.value())?;
                by_time.remove(&encode_time_id_key(row.timestamp, current))?;
                if let Some(parent_id) = row.parent_id {
                    by_parent.remove(parent_id.get(), current.get())?;
                }
                deleted.push(current);
            }
        }
        txn.commit()?;
        Ok(deleted)
    }

    fn list_progress(
        &self,
        limit: Option<usize>,
        status_filter: Option<&str>,
        parent_id_filter: Option<RowId>,
    ) -> Result<Vec<ProgressRow>> {
        let txn = self.db.begin_read()?;
        let by_time = txn.open_table(PROGRESS_BY_TIME_TABLE)?;
        let table = txn.open_table(PROGRESS_TABLE)?;
        let mut out = Vec::new();
        for entry in by_time.iter()?.rev() {
            let (_, id_bytes) = entry?;
            let id = RowId::from_be_bytes(*id_bytes.value());
            let Some(bytes) = table.get(id.get())? else {
                continue;
            };
            let row: ProgressRow = bincode::deserialize(bytes.value())?;
            if let Some(status) = status_filter {
                if row.status != status {
                    continue;
                }
            }
            if let Some(parent) = parent_id_filter {
                if row.parent_id != Some(parent) {
                    continue;
                }
            }
            out.push(row);
            if let Some(limit) = limit {
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    // ---- system patterns -----------------------------------------------

    #[instrument(skip(self, name, description, tags))]
    fn create_system_pattern(
        &self,
        name: String,
        description: Option<String>,
        tags: Vec<String>,
    ) -> Result<SystemPatternRow> {
        let txn = self.db.begin_write()?;
        {
            let by_name = txn.open_table(SYSTEM_PATTERNS_BY_NAME_TABLE)?;
            if by_name.get(name.as_str())?.is_some() {
                return Err(ConflictError::duplicate(
                    "system_pattern",
                    "name",
                    name,
                    self.path.display().to_string(),
                )
                .into());
            }
        }
        let id = Self::next_id(&txn, "system_patterns")?;
        let row = SystemPatternRow {
            id,
            timestamp: Timestamp::now(),
            name: name.clone(),
            description,
            tags,
        };
        {
            let mut table = txn.open_table(SYSTEM_PATTERNS_TABLE)?;
            let bytes = bincode::serialize(&row)?;
            table.insert(id.get(), bytes.as_slice())?;
            let mut by_time = txn.open_table(SYSTEM_PATTERNS_BY_TIME_TABLE)?;
            by_time.insert(&encode_time_id_key(row.timestamp, id), &id.to_be_bytes())?;
            let mut by_name = txn.open_table(SYSTEM_PATTERNS_BY_NAME_TABLE)?;
            by_name.insert(name.as_str(), id.get())?;
        }
        txn.commit()?;
        Ok(row)
    }

    fn get_system_pattern(&self, id: RowId) -> Result<SystemPatternRow> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SYSTEM_PATTERNS_TABLE)?;
        let bytes = table.get(id.get())?.ok_or_else(|| {
            NotFoundError::entity("system_pattern", id.to_string(), self.path.display().to_string())
        })?;
        Ok(bincode::deserialize(bytes.value())?)
    }

    fn delete_system_pattern(&self, id: RowId) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SYSTEM_PATTERNS_TABLE)?;
            let existing = table.remove(id.get())?.ok_or_else(|| {
                NotFoundError::entity("system_pattern", id.to_string(), self.path.display().to_string())
            })?;
            let row: SystemPatternRow = bincode::deserialize(existing.value())?;
            let mut by_time = txn.open_table(SYSTEM_PATTERNS_BY_TIME_TABLE)?;
            by_time.remove(&encode_time_id_key(row.timestamp, id))?;
            let mut by_name = txn.open_table(SYSTEM_PATTERNS_BY_NAME_TABLE)?;
            by_name.remove(row.name.as_str())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn list_system_patterns(&self, limit: Option<usize>) -> Result<Vec<SystemPatternRow>> {
        let txn = self.db.begin_read()?;
        let by_time = txn.open_table(SYSTEM_PATTERNS_BY_TIME_TABLE)?;
        let table = txn.open_table(SYSTEM_PATTERNS_TABLE)?;
        let mut out = Vec::new();
        for entry in by_time.iter()?.rev() {
            let (_, id_bytes) = entry?;
            let id = RowId::from_be_bytes(*id_bytes.value());
            if let Some(bytes) = table.get(id.get())? {
                out.push(bincode::deserialize(bytes.value())?);
            }
            if let Some(limit) = limit {
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    // ---- custom data -----------------------------------------------------

    #[instrument(skip(self, category, key, value))]
    fn upsert_custom_data(
        &self,
        category: String,
        key: String,
        value: serde_json::Value,
    ) -> Result<CustomDataRow> {
        let txn = self.db.begin_write()?;
        let index_key = category_key_index(&category, &key);
        let existing_id = {
            let by_cat_key = txn.open_table(CUSTOM_DATA_BY_CATEGORY_KEY_TABLE)?;
            by_cat_key.get(index_key.as_str())?.map(|v| v.value())
        };

        let (id, is_new) = match existing_id {
            Some(id) => (RowId::new(id), false),
            None => (Self::next_id(&txn, "custom_data")?, true),
        };

        let row = CustomDataRow {
            id,
            timestamp: Timestamp::now(),
            category: category.clone(),
            key: key.clone(),
            value,
        };
        {
            let mut table = txn.open_table(CUSTOM_DATA_TABLE)?;
            let bytes = bincode::serialize(&row)?;
            table.insert(id.get(), bytes.as_slice())?;
            if is_new {
                let mut by_time = txn.open_table(CUSTOM_DATA_BY_TIME_TABLE)?;
                by_time.insert(&encode_time_id_key(row.timestamp, id), &id.to_be_bytes())?;
                let mut by_cat_key = txn.open_table(CUSTOM_DATA_BY_CATEGORY_KEY_TABLE)?;
                by_cat_key.insert(index_key.as_str(), id.get())?;
                let mut by_cat = txn.open_multimap_table(CUSTOM_DATA_BY_CATEGORY_TABLE)?;
                by_cat.insert(category.as_str(), id.get())?;
            }
        }
        txn.commit()?;
        Ok(row)
    }

    fn get_custom_data(&self, category: &str, key: &str) -> Result<CustomDataRow> {
        let txn = self.db.begin_read()?;
        let by_cat_key = txn.open_table(CUSTOM_DATA_BY_CATEGORY_KEY_TABLE)?;
        let index_key = category_key_index(category, key);
        let id = by_cat_key.get(index_key.as_str())?.map(|v| v.value()).ok_or_else(|| {
            NotFoundError::entity("custom_data", index_key.clone(), self.path.display().to_string())
        })?;
        let table = txn.open_table(CUSTOM_DATA_TABLE)?;
        let bytes = table.get(id)?.ok_or_else(|| {
            NotFoundError::entity("custom_data", index_key, self.path.display().to_string())
        })?;
        Ok(bincode::deserialize(bytes.value())?)
    }

    fn delete_custom_data(&self, category: &str, key: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        let index_key = category_key_index(category, key);
        {
            let mut by_cat_key = txn.open_table(CUSTOM_DATA_BY_CATEGORY_KEY_TABLE)?;
            let id = by_cat_key.remove(index_key.as_str())?.map(|v| v.value()).ok_or_else(|| {
                NotFoundError::entity("custom_data", index_key.clone(), self.path.display().to_string())
            })?;
            let mut table = txn.open_table(CUSTOM_DATA_TABLE)?;
            if let Some(existing) = table.remove(id)? {
                let row: CustomDataRow = bincode::deserialize(existing.value())?;
                let mut by_time = txn.open_table(CUSTOM_DATA_BY_TIME_TABLE)?;
                by_time.remove(&encode_time_id_key(row.timestamp, RowId::new(id)))?;
                let mut by_cat = txn.open_multimap_table(CUSTOM_DATA_BY_CATEGORY_TABLE)?;
                by_cat.remove(row.category.as_str(), id)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    fn list_custom_data(&self, category_filter: Option<&str>) -> Result<Vec<CustomDataRow>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(CUSTOM_DATA_TABLE)?;
        let mut out = Vec::new();
        match category_filter {
            Some(category) => {
                let by_cat = txn.open_multimap_table(CUSTOM_DATA_BY_CATEGORY_TABLE)?;
                for entry in by_cat.get(category)? {
                    let id = entry?.value();
                    if let Some(bytes) = table.get(id)? {
                        out.push(bincode::deserialize(bytes.value())?);
                    }
                }
            }
            None => {
                let by_time = txn.open_table(CUSTOM_DATA_BY_TIME_TABLE)?;
                for entry in by_time.iter()?.rev() {
                    let (_, id_bytes) = entry?;
                    let id = RowId::from_be_bytes(*id_bytes.value());
                    if let Some(bytes) = table.get(id.get())? {
                        out.push(bincode::deserialize(bytes.value())?);
                    }
                }
            }
        }
        Ok(out)
    }

    // ---- context links -----------------------------------------------------

    #[instrument(skip(self, description))]
    fn create_link(
        &self,
        source_item_type: String,
        source_item_id: String,
        target_item_type: String,
        target_item_id: String,
        relationship_type: String,
        description: Option<String>,
    ) -> Result<ContextLinkRow> {
        let txn = self.db.begin_write()?;
        let id = Self::next_id(&txn, "context_links")?;
        let row = ContextLinkRow {
            id,
            timestamp: Timestamp::now(),
            source_item_type,
            source_item_id,
            target_item_type,
            target_item_id,
            relationship_type,
            description,
        };
        {
            let mut table = txn.open_table(CONTEXT_LINKS_TABLE)?;
            let bytes = bincode::serialize(&row)?;
            table.insert(id.get(), bytes.as_slice())?;
            let mut by_time = txn.open_table(CONTEXT_LINKS_BY_TIME_TABLE)?;
            by_time.insert(&encode_time_id_key(row.timestamp, id), &id.to_be_bytes())?;
            let mut by_item = txn.open_multimap_table(CONTEXT_LINKS_BY_ITEM_TABLE)?;
            by_item.insert(item_index_key(&row.source_item_type, &row.source_item_id).as_str(), id.get())?;
            by_item.insert(item_index_key(&row.target_item_type, &row.target_item_id).as_str(), id.get())?;
        }
        txn.commit()?;
        Ok(row)
    }

    fn get_link(&self, id: RowId) -> Result<ContextLinkRow> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(CONTEXT_LINKS_TABLE)?;
        let bytes = table.get(id.get())?.ok_or_else(|| {
            NotFoundError::entity("context_link", id.to_string(), self.path.display().to_string())
        })?;
        Ok(bincode::deserialize(bytes.value())?)
    }

    fn delete_link(&self, id: RowId) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(CONTEXT_LINKS_TABLE)?;
            let existing = table.remove(id.get())?.ok_or_else(|| {
                NotFoundError::entity("context_link", id.to_string(), self.path.display().to_string())
            })?;
            let row: ContextLinkRow = bincode::deserialize(existing.value())?;
            let mut by_time = txn.open_table(CONTEXT_LINKS_BY_TIME_TABLE)?;
            by_time.remove(&encode_time_id_key(row.timestamp, id))?;
            let mut by_item = txn.open_multimap_table(CONTEXT_LINKS_BY_ITEM_TABLE)?;
            by_item.remove(item_index_key(&row.source_item_type, &row.source_item_id).as_str(), id.get())?;
            by_item.remove(item_index_key(&row.target_item_type, &row.target_item_id).as_str(), id.get())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn list_links_for_item(
        &self,
        item_type: &str,
        item_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ContextLinkRow>> {
        let txn = self.db.begin_read()?;
        let by_item = txn.open_multimap_table(CONTEXT_LINKS_BY_ITEM_TABLE)?;
        let table = txn.open_table(CONTEXT_LINKS_TABLE)?;
        let key = item_index_key(item_type, item_id);
        let mut out = Vec::new();
        for entry in by_item.get(key.as_str())? {
            let id = entry?.value();
            if let Some(bytes) = table.get(id)? {
                out.push(bincode::deserialize(bytes.value())?);
            }
            if let Some(limit) = limit {
                if out.len() >= limit {
                    break;
                }
            }
        }
        out.sort_by(|a: &ContextLinkRow, b: &ContextLinkRow| b.timestamp.cmp(&a.timestamp));
        Ok(out)
    }

    // ---- recent activity -----------------------------------------------------

    #[instrument(skip(self))]
    fn recent_activity(&self, since: Option<Timestamp>, limit: usize) -> Result<RecentActivity> {
        let start_key = since
            .map(time_range_since)
            .unwrap_or_else(time_range_start);

        let txn = self.db.begin_read()?;

        let decisions = {
            let by_time = txn.open_table(DECISIONS_BY_TIME_TABLE)?;
            let table = txn.open_table(DECISIONS_TABLE)?;
            let mut out = Vec::new();
            for entry in by_time.range(start_key..)?.rev() {
                let (_, id_bytes) = entry?;
                let id = RowId::from_be_bytes(*id_bytes.value());
                if let Some(bytes) = table.get(id.get())? {
                    out.push(bincode::deserialize::<DecisionRow>(bytes.value())?);
                }
                if out.len() >= limit {
                    break;
                }
            }
            out
        };

        let progress = {
            let by_time = txn.open_table(PROGRESS_BY_TIME_TABLE)?;
            let table = txn.open_table(PROGRESS_TABLE)?;
            let mut out = Vec::new();
            for entry in by_time.range(start_key..)?.rev() {
                let (_, id_bytes) = entry?;
                let id = RowId::from_be_bytes(*id_bytes.value());
                if let Some(bytes) = table.get(id.get())? {
                    out.push(bincode::deserialize::<ProgressRow>(bytes.value())?);
                }
                if out.len() >= limit {
                    break;
                }
            }
            out
        };

        let system_patterns = {
            let by_time = txn.open_table(SYSTEM_PATTERNS_BY_TIME_TABLE)?;
            let table = txn.open_table(SYSTEM_PATTERNS_TABLE)?;
            let mut out = Vec::new();
            for entry in by_time.range(start_key..)?.rev() {
                let (_, id_bytes) = entry?;
                let id = RowId::from_be_bytes(*id_bytes.value());
                if let Some(bytes) = table.get(id.get())? {
                    out.push(bincode::deserialize::<SystemPatternRow>(bytes.value())?);
                }
                if out.len() >= limit {
                    break;
                }
            }
            out
        };

        Ok(RecentActivity {
            decisions,
            progress,
            system_patterns,
        })
    }

    // ---- embeddings ------------------------------------------------------

    #[instrument(skip(self, embedding, metadata))]
    fn put_embedding(&self, item_key: &str, embedding: Vec<f32>, metadata: JsonMap) -> Result<()> {
        let row = EmbeddingRow { embedding, metadata };
        let bytes = bincode::serialize(&row)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(EMBEDDINGS_TABLE)?;
            table.insert(item_key, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete_embedding(&self, item_key: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(EMBEDDINGS_TABLE)?;
            table.remove(item_key)?;
        }
        txn.commit()?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn list_embeddings(&self) -> Result<Vec<(String, Vec<f32>, JsonMap)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(EMBEDDINGS_TABLE)?;
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (key, bytes) = entry?;
            let row: EmbeddingRow = bincode::deserialize(bytes.value())?;
            out.push((key.value().to_string(), row.embedding, row.metadata));
        }
        Ok(out)
    }
}

// redb::Database is Send + Sync; the Mutex<DatabaseMetadata> is too.
unsafe impl Send for RedbStore {}
unsafe impl Sync for RedbStore {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use tempfile::tempdir;

    fn open_store() -> (tempfile::TempDir, RedbStore) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("context.redb");
        let store = RedbStore::open(&path, &EngineConfig::default()).unwrap();
        (dir, store)
    }

    #[test]
    fn opens_new_database() {
        let (_dir, store) = open_store();
        assert_eq!(store.metadata().schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn reopen_preserves_created_at_and_touches_last_opened() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("context.redb");
        let config = EngineConfig::default();

        let store = RedbStore::open(&path, &config).unwrap();
        let created_at = store.metadata().created_at;
        drop(store);

        std::thread::sleep(std::time::Duration::from_millis(5));
        let store = RedbStore::open(&path, &config).unwrap();
        assert_eq!(store.metadata().created_at, created_at);
        assert!(store.metadata().last_opened_at > created_at);
    }

    #[test]
    fn dimension_mismatch_on_reopen_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("context.redb");
        RedbStore::open(
            &path,
            &EngineConfig {
                embedding_dimension: EmbeddingDimension::D384,
                ..Default::default()
            },
        )
        .unwrap();

        let result = RedbStore::open(
            &path,
            &EngineConfig {
                embedding_dimension: EmbeddingDimension::D768,
                ..Default::default()
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn decision_crud_roundtrip() {
        let (_dir, store) = open_store();
        let row = store
            .create_decision("use redb".into(), Some("fast".into()), None, vec!["storage".into()])
            .unwrap();
        assert_eq!(store.get_decision(row.id).unwrap().summary, "use redb");
        store.delete_decision(row.id).unwrap();
        assert!(store.get_decision(row.id).is_err());
    }

    #[test]
    fn list_decisions_is_most_recent_first() {
        let (_dir, store) = open_store();
        let first = store.create_decision("first".into(), None, None, vec![]).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = store.create_decision("second".into(), None, None, vec![]).unwrap();
        let listed = store.list_decisions(None, None).unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[test]
    fn list_decisions_tag_filter_requires_all_tags() {
        let (_dir, store) = open_store();
        store
            .create_decision("a".into(), None, None, vec!["x".into()])
            .unwrap();
        store
            .create_decision("b".into(), None, None, vec!["x".into(), "y".into()])
            .unwrap();
        let filtered = store
            .list_decisions(None, Some(&["x".to_string(), "y".to_string()]))
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].summary, "b");
    }

    #[test]
    fn system_pattern_duplicate_name_conflicts() {
        let (_dir, store) = open_store();
        store.create_system_pattern("singleton".into(), None, vec![]).unwrap();
        let err = store
            .create_system_pattern("singleton".into(), None, vec![])
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn custom_data_upsert_replaces_existing_row() {
        let (_dir, store) = open_store();
        let first = store
            .upsert_custom_data("cat".into(), "key".into(), serde_json::json!({"v": 1}))
            .unwrap();
        let second = store
            .upsert_custom_data("cat".into(), "key".into(), serde_json::json!({"v": 2}))
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.get_custom_data("cat", "key").unwrap().value["v"], 2);
        assert_eq!(store.list_custom_data(Some("cat")).unwrap().len(), 1);
    }

    #[test]
    fn progress_delete_cascades_to_children() {
        let (_dir, store) = open_store();
        let parent = store.create_progress("TODO".into(), "parent".into(), None).unwrap();
        let child = store
            .create_progress("TODO".into(), "child".into(), Some(parent.id))
            .unwrap();
        let grandchild = store
            .create_progress("TODO".into(), "grandchild".into(), Some(child.id))
            .unwrap();

        let deleted = store.delete_progress(parent.id).unwrap();
        assert_eq!(deleted.len(), 3);
        assert!(store.get_progress(parent.id).is_err());
        assert!(store.get_progress(child.id).is_err());
        assert!(store.get_progress(grandchild.id).is_err());
    }

    #[test]
    fn progress_delete_leaf_does_not_affect_siblings() {
        let (_dir, store) = open_store();
        let parent = store.create_progress("TODO".into(), "parent".into(), None).unwrap();
        let a = store.create_progress("TODO".into(), "a".into(), Some(parent.id)).unwrap();
        let b = store.create_progress("TODO".into(), "b".into(), Some(parent.id)).unwrap();

        let deleted = store.delete_progress(a.id).unwrap();
        assert_eq!(deleted, vec![a.id]);
        assert!(store.get_progress(b.id).is_ok());
        assert!(store.get_progress(parent.id).is_ok());
    }

    #[test]
    fn progress_create_rejects_missing_parent() {
        let (_dir, store) = open_store();
        let result = store.create_progress("TODO".into(), "orphan".into(), Some(RowId::new(999)));
        assert!(result.is_err());
    }

    #[test]
    fn context_update_records_history_only_on_change() {
        let (_dir, store) = open_store();
        let mut content = serde_json::Map::new();
        content.insert("k".into(), serde_json::json!("v1"));
        store
            .update_context(ContextKind::Product, content.clone(), Some("first".into()))
            .unwrap();
        assert!(store
            .list_context_history(ContextKind::Product, None, None)
            .unwrap()
            .is_empty());

        let mut content2 = serde_json::Map::new();
        content2.insert("k".into(), serde_json::json!("v2"));
        store
            .update_context(ContextKind::Product, content2, Some("second".into()))
            .unwrap();
        let history = store.list_context_history(ContextKind::Product, None, None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].version, 1);
        assert_eq!(history[0].content, content);
    }

    #[test]
    fn context_links_indexed_on_both_sides() {
        let (_dir, store) = open_store();
        let link = store
            .create_link(
                "decision".into(),
                "1".into(),
                "system_pattern".into(),
                "2".into(),
                "implements".into(),
                None,
            )
            .unwrap();
        assert_eq!(
            store.list_links_for_item("decision", "1", None).unwrap()[0].id,
            link.id
        );
        assert_eq!(
            store.list_links_for_item("system_pattern", "2", None).unwrap()[0].id,
            link.id
        );
    }

    #[test]
    fn recent_activity_filters_by_since() {
        let (_dir, store) = open_store();
        store.create_decision("old".into(), None, None, vec![]).unwrap();
        let cutoff = Timestamp::now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.create_decision("new".into(), None, None, vec![]).unwrap();

        let activity = store.recent_activity(Some(cutoff), 10).unwrap();
        assert_eq!(activity.decisions.len(), 1);
        assert_eq!(activity.decisions[0].summary, "new");
    }
}
