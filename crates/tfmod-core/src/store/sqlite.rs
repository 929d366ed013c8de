//! SQLite-backed [`Store`] with FTS5 search.

use super::fts::{escape_phrase, FtsManager, FILES_FTS, MODULES_FTS};
use super::schema::{ensure_schema, DERIVED_TABLES};
use super::{BlockFilter, Store};
use crate::indexer::FileIndex;
use crate::models::{
    BlockKind, BlockRecord, DataSource, FileType, Module, ModuleFile, ModuleUpsert, Output,
    Relationship, Resource, Variable, WeightedTerm,
};
use crate::{Result, TfmodError};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, warn};

const MODULE_COLUMNS: &str = "m.id, m.name, m.full_name, m.description, m.repo_url, \
     m.last_updated, m.synced_at, m.readme_content, m.has_examples";

const FILE_COLUMNS: &str =
    "f.id, f.module_id, f.file_name, f.file_path, f.file_type, f.content, f.size_bytes";

const BLOCK_COLUMNS: &str =
    "b.id, b.module_id, b.file_path, b.block_type, b.type_label, b.start_byte, b.end_byte, b.attr_paths";

const RELATIONSHIP_COLUMNS: &str = "r.id, r.module_id, r.file_path, r.block_type, r.block_labels, \
     r.attribute_path, r.reference_type, r.reference_name, r.start_byte, r.end_byte";

/// Submodules sort after top-level modules on ties.
const SUBMODULE_LAST: &str = "(instr(m.name, '//') > 0) ASC";

/// SQLite module index.
pub struct SqliteStore {
    db_path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Create or open an index at the given path.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| TfmodError::Io {
                    message: format!("Failed to create directory {}", parent.display()),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(&db_path)?;
        Self::configure_connection(&conn)?;
        ensure_schema(&conn)?;
        FtsManager::new(&MODULES_FTS).ensure_setup(&conn)?;
        FtsManager::new(&FILES_FTS).ensure_setup(&conn)?;

        debug!("Opened index at {}", db_path.display());
        Ok(Self {
            db_path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA busy_timeout=30000;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
            ",
        )?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TfmodError::lock_poisoned("connection"))
    }

    /// Drop and rebuild both full-text tables.
    pub fn rebuild_fts(&self) -> Result<()> {
        let conn = self.conn()?;
        FtsManager::new(&MODULES_FTS).rebuild(&conn)?;
        FtsManager::new(&FILES_FTS).rebuild(&conn)?;
        Ok(())
    }

    fn row_to_module(row: &Row) -> rusqlite::Result<Module> {
        Ok(Module {
            id: row.get(0)?,
            name: row.get(1)?,
            full_name: row.get(2)?,
            description: row.get(3)?,
            repo_url: row.get(4)?,
            last_updated: row.get(5)?,
            synced_at: row.get(6)?,
            readme_content: row.get(7)?,
            has_examples: row.get(8)?,
        })
    }

    fn row_to_file(row: &Row) -> rusqlite::Result<ModuleFile> {
        let file_type: String = row.get(4)?;
        Ok(ModuleFile {
            id: row.get(0)?,
            module_id: row.get(1)?,
            file_name: row.get(2)?,
            file_path: row.get(3)?,
            file_type: FileType::parse(&file_type),
            content: row.get(5)?,
            size_bytes: row.get(6)?,
        })
    }

    fn row_to_block(row: &Row) -> rusqlite::Result<Option<BlockRecord>> {
        let block_type: String = row.get(3)?;
        let Some(kind) = BlockKind::from_keyword(&block_type) else {
            return Ok(None);
        };
        Ok(Some(BlockRecord {
            id: row.get(0)?,
            module_id: row.get(1)?,
            file_path: row.get(2)?,
            block_type: kind,
            type_label: row.get(4)?,
            start_byte: row.get::<_, i64>(5)? as usize,
            end_byte: row.get::<_, i64>(6)? as usize,
            attr_paths: row.get(7)?,
        }))
    }

    fn row_to_relationship(row: &Row) -> rusqlite::Result<Relationship> {
        Ok(Relationship {
            id: row.get(0)?,
            module_id: row.get(1)?,
            file_path: row.get(2)?,
            block_type: row.get(3)?,
            block_labels: row.get(4)?,
            attribute_path: row.get(5)?,
            reference_type: row.get(6)?,
            reference_name: row.get(7)?,
            start_byte: row.get::<_, i64>(8)? as usize,
            end_byte: row.get::<_, i64>(9)? as usize,
        })
    }

    fn row_to_term(row: &Row) -> rusqlite::Result<WeightedTerm> {
        Ok(WeightedTerm {
            value: row.get(0)?,
            weight: row.get(1)?,
            source: row.get(2)?,
        })
    }

    fn query_modules(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Module>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_module)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn query_blocks_sql(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
        filter: &BlockFilter,
    ) -> Result<Vec<BlockRecord>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_block)?;

        let mut blocks = Vec::new();
        for row in rows {
            match row? {
                Some(block) if filter.matches(&block) => blocks.push(block),
                Some(_) => {}
                None => warn!("Skipping block row with unknown kind"),
            }
        }
        Ok(blocks)
    }

    /// Rows of `sql` in order, keeping those where `matches` holds and
    /// stopping after `limit` (0 is unlimited).
    fn query_relationships_sql(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
        limit: usize,
        matches: impl Fn(&Relationship) -> bool,
    ) -> Result<Vec<Relationship>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_relationship)?;

        let mut relationships = Vec::new();
        for row in rows {
            let rel = row?;
            if matches(&rel) {
                relationships.push(rel);
                if relationships.len() == limit {
                    break;
                }
            }
        }
        Ok(relationships)
    }

    fn query_terms(conn: &Connection, table: &str, column: &str, module_id: i64) -> Result<Vec<WeightedTerm>> {
        let sql = format!(
            "SELECT {column}, weight, source FROM {table} WHERE module_id = ?1 \
             ORDER BY weight DESC, {column} ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![module_id], Self::row_to_term)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn replace_terms(
        &self,
        table: &str,
        column: &str,
        module_id: i64,
        terms: &[WeightedTerm],
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(&format!("DELETE FROM {} WHERE module_id = ?1", table), params![module_id])?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {table} (module_id, {column}, weight, source) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(module_id, {column}) DO UPDATE SET
                     weight = MAX(weight, excluded.weight),
                     source = excluded.source"
            ))?;
            for term in terms {
                stmt.execute(params![module_id, term.value, term.weight, term.source])?;
            }
        }
        tx.commit()?;
        debug!("Stored {} {} rows for module {}", terms.len(), table, module_id);
        Ok(())
    }
}

/// Escape `%`, `_` and `\` for a LIKE pattern using `ESCAPE '\'`.
fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// SQLite treats a negative LIMIT as unbounded.
/// Case-insensitive substring test against an already lowercased needle.
fn contains_folded(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

fn sql_limit(limit: usize) -> i64 {
    if limit == 0 {
        -1
    } else {
        limit as i64
    }
}

impl Store for SqliteStore {
    fn upsert_module(&self, module: &ModuleUpsert) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO modules (name, full_name, description, repo_url, last_updated,
                                  readme_content, has_examples)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(name) DO UPDATE SET
                 full_name = excluded.full_name,
                 description = excluded.description,
                 repo_url = excluded.repo_url,
                 last_updated = excluded.last_updated,
                 readme_content = excluded.readme_content,
                 has_examples = excluded.has_examples,
                 synced_at = CURRENT_TIMESTAMP",
            params![
                module.name,
                module.full_name,
                module.description,
                module.repo_url,
                module.last_updated,
                module.readme_content,
                module.has_examples,
            ],
        )?;

        let id: i64 = conn.query_row(
            "SELECT id FROM modules WHERE name = ?1",
            params![module.name],
            |row| row.get(0),
        )?;
        debug!("Upserted module {} ({})", module.name, id);
        Ok(id)
    }

    fn get_module(&self, name: &str) -> Result<Option<Module>> {
        let conn = self.conn()?;
        let module = conn
            .query_row(
                &format!("SELECT {MODULE_COLUMNS} FROM modules m WHERE m.name = ?1"),
                params![name],
                Self::row_to_module,
            )
            .optional()?;
        Ok(module)
    }

    fn get_module_by_id(&self, id: i64) -> Result<Option<Module>> {
        let conn = self.conn()?;
        let module = conn
            .query_row(
                &format!("SELECT {MODULE_COLUMNS} FROM modules m WHERE m.id = ?1"),
                params![id],
                Self::row_to_module,
            )
            .optional()?;
        Ok(module)
    }

    fn list_modules(&self) -> Result<Vec<Module>> {
        let conn = self.conn()?;
        Self::query_modules(
            &conn,
            &format!("SELECT {MODULE_COLUMNS} FROM modules m ORDER BY m.name"),
            &[],
        )
    }

    fn search_modules(&self, query: &str, limit: usize) -> Result<Vec<Module>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {MODULE_COLUMNS} FROM modules m
             JOIN modules_fts ON modules_fts.rowid = m.id
             WHERE modules_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2"
        );
        match Self::query_modules(&conn, &sql, &[&escape_phrase(query), &sql_limit(limit)]) {
            Ok(modules) => Ok(modules),
            Err(e) => {
                error!("FTS5 module search failed: {}", e);
                Ok(Vec::new())
            }
        }
    }

    fn update_readme(&self, module_id: i64, readme: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE modules SET readme_content = ?1 WHERE id = ?2",
            params![readme, module_id],
        )?;
        Ok(())
    }

    fn set_has_examples(&self, module_id: i64, has_examples: bool) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE modules SET has_examples = ?1 WHERE id = ?2",
            params![has_examples, module_id],
        )?;
        Ok(())
    }

    fn clear_module_data(&self, module_id: i64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for table in DERIVED_TABLES {
            tx.execute(
                &format!("DELETE FROM {} WHERE module_id = ?1", table),
                params![module_id],
            )?;
        }
        tx.commit()?;
        debug!("Cleared data for module {}", module_id);
        Ok(())
    }

    fn delete_module(&self, module_id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM modules WHERE id = ?1", params![module_id])?;
        Ok(())
    }

    fn delete_child_modules(&self, parent_name: &str) -> Result<()> {
        let conn = self.conn()?;
        let pattern = format!("{}//%", escape_like(parent_name));
        let removed = conn.execute(
            "DELETE FROM modules WHERE name LIKE ?1 ESCAPE '\\'",
            params![pattern],
        )?;
        if removed > 0 {
            debug!("Deleted {} submodules of {}", removed, parent_name);
        }
        Ok(())
    }

    fn insert_file(&self, file: &ModuleFile) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO module_files (module_id, file_name, file_path, file_type, content, size_bytes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(module_id, file_path) DO UPDATE SET
                 file_name = excluded.file_name,
                 file_type = excluded.file_type,
                 content = excluded.content,
                 size_bytes = excluded.size_bytes",
            params![
                file.module_id,
                file.file_name,
                file.file_path,
                file.file_type.as_str(),
                file.content,
                file.size_bytes,
            ],
        )?;
        Ok(())
    }

    fn module_files(&self, module_id: i64) -> Result<Vec<ModuleFile>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {FILE_COLUMNS} FROM module_files f WHERE f.module_id = ?1 ORDER BY f.file_path"
        ))?;
        let rows = stmt.query_map(params![module_id], Self::row_to_file)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_file(&self, module_id: i64, file_path: &str) -> Result<Option<ModuleFile>> {
        let conn = self.conn()?;
        let file = conn
            .query_row(
                &format!(
                    "SELECT {FILE_COLUMNS} FROM module_files f
                     WHERE f.module_id = ?1 AND f.file_path = ?2"
                ),
                params![module_id, file_path],
                Self::row_to_file,
            )
            .optional()?;
        Ok(file)
    }

    fn search_files(&self, fts_expression: &str, limit: usize) -> Result<Vec<ModuleFile>> {
        if fts_expression.trim().is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM module_files f
             JOIN files_fts ON files_fts.rowid = f.id
             WHERE files_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2"
        );
        let result = conn.prepare(&sql).and_then(|mut stmt| {
            let rows = stmt.query_map(params![fts_expression, sql_limit(limit)], Self::row_to_file)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        });
        match result {
            Ok(files) => Ok(files),
            Err(e) => {
                error!("FTS5 file search failed: {}", e);
                Ok(Vec::new())
            }
        }
    }

    fn insert_file_index(&self, index: &FileIndex) -> Result<()> {
        if index.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO module_variables
                     (module_id, name, type, description, default_value, required, sensitive)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for v in &index.variables {
                stmt.execute(params![
                    v.module_id,
                    v.name,
                    v.var_type,
                    v.description,
                    v.default_value,
                    v.required,
                    v.sensitive
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO module_outputs (module_id, name, description, sensitive)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for o in &index.outputs {
                stmt.execute(params![o.module_id, o.name, o.description, o.sensitive])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO module_resources
                     (module_id, resource_type, resource_name, provider, source_file)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for r in &index.resources {
                stmt.execute(params![
                    r.module_id,
                    r.resource_type,
                    r.resource_name,
                    r.provider,
                    r.source_file
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO module_data_sources
                     (module_id, data_type, data_name, provider, source_file)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for d in &index.data_sources {
                stmt.execute(params![
                    d.module_id,
                    d.data_type,
                    d.data_name,
                    d.provider,
                    d.source_file
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO hcl_blocks
                     (module_id, file_path, block_type, type_label, start_byte, end_byte, attr_paths)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for b in &index.blocks {
                stmt.execute(params![
                    b.module_id,
                    b.file_path,
                    b.block_type.as_str(),
                    b.type_label,
                    b.start_byte as i64,
                    b.end_byte as i64,
                    b.attr_paths
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO hcl_relationships
                     (module_id, file_path, block_type, block_labels, attribute_path,
                      reference_type, reference_name, start_byte, end_byte)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for r in &index.relationships {
                stmt.execute(params![
                    r.module_id,
                    r.file_path,
                    r.block_type,
                    r.block_labels,
                    r.attribute_path,
                    r.reference_type,
                    r.reference_name,
                    r.start_byte as i64,
                    r.end_byte as i64
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn module_variables(&self, module_id: i64) -> Result<Vec<Variable>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, module_id, name, type, description, default_value, required, sensitive
             FROM module_variables WHERE module_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![module_id], |row| {
            Ok(Variable {
                id: row.get(0)?,
                module_id: row.get(1)?,
                name: row.get(2)?,
                var_type: row.get(3)?,
                description: row.get(4)?,
                default_value: row.get(5)?,
                required: row.get(6)?,
                sensitive: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn module_outputs(&self, module_id: i64) -> Result<Vec<Output>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, module_id, name, description, sensitive
             FROM module_outputs WHERE module_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![module_id], |row| {
            Ok(Output {
                id: row.get(0)?,
                module_id: row.get(1)?,
                name: row.get(2)?,
                description: row.get(3)?,
                sensitive: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn module_resources(&self, module_id: i64) -> Result<Vec<Resource>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, module_id, resource_type, resource_name, provider, source_file
             FROM module_resources WHERE module_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![module_id], |row| {
            Ok(Resource {
                id: row.get(0)?,
                module_id: row.get(1)?,
                resource_type: row.get(2)?,
                resource_name: row.get(3)?,
                provider: row.get(4)?,
                source_file: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn module_data_sources(&self, module_id: i64) -> Result<Vec<DataSource>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, module_id, data_type, data_name, provider, source_file
             FROM module_data_sources WHERE module_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![module_id], |row| {
            Ok(DataSource {
                id: row.get(0)?,
                module_id: row.get(1)?,
                data_type: row.get(2)?,
                data_name: row.get(3)?,
                provider: row.get(4)?,
                source_file: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn query_blocks(&self, filter: &BlockFilter) -> Result<Vec<BlockRecord>> {
        let conn = self.conn()?;
        let mut sql = format!(
            "SELECT {BLOCK_COLUMNS} FROM hcl_blocks b JOIN modules m ON m.id = b.module_id WHERE 1=1"
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(kind) = filter.kind {
            params_vec.push(Box::new(kind.as_str()));
            sql.push_str(&format!(" AND b.block_type = ?{}", params_vec.len()));
        }
        if let Some(label) = &filter.type_label {
            if filter.label_prefix {
                params_vec.push(Box::new(format!("{}%", escape_like(label))));
                sql.push_str(&format!(
                    " AND b.type_label LIKE ?{} ESCAPE '\\'",
                    params_vec.len()
                ));
            } else {
                params_vec.push(Box::new(label.clone()));
                sql.push_str(&format!(" AND b.type_label = ?{}", params_vec.len()));
            }
        }
        sql.push_str(" ORDER BY m.name, b.file_path, b.start_byte");

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        // LIKE is case-insensitive for ASCII, so the filter re-checks in memory
        Self::query_blocks_sql(&conn, &sql, &params_refs, filter)
    }

    fn module_blocks(&self, module_id: i64) -> Result<Vec<BlockRecord>> {
        let conn = self.conn()?;
        Self::query_blocks_sql(
            &conn,
            &format!(
                "SELECT {BLOCK_COLUMNS} FROM hcl_blocks b WHERE b.module_id = ?1
                 ORDER BY b.file_path, b.start_byte"
            ),
            &[&module_id],
            &BlockFilter::default(),
        )
    }

    fn block_exists(&self, module_id: i64, file_path: &str, filter: &BlockFilter) -> Result<bool> {
        let conn = self.conn()?;
        let blocks = Self::query_blocks_sql(
            &conn,
            &format!(
                "SELECT {BLOCK_COLUMNS} FROM hcl_blocks b
                 WHERE b.module_id = ?1 AND b.file_path = ?2"
            ),
            &[&module_id, &file_path],
            filter,
        )?;
        Ok(!blocks.is_empty())
    }

    fn query_relationships(
        &self,
        module_id: i64,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<Relationship>> {
        let conn = self.conn()?;
        // SQLite lower() folds ASCII only, so matching happens here
        let needle = needle.to_lowercase();
        Self::query_relationships_sql(
            &conn,
            &format!(
                "SELECT {RELATIONSHIP_COLUMNS} FROM hcl_relationships r
                 WHERE r.module_id = ?1
                 ORDER BY r.file_path, r.start_byte"
            ),
            &[&module_id],
            limit,
            |rel| {
                [
                    &rel.attribute_path,
                    &rel.reference_name,
                    &rel.block_labels,
                    &rel.block_type,
                ]
                .iter()
                .any(|field| contains_folded(field, &needle))
            },
        )
    }

    fn query_relationships_any(&self, needle: &str, limit: usize) -> Result<Vec<Relationship>> {
        let conn = self.conn()?;
        let needle = needle.to_lowercase();
        Self::query_relationships_sql(
            &conn,
            &format!(
                "SELECT {RELATIONSHIP_COLUMNS} FROM hcl_relationships r
                 JOIN modules m ON m.id = r.module_id
                 ORDER BY m.name, r.file_path, r.start_byte"
            ),
            &[],
            limit,
            |rel| {
                contains_folded(&rel.attribute_path, &needle)
                    || contains_folded(&rel.reference_name, &needle)
            },
        )
    }

    fn replace_tags(&self, module_id: i64, tags: &[WeightedTerm]) -> Result<()> {
        self.replace_terms("module_tags", "tag", module_id, tags)
    }

    fn module_tags(&self, module_id: i64) -> Result<Vec<WeightedTerm>> {
        let conn = self.conn()?;
        Self::query_terms(&conn, "module_tags", "tag", module_id)
    }

    fn replace_aliases(&self, module_id: i64, aliases: &[WeightedTerm]) -> Result<()> {
        self.replace_terms("module_aliases", "alias", module_id, aliases)
    }

    fn module_aliases(&self, module_id: i64) -> Result<Vec<WeightedTerm>> {
        let conn = self.conn()?;
        Self::query_terms(&conn, "module_aliases", "alias", module_id)
    }

    fn resolve_alias(&self, alias: &str) -> Result<Option<Module>> {
        let conn = self.conn()?;
        let module = conn
            .query_row(
                &format!(
                    "SELECT {MODULE_COLUMNS} FROM module_aliases a
                     JOIN modules m ON m.id = a.module_id
                     WHERE a.alias = ?1
                     ORDER BY a.weight DESC, {SUBMODULE_LAST}, m.name ASC
                     LIMIT 1"
                ),
                params![alias.to_lowercase()],
                Self::row_to_module,
            )
            .optional()?;
        Ok(module)
    }

    fn resolve_alias_prefix(&self, prefix: &str) -> Result<Option<Module>> {
        if prefix.is_empty() {
            return Ok(None);
        }
        let conn = self.conn()?;
        let pattern = format!("{}%", escape_like(&prefix.to_lowercase()));
        let module = conn
            .query_row(
                &format!(
                    "SELECT {MODULE_COLUMNS} FROM module_aliases a
                     JOIN modules m ON m.id = a.module_id
                     WHERE a.alias LIKE ?1 ESCAPE '\\'
                     GROUP BY m.id
                     ORDER BY MAX(a.weight) DESC, {SUBMODULE_LAST}, m.name ASC
                     LIMIT 1"
                ),
                params![pattern],
                Self::row_to_module,
            )
            .optional()?;
        Ok(module)
    }
}
