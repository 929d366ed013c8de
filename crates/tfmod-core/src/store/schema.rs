//! Relational schema for the module index.

use crate::Result;
use rusqlite::Connection;
use tracing::debug;

const TABLES: &str = "
CREATE TABLE IF NOT EXISTS modules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    repo_url TEXT NOT NULL DEFAULT '',
    last_updated TEXT NOT NULL DEFAULT '',
    synced_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    readme_content TEXT NOT NULL DEFAULT '',
    has_examples INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS module_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    file_name TEXT NOT NULL,
    file_path TEXT NOT NULL,
    file_type TEXT NOT NULL,
    content TEXT NOT NULL,
    size_bytes INTEGER NOT NULL DEFAULT 0,
    UNIQUE(module_id, file_path)
);

CREATE TABLE IF NOT EXISTS module_variables (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    type TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    default_value TEXT NOT NULL DEFAULT '',
    required INTEGER NOT NULL DEFAULT 1,
    sensitive INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS module_outputs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    sensitive INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS module_resources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    resource_type TEXT NOT NULL,
    resource_name TEXT NOT NULL,
    provider TEXT NOT NULL DEFAULT '',
    source_file TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS module_data_sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    data_type TEXT NOT NULL,
    data_name TEXT NOT NULL,
    provider TEXT NOT NULL DEFAULT '',
    source_file TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS hcl_blocks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    file_path TEXT NOT NULL,
    block_type TEXT NOT NULL,
    type_label TEXT NOT NULL DEFAULT '',
    start_byte INTEGER NOT NULL,
    end_byte INTEGER NOT NULL,
    attr_paths TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS hcl_relationships (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    file_path TEXT NOT NULL,
    block_type TEXT NOT NULL,
    block_labels TEXT NOT NULL DEFAULT '',
    attribute_path TEXT NOT NULL,
    reference_type TEXT NOT NULL,
    reference_name TEXT NOT NULL,
    start_byte INTEGER NOT NULL,
    end_byte INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS module_aliases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    alias TEXT NOT NULL,
    weight INTEGER NOT NULL DEFAULT 0,
    source TEXT NOT NULL DEFAULT '',
    UNIQUE(module_id, alias)
);

CREATE TABLE IF NOT EXISTS module_tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    tag TEXT NOT NULL,
    weight INTEGER NOT NULL DEFAULT 0,
    source TEXT NOT NULL DEFAULT '',
    UNIQUE(module_id, tag)
);
";

const INDEXES: &str = "
CREATE INDEX IF NOT EXISTS idx_module_files_module ON module_files(module_id);
CREATE INDEX IF NOT EXISTS idx_module_variables_module ON module_variables(module_id);
CREATE INDEX IF NOT EXISTS idx_module_outputs_module ON module_outputs(module_id);
CREATE INDEX IF NOT EXISTS idx_module_resources_module ON module_resources(module_id);
CREATE INDEX IF NOT EXISTS idx_module_data_sources_module ON module_data_sources(module_id);
CREATE INDEX IF NOT EXISTS idx_hcl_blocks_module_file ON hcl_blocks(module_id, file_path);
CREATE INDEX IF NOT EXISTS idx_hcl_blocks_kind_label ON hcl_blocks(block_type, type_label);
CREATE INDEX IF NOT EXISTS idx_hcl_relationships_module ON hcl_relationships(module_id);
CREATE INDEX IF NOT EXISTS idx_module_aliases_alias ON module_aliases(alias);
CREATE INDEX IF NOT EXISTS idx_module_tags_tag ON module_tags(tag);
";

/// Create every base table and index.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(TABLES)?;
    conn.execute_batch(INDEXES)?;
    debug!("Ensured index schema");
    Ok(())
}

/// Tables holding rows derived from a module's files.
pub const DERIVED_TABLES: &[&str] = &[
    "module_files",
    "module_variables",
    "module_outputs",
    "module_resources",
    "module_data_sources",
    "hcl_blocks",
    "hcl_relationships",
    "module_aliases",
    "module_tags",
];
