//! FTS5 virtual tables mirrored from base tables by triggers.

use crate::Result;
use rusqlite::Connection;
use tracing::{debug, info};

/// One full-text table keyed by the rowid of its source table.
#[derive(Debug, Clone)]
pub struct FtsTable {
    pub table_name: &'static str,
    pub source_table: &'static str,
    pub columns: &'static [&'static str],
    pub tokenizer: &'static str,
}

pub const MODULES_FTS: FtsTable = FtsTable {
    table_name: "modules_fts",
    source_table: "modules",
    columns: &["name", "description", "readme_content"],
    tokenizer: "unicode61 remove_diacritics 1",
};

pub const FILES_FTS: FtsTable = FtsTable {
    table_name: "files_fts",
    source_table: "module_files",
    columns: &["file_name", "file_path", "content"],
    tokenizer: "unicode61 remove_diacritics 1",
};

/// Manager for FTS5 setup and maintenance.
pub struct FtsManager<'a> {
    table: &'a FtsTable,
}

impl<'a> FtsManager<'a> {
    pub fn new(table: &'a FtsTable) -> Self {
        Self { table }
    }

    fn sqlite_object_exists(&self, conn: &Connection, kind: &str, name: &str) -> Result<bool> {
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type=?1 AND name=?2",
            [kind, name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn table_exists(&self, conn: &Connection) -> Result<bool> {
        self.sqlite_object_exists(conn, "table", self.table.table_name)
    }

    pub fn triggers_exist(&self, conn: &Connection) -> Result<bool> {
        self.sqlite_object_exists(conn, "trigger", &format!("{}_ai", self.table.table_name))
    }

    /// Ensure the table and its triggers exist.
    pub fn ensure_setup(&self, conn: &Connection) -> Result<()> {
        if !self.table_exists(conn)? {
            self.create_table(conn)?;
            self.populate(conn)?;
        } else if !self.triggers_exist(conn)? {
            // Triggers were dropped; contents may be stale
            self.populate(conn)?;
        }
        self.create_triggers(conn)?;
        Ok(())
    }

    pub fn create_table(&self, conn: &Connection) -> Result<()> {
        let sql = format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS {} USING fts5({}, tokenize='{}')",
            self.table.table_name,
            self.table.columns.join(", "),
            self.table.tokenizer
        );
        conn.execute(&sql, [])?;
        info!("Created FTS5 table: {}", self.table.table_name);
        Ok(())
    }

    fn insert_statement(&self) -> String {
        let columns = self.table.columns.join(", ");
        let values = self
            .table
            .columns
            .iter()
            .map(|c| format!("NEW.{}", c))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} (rowid, {}) VALUES (NEW.id, {});",
            self.table.table_name, columns, values
        )
    }

    pub fn create_triggers(&self, conn: &Connection) -> Result<()> {
        let table = self.table.table_name;
        let source = self.table.source_table;
        let insert = self.insert_statement();

        conn.execute(
            &format!(
                "CREATE TRIGGER IF NOT EXISTS {table}_ai AFTER INSERT ON {source} BEGIN
                    {insert}
                END"
            ),
            [],
        )?;
        conn.execute(
            &format!(
                "CREATE TRIGGER IF NOT EXISTS {table}_au AFTER UPDATE ON {source} BEGIN
                    DELETE FROM {table} WHERE rowid = OLD.id;
                    {insert}
                END"
            ),
            [],
        )?;
        conn.execute(
            &format!(
                "CREATE TRIGGER IF NOT EXISTS {table}_ad AFTER DELETE ON {source} BEGIN
                    DELETE FROM {table} WHERE rowid = OLD.id;
                END"
            ),
            [],
        )?;

        debug!("Created FTS5 triggers for {}", table);
        Ok(())
    }

    /// Refill the table from its source.
    pub fn populate(&self, conn: &Connection) -> Result<()> {
        let table = self.table.table_name;
        conn.execute_batch(&format!("DELETE FROM {};", table))?;

        let columns = self.table.columns.join(", ");
        conn.execute(
            &format!(
                "INSERT INTO {} (rowid, {}) SELECT id, {} FROM {}",
                table, columns, columns, self.table.source_table
            ),
            [],
        )?;
        info!("Populated {} from {}", table, self.table.source_table);
        Ok(())
    }

    pub fn rebuild(&self, conn: &Connection) -> Result<()> {
        let table = self.table.table_name;
        conn.execute(&format!("DROP TABLE IF EXISTS {}", table), [])?;
        for suffix in ["ai", "au", "ad"] {
            conn.execute(&format!("DROP TRIGGER IF EXISTS {}_{}", table, suffix), [])?;
        }
        self.create_table(conn)?;
        self.create_triggers(conn)?;
        self.populate(conn)?;
        info!("Rebuilt FTS5 index {}", table);
        Ok(())
    }
}

/// Quote text as a single FTS5 phrase.
pub fn escape_phrase(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// OR together quoted phrases, skipping blanks.
pub fn any_phrase<'a>(phrases: impl IntoIterator<Item = &'a str>) -> String {
    phrases
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(escape_phrase)
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::ensure_schema;
    use tempfile::TempDir;

    fn create_test_db() -> (Connection, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let conn = Connection::open(temp_dir.path().join("test.db")).unwrap();
        ensure_schema(&conn).unwrap();
        (conn, temp_dir)
    }

    fn match_count(conn: &Connection, query: &str) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM modules_fts WHERE modules_fts MATCH ?1",
            [query],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_fts_setup() {
        let (conn, _temp) = create_test_db();
        let manager = FtsManager::new(&MODULES_FTS);
        assert!(!manager.table_exists(&conn).unwrap());

        manager.ensure_setup(&conn).unwrap();
        assert!(manager.table_exists(&conn).unwrap());
        assert!(manager.triggers_exist(&conn).unwrap());
    }

    #[test]
    fn test_triggers_follow_source() {
        let (conn, _temp) = create_test_db();
        FtsManager::new(&MODULES_FTS).ensure_setup(&conn).unwrap();

        conn.execute(
            "INSERT INTO modules (name, description) VALUES ('terraform-azure-redis', 'Redis cache')",
            [],
        )
        .unwrap();
        assert_eq!(match_count(&conn, "redis"), 1);

        conn.execute(
            "UPDATE modules SET description = 'Key value store' WHERE name = 'terraform-azure-redis'",
            [],
        )
        .unwrap();
        assert_eq!(match_count(&conn, "cache"), 0);
        assert_eq!(match_count(&conn, "value"), 1);

        conn.execute("DELETE FROM modules", []).unwrap();
        assert_eq!(match_count(&conn, "redis"), 0);
    }

    #[test]
    fn test_populate_existing_rows() {
        let (conn, _temp) = create_test_db();
        conn.execute(
            "INSERT INTO modules (name, description) VALUES ('terraform-azure-vnet', 'Virtual network')",
            [],
        )
        .unwrap();

        let manager = FtsManager::new(&MODULES_FTS);
        manager.ensure_setup(&conn).unwrap();
        assert_eq!(match_count(&conn, "network"), 1);

        manager.rebuild(&conn).unwrap();
        assert_eq!(match_count(&conn, "network"), 1);
    }

    #[test]
    fn test_escape_phrase() {
        assert_eq!(escape_phrase("redis"), "\"redis\"");
        assert_eq!(escape_phrase("a \"b\""), "\"a \"\"b\"\"\"");
        assert_eq!(any_phrase(["vnet", " ", "virtual network"]), "\"vnet\" OR \"virtual network\"");
    }
}
