//! MySQL catalog introspection through `INFORMATION_SCHEMA`.

use ksql_core::ddl::{DdlDialect, MySqlDialect};
use ksql_core::schema::{
    ColumnDescriptor, IndexMeta, KeyRole, SchemaOptions, TableDescriptor, BOOKKEEPING_TABLE,
};
use sqlx::AnyPool;
use tracing::{debug, warn};

use super::{BoxFuture, Driver};
use crate::error::Result;

// Text columns are cast to CHAR and numbers to SIGNED so that every value
// decodes through the Any driver as a string or an i64.

const TABLES_SQL: &str = "SELECT CAST(TABLE_NAME AS CHAR), CAST(IFNULL(ENGINE, '') AS CHAR), \
     CAST(IFNULL(TABLE_COLLATION, '') AS CHAR), CAST(IFNULL(TABLE_COMMENT, '') AS CHAR) \
     FROM INFORMATION_SCHEMA.TABLES \
     WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE' AND TABLE_NAME <> ? \
     ORDER BY TABLE_NAME";

const COLUMNS_SQL: &str = "SELECT CAST(COLUMN_NAME AS CHAR), CAST(DATA_TYPE AS CHAR), \
     CAST(COLUMN_TYPE AS CHAR), CAST(IS_NULLABLE AS CHAR), CAST(COLUMN_DEFAULT AS CHAR), \
     CAST(CHARACTER_MAXIMUM_LENGTH AS SIGNED), CAST(NUMERIC_PRECISION AS SIGNED), \
     CAST(NUMERIC_SCALE AS SIGNED), CAST(DATETIME_PRECISION AS SIGNED), \
     CAST(COLUMN_KEY AS CHAR), CAST(EXTRA AS CHAR), CAST(COLUMN_COMMENT AS CHAR), \
     CAST(IFNULL(GENERATION_EXPRESSION, '') AS CHAR) \
     FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
     ORDER BY ORDINAL_POSITION";

const INDEXES_SQL: &str = "SELECT CAST(INDEX_NAME AS CHAR), CAST(TABLE_NAME AS CHAR), \
     CAST(NON_UNIQUE AS SIGNED), CAST(COLUMN_NAME AS CHAR), CAST(SEQ_IN_INDEX AS SIGNED), \
     CAST(INDEX_TYPE AS CHAR), CAST(INDEX_COMMENT AS CHAR) \
     FROM INFORMATION_SCHEMA.STATISTICS \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
     ORDER BY INDEX_NAME, SEQ_IN_INDEX";

const SCHEMA_SQL: &str = "SELECT CAST(DEFAULT_CHARACTER_SET_NAME AS CHAR), \
     CAST(DEFAULT_COLLATION_NAME AS CHAR) \
     FROM INFORMATION_SCHEMA.SCHEMATA WHERE SCHEMA_NAME = ?";

const TABLE_EXISTS_SQL: &str = "SELECT CAST(COUNT(*) AS SIGNED) FROM INFORMATION_SCHEMA.TABLES \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?";

type TableRow = (String, String, String, String);

type ColumnRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    String,
    String,
    String,
    String,
);

type IndexRow = (String, String, i64, Option<String>, i64, String, String);

/// MySQL and MariaDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDriver {
    dialect: MySqlDialect,
}

impl MySqlDriver {
    /// Creates the driver.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dialect: MySqlDialect::new(),
        }
    }

    async fn columns(pool: &AnyPool, db_name: &str, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let rows: Vec<ColumnRow> = sqlx::query_as(COLUMNS_SQL)
            .bind(db_name)
            .bind(table)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(column_from_row).collect())
    }

    async fn indexes(pool: &AnyPool, db_name: &str, table: &str) -> Result<Vec<IndexMeta>> {
        let rows: Vec<IndexRow> = sqlx::query_as(INDEXES_SQL)
            .bind(db_name)
            .bind(table)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(index_from_row).collect())
    }
}

fn column_from_row(row: ColumnRow) -> ColumnDescriptor {
    let (
        name,
        data_type,
        column_type,
        is_nullable,
        default,
        char_length,
        numeric_precision,
        numeric_scale,
        datetime_precision,
        column_key,
        extra,
        comment,
        generation,
    ) = row;
    ColumnDescriptor {
        name,
        data_type: data_type.to_ascii_lowercase(),
        column_type: column_type.to_ascii_lowercase(),
        nullable: is_nullable.eq_ignore_ascii_case("YES"),
        default,
        char_length,
        numeric_precision,
        numeric_scale,
        datetime_precision,
        key: KeyRole::from_column_key(&column_key),
        auto_increment: extra.to_ascii_lowercase().contains("auto_increment"),
        comment,
        extra,
        // MySQL 8 reports quotes inside the expression backslash-escaped.
        generation_expression: generation.replace("\\'", "'"),
    }
}

fn index_from_row(row: IndexRow) -> IndexMeta {
    let (index_name, table_name, non_unique, column_name, seq_in_index, index_type, comment) = row;
    // Functional indexes have no column name.
    IndexMeta::new(
        index_name,
        table_name,
        column_name.unwrap_or_default(),
        seq_in_index,
        non_unique != 0,
    )
    .index_type(index_type)
    .comment(comment)
}

impl Driver for MySqlDriver {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn dialect(&self) -> &dyn DdlDialect {
        &self.dialect
    }

    fn list_tables<'a>(
        &'a self,
        pool: &'a AnyPool,
        db_name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<TableDescriptor>>> {
        Box::pin(async move {
            let rows: Vec<TableRow> = sqlx::query_as(TABLES_SQL)
                .bind(db_name)
                .bind(BOOKKEEPING_TABLE)
                .fetch_all(pool)
                .await?;

            let mut tables = Vec::with_capacity(rows.len());
            for (name, engine, collation, comment) in rows {
                let columns = Self::columns(pool, db_name, &name).await?;
                let indexes = TableDescriptor::fold_indexes(Self::indexes(pool, db_name, &name).await?);
                debug!(
                    table = %name,
                    columns = columns.len(),
                    indexes = indexes.len(),
                    "Introspected table"
                );
                tables.push(TableDescriptor {
                    name,
                    engine,
                    collation,
                    comment,
                    columns,
                    indexes,
                });
            }
            Ok(tables)
        })
    }

    fn schema_options<'a>(
        &'a self,
        pool: &'a AnyPool,
        db_name: &'a str,
    ) -> BoxFuture<'a, Result<SchemaOptions>> {
        Box::pin(async move {
            let row: Option<(String, String)> = sqlx::query_as(SCHEMA_SQL)
                .bind(db_name)
                .fetch_optional(pool)
                .await?;
            match row {
                Some((charset, collation)) => Ok(SchemaOptions::new(charset, collation)),
                None => {
                    warn!(db = %db_name, "Schema not found in INFORMATION_SCHEMA.SCHEMATA");
                    Ok(SchemaOptions::default())
                }
            }
        })
    }

    fn table_exists<'a>(
        &'a self,
        pool: &'a AnyPool,
        db_name: &'a str,
        table: &'a str,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let (count,): (i64,) = sqlx::query_as(TABLE_EXISTS_SQL)
                .bind(db_name)
                .bind(table)
                .fetch_one(pool)
                .await?;
            Ok(count > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_rows_keep_catalog_values() {
        let column = column_from_row((
            String::from("updated_at"),
            String::from("TIMESTAMP"),
            String::from("timestamp(3)"),
            String::from("NO"),
            Some(String::from("CURRENT_TIMESTAMP(3)")),
            None,
            None,
            None,
            Some(3),
            String::new(),
            String::from("DEFAULT_GENERATED on update CURRENT_TIMESTAMP(3)"),
            String::from("last change"),
            String::new(),
        ));
        assert_eq!(column.data_type, "timestamp");
        assert!(!column.nullable);
        assert_eq!(column.datetime_precision, Some(3));
        assert_eq!(column.key, KeyRole::None);
        assert!(!column.auto_increment);
        assert_eq!(column.on_update(), Some("on update CURRENT_TIMESTAMP(3)"));
    }

    #[test]
    fn auto_increment_comes_from_extra() {
        let column = column_from_row((
            String::from("id"),
            String::from("bigint"),
            String::from("bigint unsigned"),
            String::from("NO"),
            None,
            None,
            Some(20),
            Some(0),
            None,
            String::from("PRI"),
            String::from("auto_increment"),
            String::new(),
            String::new(),
        ));
        assert!(column.auto_increment);
        assert_eq!(column.key, KeyRole::Primary);
        assert_eq!(
            MySqlDialect::new().column_definition(&column),
            "`id` bigint unsigned NOT NULL AUTO_INCREMENT"
        );
    }

    #[test]
    fn generated_columns_carry_their_expression() {
        let column = column_from_row((
            String::from("full"),
            String::from("varchar"),
            String::from("varchar(64)"),
            String::from("YES"),
            None,
            Some(64),
            None,
            None,
            None,
            String::new(),
            String::from("VIRTUAL GENERATED"),
            String::new(),
            String::from(r"concat(`first`,_utf8mb4\' \',`last`)"),
        ));
        assert!(column.is_generated());
        assert_eq!(column.generation_expression, "concat(`first`,_utf8mb4' ',`last`)");
        assert_eq!(
            MySqlDialect::new().column_definition(&column),
            "`full` varchar(64) GENERATED ALWAYS AS (concat(`first`,_utf8mb4' ',`last`)) VIRTUAL NULL"
        );
    }

    #[test]
    fn index_rows() {
        let meta = index_from_row((
            String::from("ft_body"),
            String::from("posts"),
            1,
            Some(String::from("body")),
            1,
            String::from("FULLTEXT"),
            String::new(),
        ));
        assert!(meta.non_unique);
        assert_eq!(meta.index_type, "FULLTEXT");

        let functional = index_from_row((
            String::from("ix_lower"),
            String::from("posts"),
            1,
            None,
            1,
            String::from("BTREE"),
            String::new(),
        ));
        assert_eq!(functional.column_name, "");
    }
}
