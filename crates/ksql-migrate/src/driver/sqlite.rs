//! SQLite catalog introspection through `sqlite_master` and the pragma
//! table functions.

use ksql_core::ddl::{DdlDialect, SqliteDialect};
use ksql_core::schema::{
    ColumnDescriptor, IndexKind, IndexMeta, KeyRole, SchemaOptions, TableDescriptor,
    BOOKKEEPING_TABLE, PRIMARY_INDEX,
};
use sqlx::AnyPool;
use tracing::debug;

use super::{BoxFuture, Driver};
use crate::error::Result;

const COLUMNS_SQL: &str = "SELECT name, IFNULL(type, ''), \"notnull\", dflt_value, pk \
     FROM pragma_table_info(?, ?) ORDER BY cid";

const INDEX_LIST_SQL: &str = "SELECT name, \"unique\", origin \
     FROM pragma_index_list(?, ?) ORDER BY name";

const INDEX_INFO_SQL: &str = "SELECT seqno, name FROM pragma_index_info(?, ?) ORDER BY seqno";

type ColumnRow = (String, String, i64, Option<String>, i64);

/// SQLite.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver {
    dialect: SqliteDialect,
}

impl SqliteDriver {
    /// Creates the driver.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dialect: SqliteDialect::new(),
        }
    }

    fn master_table(&self, db_name: &str) -> String {
        format!("{}.sqlite_master", self.dialect.quote_identifier(db_name))
    }

    async fn table(pool: &AnyPool, db_name: &str, name: String, create_sql: &str) -> Result<TableDescriptor> {
        let rows: Vec<ColumnRow> = sqlx::query_as(COLUMNS_SQL)
            .bind(name.as_str())
            .bind(db_name)
            .fetch_all(pool)
            .await?;

        let mut primary: Vec<(i64, String)> = rows
            .iter()
            .filter(|(_, _, _, _, pk)| *pk > 0)
            .map(|(column, _, _, _, pk)| (*pk, column.clone()))
            .collect();
        primary.sort_unstable();
        let autoincrement = primary.len() == 1 && create_sql.to_ascii_uppercase().contains("AUTOINCREMENT");

        let mut columns: Vec<ColumnDescriptor> = rows
            .into_iter()
            .map(|(column, declared, not_null, default, pk)| {
                let mut descriptor = ColumnDescriptor::new(column, declared);
                descriptor.nullable = not_null == 0;
                descriptor.default = default.and_then(|d| normalize_default(&d));
                if pk > 0 && autoincrement {
                    descriptor = descriptor.auto_increment();
                }
                descriptor
            })
            .collect();

        let mut metas: Vec<IndexMeta> = primary
            .iter()
            .map(|(seq, column)| IndexMeta::new(PRIMARY_INDEX, name.as_str(), column.as_str(), *seq, false))
            .collect();
        metas.extend(Self::index_rows(pool, db_name, &name).await?);
        let indexes = TableDescriptor::fold_indexes(metas);

        assign_key_roles(&mut columns, indexes.values().map(|i| (i.kind(), i.columns())));

        Ok(TableDescriptor {
            name,
            columns,
            indexes,
            ..TableDescriptor::default()
        })
    }

    /// Rows of every secondary index; the primary key is synthesised from
    /// `pragma_table_info` instead.
    async fn index_rows(pool: &AnyPool, db_name: &str, table: &str) -> Result<Vec<IndexMeta>> {
        let list: Vec<(String, i64, String)> = sqlx::query_as(INDEX_LIST_SQL)
            .bind(table)
            .bind(db_name)
            .fetch_all(pool)
            .await?;

        let mut metas = Vec::new();
        for (index, unique, origin) in list {
            if origin == "pk" {
                continue;
            }
            let members: Vec<(i64, Option<String>)> = sqlx::query_as(INDEX_INFO_SQL)
                .bind(index.as_str())
                .bind(db_name)
                .fetch_all(pool)
                .await?;
            metas.extend(members.into_iter().map(|(seqno, column)| {
                IndexMeta::new(
                    index.as_str(),
                    table,
                    column.unwrap_or_default(),
                    seqno + 1,
                    unique == 0,
                )
            }));
        }
        Ok(metas)
    }
}

/// Turns a `dflt_value` (SQL text) into the stored default.
///
/// `'abc'` becomes `abc`, `NULL` becomes no default, everything else
/// (numbers, `CURRENT_TIMESTAMP`, expressions) is kept as written.
fn normalize_default(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("NULL") {
        return None;
    }
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return Some(raw[1..raw.len() - 1].replace("''", "'"));
    }
    Some(raw.to_string())
}

/// Sets MySQL-style key roles from the indexes a column leads.
fn assign_key_roles<'a>(
    columns: &mut [ColumnDescriptor],
    indexes: impl Iterator<Item = (IndexKind, Vec<&'a str>)>,
) {
    for (kind, members) in indexes {
        let role = match kind {
            IndexKind::Primary => KeyRole::Primary,
            IndexKind::Unique => KeyRole::Unique,
            _ => KeyRole::Multiple,
        };
        let targets: &[&str] = if kind == IndexKind::Primary {
            &members
        } else {
            members.get(..1).unwrap_or_default()
        };
        for column in columns.iter_mut().filter(|c| targets.contains(&c.name.as_str())) {
            // Primary beats unique beats multiple.
            let rank = |r: KeyRole| match r {
                KeyRole::Primary => 3,
                KeyRole::Unique => 2,
                KeyRole::Multiple => 1,
                KeyRole::None => 0,
            };
            if rank(role) > rank(column.key) {
                column.key = role;
            }
        }
    }
}

impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
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
            let sql = format!(
                "SELECT name, IFNULL(sql, '') FROM {} \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name <> ? \
                 ORDER BY name",
                self.master_table(db_name)
            );
            let rows: Vec<(String, String)> = sqlx::query_as(&sql)
                .bind(BOOKKEEPING_TABLE)
                .fetch_all(pool)
                .await?;

            let mut tables = Vec::with_capacity(rows.len());
            for (name, create_sql) in rows {
                let table = Self::table(pool, db_name, name, &create_sql).await?;
                debug!(
                    table = %table.name,
                    columns = table.columns.len(),
                    indexes = table.indexes.len(),
                    "Introspected table"
                );
                tables.push(table);
            }
            Ok(tables)
        })
    }

    fn schema_options<'a>(
        &'a self,
        _pool: &'a AnyPool,
        _db_name: &'a str,
    ) -> BoxFuture<'a, Result<SchemaOptions>> {
        // No schema-level charset or collation.
        let options: Result<SchemaOptions> = Ok(SchemaOptions::default());
        Box::pin(async move { options })
    }

    fn table_exists<'a>(
        &'a self,
        pool: &'a AnyPool,
        db_name: &'a str,
        table: &'a str,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT COUNT(*) FROM {} WHERE type = 'table' AND name = ?",
                self.master_table(db_name)
            );
            let (count,): (i64,) = sqlx::query_as(&sql).bind(table).fetch_one(pool).await?;
            Ok(count > 0)
        })
    }
}
