//! Diff output files.
//!
//! A diff file is named `ksql_diff_<YYYYmmddHHMMSS>.sql` and holds a comment
//! header followed by one statement per line:
//!
//! ```text
//! -- from: app_dev
//! -- to: app_prod
//! -- version: 0.1.0
//! -- created: 2024-05-01 10:20:30
//!
//! ALTER TABLE `t1` ADD COLUMN `age` int NULL;
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use ksql_core::ddl::DdlStatement;
use ksql_core::statement::render_inline;
use tracing::info;

use crate::error::Result;

/// Tool version written into file headers.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Header block of a diff file.
#[derive(Debug, Clone)]
pub struct DiffHeader {
    /// Database being changed.
    pub from: String,
    /// Database it should come to match.
    pub to: String,
    /// Tool version.
    pub version: String,
    /// Creation time.
    pub created: DateTime<Local>,
}

impl DiffHeader {
    /// Creates a header stamped with the current time and tool version.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            version: VERSION.to_string(),
            created: Local::now(),
        }
    }

    /// File name for this header's creation time.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("ksql_diff_{}.sql", self.created.format("%Y%m%d%H%M%S"))
    }
}

/// One line of SQL per statement; comments are written without `;`.
#[must_use]
pub fn render_statements(statements: &[DdlStatement]) -> String {
    let mut out = String::new();
    for statement in statements {
        let line = render_inline(statement);
        out.push_str(&line);
        if statement.is_executable() {
            out.push(';');
        }
        out.push('\n');
    }
    out
}

/// Full file contents: header, blank line, statements.
#[must_use]
pub fn render(header: &DiffHeader, statements: &[DdlStatement]) -> String {
    format!(
        "-- from: {}\n-- to: {}\n-- version: {}\n-- created: {}\n\n{}",
        header.from,
        header.to,
        header.version,
        header.created.format("%Y-%m-%d %H:%M:%S"),
        render_statements(statements)
    )
}

/// Writes a diff file into `dir`, creating the directory if needed.
pub fn write_sql_file(dir: &Path, header: &DiffHeader, statements: &[DdlStatement]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(header.file_name());
    fs::write(&path, render(header, statements))?;
    info!(path = %path.display(), statements = statements.len(), "Diff written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use ksql_core::ddl::DdlKind;

    use super::*;

    fn header() -> DiffHeader {
        DiffHeader {
            from: String::from("dev"),
            to: String::from("prod"),
            version: String::from("9.9.9"),
            created: Local.with_ymd_and_hms(2024, 5, 1, 10, 20, 30).unwrap(),
        }
    }

    fn statements() -> Vec<DdlStatement> {
        vec![
            DdlStatement::new(DdlKind::AlterTable, Some("t1"), "ALTER TABLE `t1` ADD COLUMN `age` int NULL"),
            DdlStatement::unsupported(Some("t1"), "cannot modify t1.name"),
            DdlStatement::new(DdlKind::DropTable, Some("t2"), "DROP TABLE `t2`"),
        ]
    }

    #[test]
    fn file_name_carries_timestamp() {
        assert_eq!(header().file_name(), "ksql_diff_20240501102030.sql");
    }

    #[test]
    fn rendered_file() {
        assert_eq!(
            render(&header(), &statements()),
            "-- from: dev\n\
             -- to: prod\n\
             -- version: 9.9.9\n\
             -- created: 2024-05-01 10:20:30\n\
             \n\
             ALTER TABLE `t1` ADD COLUMN `age` int NULL;\n\
             -- cannot modify t1.name\n\
             DROP TABLE `t2`;\n"
        );
    }

    #[test]
    fn writes_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("diffs");
        let path = write_sql_file(&nested, &header(), &statements()).unwrap();

        assert_eq!(path, nested.join("ksql_diff_20240501102030.sql"));
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().filter(|l| l.ends_with(';')).count(), 2);
    }
}
