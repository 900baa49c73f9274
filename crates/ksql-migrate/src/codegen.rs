//! Migration unit code generation.
//!
//! Generates Rust source for a new [`SqlMigration`](crate::runner::SqlMigration)
//! unit, enabling `migplug make`-style tooling. The `up` statements come from
//! a from→to diff and the `down` statements from the reverse diff.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use ksql_core::ddl::DdlStatement;
use tracing::info;

use crate::error::Result;

/// Everything needed to render a unit source file.
#[derive(Debug, Clone)]
pub struct UnitTemplate {
    /// Unit id.
    pub id: u64,
    /// Unit name (`add_user_email`).
    pub name: String,
    /// Version the unit belongs to.
    pub version: String,
    /// Statements of the `up` action.
    pub up: Vec<DdlStatement>,
    /// Statements of the `down` action.
    pub down: Vec<DdlStatement>,
}

impl UnitTemplate {
    /// Creates an empty template.
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            version: version.into(),
            up: Vec::new(),
            down: Vec::new(),
        }
    }

    /// Sets both actions.
    #[must_use]
    pub fn statements(mut self, up: Vec<DdlStatement>, down: Vec<DdlStatement>) -> Self {
        self.up = up;
        self.down = down;
        self
    }

    /// Source file name: `m<id>_<name>.rs`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("m{}_{}.rs", self.id, snake_case(&self.name))
    }
}

/// Derives a unit id from a timestamp (`YYYYmmddHHMMSS` as a number).
#[must_use]
pub fn id_from_time(time: DateTime<Local>) -> u64 {
    time.format("%Y%m%d%H%M%S")
        .to_string()
        .parse()
        .unwrap_or_default()
}

/// Generates the Rust source of a unit constructor.
///
/// The generated function returns a `Box<dyn MigrationUnit>`, so it can be
/// passed straight to [`UnitBundle::unit`](crate::bundle::UnitBundle::unit).
/// Statements the dialect could not express are kept as comments.
#[must_use]
pub fn generate_unit_code(template: &UnitTemplate) -> String {
    let fn_name = format!("m{}_{}", template.id, snake_case(&template.name));
    let mut body = String::new();
    render_calls(&mut body, "up", &template.up);
    render_calls(&mut body, "down", &template.down);

    format!(
        "//! Migration {id}: {name} ({version}).\n\
         \n\
         use ksql_migrate::prelude::*;\n\
         \n\
         /// Builds migration {id} ({name}).\n\
         #[must_use]\n\
         pub fn {fn_name}() -> Box<dyn MigrationUnit> {{\n\
         \x20   Box::new(\n\
         \x20       SqlMigration::new({id}, {name:?}, {version:?})\n\
         {body}\
         \x20   )\n\
         }}\n",
        id = template.id,
        name = template.name,
        version = template.version,
    )
}

/// Writes the unit source into `dir`, creating the directory if needed.
pub fn write_unit_file(dir: &Path, template: &UnitTemplate) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(template.file_name());
    fs::write(&path, generate_unit_code(template))?;
    info!(path = %path.display(), id = template.id, "Migration unit generated");
    Ok(path)
}

// ================================================================
// Internal helpers
// ================================================================

fn render_calls(out: &mut String, method: &str, statements: &[DdlStatement]) {
    for statement in statements {
        if statement.is_executable() {
            let _ = writeln!(out, "            .{method}({:?})", statement.sql());
        } else {
            let _ = writeln!(out, "            // {}", statement.sql());
        }
    }
}

/// Converts a name like "Add User-Email" into "add_user_email".
fn snake_case(name: &str) -> String {
    let mut result = String::new();
    let mut pending_sep = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !result.is_empty() {
                result.push('_');
            }
            pending_sep = false;
            result.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if result.is_empty() {
        result.push_str("unit");
    }
    result
}
