//! Migration bundles.
//!
//! A bundle is a compiled-in group of migration units. Programs that embed
//! their migrations hand their bundles to [`crate::cli::run`], which loads
//! each one into a fresh [`MigrationRegistry`].

use crate::error::Result;
use crate::runner::{MigrationRegistry, MigrationUnit};

/// A group of units that registers itself into a registry.
pub trait MigrationBundle: Send + Sync {
    /// Bundle name, used in logs.
    fn name(&self) -> &str;

    /// Registers every unit of the bundle.
    fn register(&self, registry: &mut MigrationRegistry) -> Result<()>;
}

/// A bundle built from a name and a list of unit constructors.
pub struct UnitBundle {
    name: String,
    factories: Vec<fn() -> Box<dyn MigrationUnit>>,
}

impl UnitBundle {
    /// Creates an empty bundle.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factories: Vec::new(),
        }
    }

    /// Adds a unit constructor.
    #[must_use]
    pub fn unit(mut self, factory: fn() -> Box<dyn MigrationUnit>) -> Self {
        self.factories.push(factory);
        self
    }
}

impl MigrationBundle for UnitBundle {
    fn name(&self) -> &str {
        &self.name
    }

    fn register(&self, registry: &mut MigrationRegistry) -> Result<()> {
        for factory in &self.factories {
            registry.register_boxed(factory())?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for UnitBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitBundle")
            .field("name", &self.name)
            .field("units", &self.factories.len())
            .finish()
    }
}
