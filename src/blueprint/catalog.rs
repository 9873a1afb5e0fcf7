//! The catalog of known feature types.
//!
//! The catalog is an explicit value built at startup and passed by
//! reference into the resolver; there is no process-wide registry. Resolution
//! only reads it, so one catalog can serve any number of concurrent queries.

use rustc_hash::FxHashMap;

use super::Blueprint;
use crate::env::IndexEnvironment;
use crate::errors::{RankError, Result};

/// Maps feature base names to blueprint prototypes.
#[derive(Default)]
pub struct BlueprintCatalog {
    prototypes: Vec<Box<dyn Blueprint>>,
    by_name: FxHashMap<String, usize>,
}

impl BlueprintCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog with every built-in feature registered.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        crate::features::register_builtins(&mut catalog)
            .expect("built-in blueprint names are unique");
        catalog
    }

    /// Register a prototype under its [`base_name`](Blueprint::base_name).
    pub fn add_prototype(&mut self, prototype: Box<dyn Blueprint>) -> Result<()> {
        let name = prototype.base_name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(RankError::invalid_config(
                name,
                "a blueprint with this name is already registered",
            ));
        }
        self.by_name.insert(name, self.prototypes.len());
        self.prototypes.push(prototype);
        Ok(())
    }

    /// A fresh instance of the blueprint registered as `base`.
    pub fn create_blueprint(&self, base: &str) -> Result<Box<dyn Blueprint>> {
        self.by_name
            .get(base)
            .map(|&idx| self.prototypes[idx].create_instance())
            .ok_or_else(|| RankError::unknown_feature(base))
    }

    pub fn contains(&self, base: &str) -> bool {
        self.by_name.contains_key(base)
    }

    /// Registered base names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.prototypes.iter().map(|p| p.base_name())
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    /// Collect the default dump features of every prototype.
    pub fn dump_features(&self, index_env: &dyn IndexEnvironment) -> Vec<String> {
        let mut out = Vec::new();
        for prototype in &self.prototypes {
            prototype.visit_dump_features(index_env, &mut out);
        }
        out
    }
}

impl std::fmt::Debug for BlueprintCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlueprintCatalog")
            .field("names", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
