//! Name-keyed reconciliation of resource collections.
//!
//! A [`Collection`] is the local or remote view of one category: definitions
//! keyed by their unique name, plus whether remote resources missing locally
//! should be deleted. Reconciliation runs in two passes so callers can order
//! them across categories: [`converge`] creates and updates, [`prune`]
//! deletes. Matching is by name only.

use crate::types::{Outcome, Summary};
use anyhow::Result;
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Definitions of one category, keyed by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection<T> {
    /// Delete remote resources that are not defined locally.
    #[serde(default)]
    pub delete_unmanaged: bool,
    #[serde(default = "IndexMap::new")]
    pub definitions: IndexMap<String, T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            delete_unmanaged: false,
            definitions: IndexMap::new(),
        }
    }
}

impl<T> Collection<T> {
    pub fn new(definitions: IndexMap<String, T>) -> Self {
        Self {
            delete_unmanaged: false,
            definitions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Remote operations of one category.
pub trait Reconcile {
    type Definition;

    /// Create a resource that does not exist remotely.
    fn create(&mut self, tree: &str, name: &str, local: &Self::Definition) -> Result<()>;

    /// Bring an existing resource in line; returns whether it changed.
    fn update(
        &mut self,
        tree: &str,
        name: &str,
        local: &Self::Definition,
        remote: &Self::Definition,
    ) -> Result<bool>;

    /// Delete a resource that is not defined locally.
    fn delete(&mut self, tree: &str, name: &str, remote: &Self::Definition) -> Result<()>;
}

/// Log path of one definition, e.g. `settings.tags.definitions['anime']`.
pub fn definition_tree(tree: &str, name: &str) -> String {
    format!("{tree}.definitions['{name}']")
}

/// Create or update every local definition, in definition order.
///
/// Stops at the first failure.
pub fn converge<R: Reconcile>(
    tree: &str,
    local: &Collection<R::Definition>,
    remote: &Collection<R::Definition>,
    reconciler: &mut R,
) -> Result<Summary> {
    let mut summary = Summary::default();
    for (name, definition) in &local.definitions {
        let definition_tree = definition_tree(tree, name);
        match remote.definitions.get(name) {
            None => {
                reconciler.create(&definition_tree, name, definition)?;
                summary.add(Outcome::Created);
            }
            Some(existing) => {
                let changed = reconciler.update(&definition_tree, name, definition, existing)?;
                summary.add_update(changed);
            }
        }
    }
    Ok(summary)
}

/// Delete remote definitions missing locally, if the collection allows it.
///
/// Unmanaged definitions are otherwise only reported, at warning level when
/// `check_unmanaged` is set.
pub fn prune<R: Reconcile>(
    tree: &str,
    local: &Collection<R::Definition>,
    remote: &Collection<R::Definition>,
    reconciler: &mut R,
    check_unmanaged: bool,
) -> Result<Summary> {
    let mut summary = Summary::default();
    for (name, definition) in &remote.definitions {
        if local.definitions.contains_key(name) {
            continue;
        }
        let definition_tree = definition_tree(tree, name);
        if local.delete_unmanaged {
            info!("{definition_tree}: (...) -> (deleted)");
            reconciler.delete(&definition_tree, name, definition)?;
            summary.add(Outcome::Deleted);
        } else {
            if check_unmanaged {
                warn!("{definition_tree}: (...) (unmanaged)");
            } else {
                debug!("{definition_tree}: (...) (unmanaged)");
            }
            summary.add(Outcome::Unmanaged);
        }
    }
    Ok(summary)
}
