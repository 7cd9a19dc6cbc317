//! Tags, which other resources reference by label.
//!
//! Tags are only ever created. A tag no longer in the configuration may still
//! be referenced by resources this tool does not manage.

use super::{SyncContext, TAG_PATH, tag_lookups};
use anyhow::Result;
use declarative::{Error as MappingError, Summary};
use indexmap::IndexSet;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagsSettings {
    /// Tag labels, in creation order.
    #[serde(default)]
    pub definitions: IndexSet<String>,
}

impl TagsSettings {
    pub fn validate(&self, tree: &str) -> declarative::Result<()> {
        for (i, tag) in self.definitions.iter().enumerate() {
            if tag.trim().is_empty() {
                return Err(MappingError::validation(
                    format!("{tree}.definitions[{i}]"),
                    "tag label must not be empty",
                ));
            }
        }
        Ok(())
    }
}

pub fn from_remote(ctx: &SyncContext<'_>) -> Result<TagsSettings> {
    Ok(TagsSettings {
        definitions: tag_lookups(ctx.client)?
            .into_iter()
            .map(|(label, _)| label)
            .collect(),
    })
}

/// Create every tag not already defined remotely.
///
/// Labels are compared case-insensitively, as the remote does.
pub fn update_remote(ctx: &SyncContext<'_>, tags: &TagsSettings) -> Result<Summary> {
    let mut summary = Summary::default();
    if tags.definitions.is_empty() {
        return Ok(summary);
    }
    let tree = super::tree("tags");
    let mut existing: Vec<String> = tag_lookups(ctx.client)?
        .into_iter()
        .map(|(label, _)| label.to_lowercase())
        .collect();
    for (i, tag) in tags.definitions.iter().enumerate() {
        let key = tag.to_lowercase();
        if existing.contains(&key) {
            debug!("{tree}.definitions[{i}]: '{tag}' (exists)");
            summary.add_update(false);
            continue;
        }
        info!("{tree}.definitions[{i}]: '{tag}' -> (created)");
        ctx.client.post(TAG_PATH, json!({ "label": tag }))?;
        existing.push(key);
        summary.add(declarative::Outcome::Created);
    }
    Ok(summary)
}
