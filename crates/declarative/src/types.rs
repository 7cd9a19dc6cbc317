//! Core types for reconciliation results and remote versions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome of reconciling a single definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Remote already matched the local definition
    Unchanged,
    /// Remote resource was created
    Created,
    /// Remote resource was updated
    Updated,
    /// Remote resource was deleted
    Deleted,
    /// Remote resource exists but is not managed locally
    Unmanaged,
}

impl Outcome {
    /// Check if the outcome represents a change on the remote
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Deleted)
    }
}

/// Summary of reconciliation results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub unmanaged: usize,
}

impl Summary {
    /// Total number of changes made on the remote
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    /// Whether anything was changed on the remote
    pub fn has_changes(&self) -> bool {
        self.total_changes() > 0
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &Summary) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.unchanged += other.unchanged;
        self.unmanaged += other.unmanaged;
    }

    /// Add an outcome to the summary
    pub fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Deleted => self.deleted += 1,
            Outcome::Unmanaged => self.unmanaged += 1,
        }
    }

    /// Record a changed/unchanged flag as an outcome
    pub fn add_update(&mut self, changed: bool) {
        self.add(if changed {
            Outcome::Updated
        } else {
            Outcome::Unchanged
        });
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} deleted, {} unchanged",
            self.created, self.updated, self.deleted, self.unchanged
        )?;
        if self.unmanaged > 0 {
            write!(f, ", {} unmanaged", self.unmanaged)?;
        }
        Ok(())
    }
}

/// Dotted numeric version reported by a remote instance, e.g. `1.13.1.4243`.
///
/// Components compare numerically, left to right. Non-numeric suffixes on a
/// component (`4243-beta`) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(Vec<u64>);

impl Version {
    /// Build a version from its components.
    pub fn new(parts: impl Into<Vec<u64>>) -> Self {
        Self(parts.into())
    }

    pub fn parts(&self) -> &[u64] {
        &self.0
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parts = s
            .split('.')
            .map(|part| {
                let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
                digits
                    .parse::<u64>()
                    .map_err(|_| format!("invalid version '{s}'"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(parts))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u64::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
