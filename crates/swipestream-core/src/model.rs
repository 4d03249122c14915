//! Data model: items, their statuses, and named collections.
//!
//! An [`Item`] record is created lazily the first time a status is looked up
//! or set for an identifier, and is never deleted by this crate. Identity is
//! the opaque `id` alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Classification of a media item.
///
/// `Unprocessed` is the only initial value. The three decided statuses are
/// terminal: no transition leads away from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// No decision recorded yet.
    Unprocessed,
    /// User discarded the item.
    Ignored,
    /// User kept the item (member of the private collection).
    Saved,
    /// User published the item to the public feed.
    Uploaded,
}

impl ItemStatus {
    /// Whether a decision has been recorded for this status.
    pub fn is_processed(self) -> bool {
        self != ItemStatus::Unprocessed
    }

    /// String form used in persisted records.
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Unprocessed => "unprocessed",
            ItemStatus::Ignored => "ignored",
            ItemStatus::Saved => "saved",
            ItemStatus::Uploaded => "uploaded",
        }
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unprocessed" => Ok(ItemStatus::Unprocessed),
            "ignored" => Ok(ItemStatus::Ignored),
            "saved" => Ok(ItemStatus::Saved),
            "uploaded" => Ok(ItemStatus::Uploaded),
            _ => Err(format!("Unknown item status: {}", s)),
        }
    }
}

/// A single unit of media identified by a stable opaque id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Stable, unique identifier of the underlying asset.
    pub id: String,
    pub status: ItemStatus,
    /// When this item was first seen by the core.
    pub date_added: DateTime<Utc>,
    /// Set if and only if status or membership has changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl Item {
    /// New record with the default `Unprocessed` status.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ItemStatus::Unprocessed,
            date_added: Utc::now(),
            last_modified: None,
        }
    }

    /// New record with an explicit status and no modification timestamp.
    pub fn with_status(id: impl Into<String>, status: ItemStatus) -> Self {
        Self {
            status,
            ..Self::new(id)
        }
    }

    /// Record a status change, stamping `last_modified`.
    pub fn set_status(&mut self, new_status: ItemStatus) {
        self.status = new_status;
        self.last_modified = Some(Utc::now());
    }
}

// Equality is by id alone.
impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Item {}

/// Named, ordered, duplicate-free set of item ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Insertion-ordered member ids, no duplicates.
    pub member_ids: Vec<String>,
    pub date_created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            member_ids: Vec::new(),
            date_created: now,
            last_modified: now,
        }
    }

    /// Append an id. Adding an id that is already present is a true no-op:
    /// membership and `last_modified` are both left untouched.
    ///
    /// Returns whether membership actually changed.
    pub fn add_member(&mut self, id: &str) -> bool {
        if self.contains(id) {
            return false;
        }
        self.member_ids.push(id.to_string());
        self.last_modified = Utc::now();
        true
    }

    /// Remove an id. Returns whether membership actually changed.
    pub fn remove_member(&mut self, id: &str) -> bool {
        match self.member_ids.iter().position(|m| m == id) {
            Some(index) => {
                self.member_ids.remove(index);
                self.last_modified = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.member_ids.iter().any(|m| m == id)
    }
}
