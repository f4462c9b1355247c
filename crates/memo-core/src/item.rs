use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single entry in the to-do list.
///
/// The serde renames (`duedata`, `isChecked`) are the persisted-blob field
/// names and must stay stable across releases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TodoItem {
    #[serde(default)]
    pub title: String,

    #[serde(rename = "duedata")]
    pub due: DateTime<Utc>,

    #[serde(rename = "isChecked", default)]
    pub done: bool,

    #[serde(default)]
    pub deleted: bool,

    /// Position of this record in the owning list. Dense, 0-based, and
    /// reassigned by the store after every mutation; display only.
    #[serde(default)]
    pub id: usize,

    /// Durable surrogate identity, assigned once at creation and never
    /// touched by re-sorts. Blobs written before this field existed decode
    /// with a fresh value.
    #[serde(default = "Uuid::new_v4")]
    pub uid: Uuid,
}

impl TodoItem {
    pub fn new(title: impl Into<String>, due: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            due,
            done: false,
            deleted: false,
            id: 0,
            uid: Uuid::new_v4(),
        }
    }
}
