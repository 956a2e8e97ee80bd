//! Pages, revisions and the values stored with them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Who made a change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User(String),
    /// Remote address of an anonymous editor.
    Anonymous(String),
}

impl Author {
    pub fn user(name: impl Into<String>) -> Self {
        Self::User(name.into())
    }

    pub fn anonymous(address: impl Into<String>) -> Self {
        Self::Anonymous(address.into())
    }

    pub fn user_name(&self) -> Option<&str> {
        match self {
            Self::User(name) => Some(name),
            Self::Anonymous(_) => None,
        }
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(name) | Self::Anonymous(name) => f.write_str(name),
        }
    }
}

/// File attached to a revision. The bytes are stored separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub mime_type: String,
    pub size: usize,
}

/// An immutable snapshot of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub id: u64,
    pub page: String,
    /// Content hash of the text body, see [`text_hash`].
    pub text_hash: String,
    pub author: Author,
    pub change_date: DateTime<Utc>,
    pub note: String,
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

/// A page together with the selected revision, its text and metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub name: String,
    pub revision: Revision,
    pub text: String,
    pub metadata: Vec<(String, String)>,
}

impl Page {
    /// All values stored under `key`.
    pub fn meta<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.metadata
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_deleted(&self) -> bool {
        self.revision.deleted
    }
}

/// Input for creating a revision.
#[derive(Debug, Clone)]
pub struct NewRevision {
    pub page: String,
    pub text: String,
    pub author: Author,
    pub change_date: DateTime<Utc>,
    pub note: String,
    pub deleted: bool,
    pub attachment: Option<NewAttachment>,
}

/// Attachment payload of a [`NewRevision`].
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl NewRevision {
    /// A revision dated now, with an empty note.
    pub fn new(page: impl Into<String>, text: impl Into<String>, author: Author) -> Self {
        Self {
            page: page.into(),
            text: text.into(),
            author,
            change_date: Utc::now(),
            note: String::new(),
            deleted: false,
            attachment: None,
        }
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    #[must_use]
    pub fn with_change_date(mut self, change_date: DateTime<Utc>) -> Self {
        self.change_date = change_date;
        self
    }

    #[must_use]
    pub fn with_deleted(mut self, deleted: bool) -> Self {
        self.deleted = deleted;
        self
    }

    #[must_use]
    pub fn with_attachment(mut self, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        self.attachment = Some(NewAttachment {
            mime_type: mime_type.into(),
            data,
        });
        self
    }
}

/// One entry of a tag cloud.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagCount {
    pub name: String,
    pub count: usize,
    /// Font size in percent.
    pub weight: f64,
}

impl TagCount {
    #[allow(clippy::cast_precision_loss)]
    pub fn new(name: impl Into<String>, count: usize) -> Self {
        let weight = 100.0 + (count as f64).ln() * 20.0;
        Self {
            name: name.into(),
            count,
            weight: (weight * 100.0).round() / 100.0,
        }
    }
}

/// Hex SHA-256 of a text body.
///
/// ```
/// let hash = inyoka_storage::text_hash("");
/// assert_eq!(hash.len(), 64);
/// ```
pub fn text_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_text_hash_is_stable() {
        assert_eq!(
            text_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_tag_weight() {
        assert!((TagCount::new("a", 1).weight - 100.0).abs() < 1e-9);
        assert!((TagCount::new("b", 10).weight - 146.05).abs() < 1e-9);
    }

    #[test]
    fn test_author_display() {
        assert_eq!(Author::user("ada").to_string(), "ada");
        assert_eq!(Author::anonymous("127.0.0.1").user_name(), None);
    }
}
