//! Stable-identity tags and the tag name database
//!
//! A [`Tag`] is identified solely by its 32-bit `guid`. Identifier `0` is
//! reserved and means "no tag". A display name can ride along with a tag for
//! logging, but it never takes part in equality, hashing or lookups.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors raised while administering a [`TagDatabase`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("Tag name cannot be empty")]
    EmptyName,

    #[error("A tag named '{0}' already exists")]
    DuplicateName(String),

    #[error("Tag id {0} is reserved")]
    ReservedId(i32),

    #[error("Tag id {0} is used by more than one entry")]
    DuplicateId(i32),

    #[error("No tag with id {0}")]
    UnknownId(i32),
}

/// Value type wrapping a stable identifier
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub struct Tag {
    guid: i32,
    name: Option<Arc<str>>,
}

impl Tag {
    /// The "no tag" wildcard
    pub const NONE: Tag = Tag {
        guid: 0,
        name: None,
    };

    /// Construct a tag from a raw identifier
    pub const fn from_id(guid: i32) -> Self {
        Self { guid, name: None }
    }

    /// Construct a tag carrying a display name
    pub fn named(guid: i32, name: impl Into<Arc<str>>) -> Self {
        Self {
            guid,
            name: Some(name.into()),
        }
    }

    pub fn id(&self) -> i32 {
        self.guid
    }

    /// `false` for the reserved identifier `0`
    pub fn is_valid(&self) -> bool {
        self.guid != 0
    }

    pub fn is_none(&self) -> bool {
        self.guid == 0
    }

    /// Display name, if one was attached
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Same identity, different display name
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.guid == other.guid
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.guid.hash(state);
    }
}

impl From<i32> for Tag {
    fn from(guid: i32) -> Self {
        Tag::from_id(guid)
    }
}

impl From<Tag> for i32 {
    fn from(tag: Tag) -> Self {
        tag.guid
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.guid),
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "Tag({}, {:?})", self.guid, name),
            None => write!(f, "Tag({})", self.guid),
        }
    }
}

/// A registered tag: stable identifier plus mutable display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
    pub guid: i32,
    pub name: String,
}

/// Serialized form of a [`TagDatabase`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagDatabaseRecord {
    #[serde(default)]
    pub entries: Vec<TagEntry>,
}

/// Ordered list of tag entries with a guid lookup
///
/// Identifiers are unique within a database and `0` is never assigned.
/// Name uniqueness is enforced by [`create`](Self::create) and
/// [`rename`](Self::rename) only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "TagDatabaseRecord", into = "TagDatabaseRecord")]
pub struct TagDatabase {
    entries: Vec<TagEntry>,
    lookup: HashMap<i32, usize>,
}

impl TagDatabase {
    /// Display name of the database asset
    pub const NAME: &'static str = "Tag Database";

    pub fn new() -> Self {
        Self::default()
    }

    /// Build a database from persisted entries, validating identifiers
    pub fn from_entries(entries: Vec<TagEntry>) -> Result<Self, TagError> {
        let mut lookup = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            if entry.guid == 0 {
                return Err(TagError::ReservedId(0));
            }
            if lookup.insert(entry.guid, index).is_some() {
                return Err(TagError::DuplicateId(entry.guid));
            }
        }
        Ok(Self { entries, lookup })
    }

    pub fn entries(&self) -> &[TagEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, guid: i32) -> bool {
        self.lookup.contains_key(&guid)
    }

    /// Display name for a guid; `None` for `0` or unknown ids
    pub fn name_of(&self, guid: i32) -> Option<&str> {
        if guid == 0 {
            return None;
        }
        self.lookup
            .get(&guid)
            .map(|&index| self.entries[index].name.as_str())
    }

    /// Tag for a guid with its current display name attached
    pub fn tag(&self, guid: i32) -> Tag {
        match self.name_of(guid) {
            Some(name) => Tag::named(guid, name),
            None => Tag::from_id(guid),
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<Tag> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| Tag::named(entry.guid, entry.name.as_str()))
    }

    /// Register a new tag under a freshly generated identifier
    pub fn create(&mut self, name: &str) -> Result<Tag, TagError> {
        self.check_name(name, None)?;

        let guid = self.generate_id();
        self.lookup.insert(guid, self.entries.len());
        self.entries.push(TagEntry {
            guid,
            name: name.to_string(),
        });

        debug!(guid, name, "Created tag");
        Ok(Tag::named(guid, name))
    }

    /// Change the display name of an existing tag; identity is untouched
    pub fn rename(&mut self, guid: i32, new_name: &str) -> Result<(), TagError> {
        let index = *self.lookup.get(&guid).ok_or(TagError::UnknownId(guid))?;
        self.check_name(new_name, Some(guid))?;

        let entry = &mut self.entries[index];
        debug!(guid, from = %entry.name, to = new_name, "Renamed tag");
        entry.name = new_name.to_string();
        Ok(())
    }

    /// Remove an entry; returns it when present
    pub fn remove(&mut self, guid: i32) -> Option<TagEntry> {
        let index = self.lookup.remove(&guid)?;
        let entry = self.entries.remove(index);
        self.rebuild_lookup();
        debug!(guid, name = %entry.name, "Removed tag");
        Some(entry)
    }

    /// Validation used by create and rename
    pub fn check_name(&self, name: &str, except: Option<i32>) -> Result<(), TagError> {
        if name.trim().is_empty() {
            return Err(TagError::EmptyName);
        }
        let taken = self
            .entries
            .iter()
            .any(|entry| entry.name == name && Some(entry.guid) != except);
        if taken {
            return Err(TagError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn generate_id(&self) -> i32 {
        loop {
            let bytes = uuid::Uuid::new_v4().into_bytes();
            let folded = bytes
                .chunks_exact(4)
                .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .fold(0i32, |acc, part| acc ^ part);
            if folded != 0 && !self.lookup.contains_key(&folded) {
                return folded;
            }
        }
    }

    fn rebuild_lookup(&mut self) {
        self.lookup = self
            .entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (entry.guid, index))
            .collect();
    }
}

impl TryFrom<TagDatabaseRecord> for TagDatabase {
    type Error = TagError;

    fn try_from(record: TagDatabaseRecord) -> Result<Self, Self::Error> {
        TagDatabase::from_entries(record.entries)
    }
}

impl From<TagDatabase> for TagDatabaseRecord {
    fn from(database: TagDatabase) -> Self {
        TagDatabaseRecord {
            entries: database.entries,
        }
    }
}
