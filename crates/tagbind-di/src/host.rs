//! The host environment: object hierarchy, groups and platform
//!
//! The resolution runtime never owns objects. Everything it needs from the
//! surrounding environment (structural searches, group membership, live
//! object lookup) goes through the [`Host`] trait.

use std::fmt;

use tagbind_common::{CapabilityId, Platform, Tag};

use crate::instance::Instance;

/// Stable handle of an object in the host hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a structural search looks, relative to the origin object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchMode {
    /// The origin object only
    OnSelf,
    /// The origin and its descendants, depth first
    Children,
    /// The origin and its ancestors, nearest first
    Parent,
    /// Every object of the currently active group
    InActiveGroup,
}

/// One structural search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralQuery {
    pub mode: SearchMode,
    pub capability: CapabilityId,
    /// `None` matches any component; `Some` requires that tag on it
    pub tag: Option<Tag>,
    pub include_inactive: bool,
}

impl StructuralQuery {
    pub fn new(mode: SearchMode, capability: CapabilityId) -> Self {
        Self {
            mode,
            capability,
            tag: None,
            include_inactive: false,
        }
    }

    /// Filter by `tag`; the no-tag value leaves the query untagged
    pub fn tagged(mut self, tag: Tag) -> Self {
        self.tag = if tag.is_none() { None } else { Some(tag) };
        self
    }

    pub fn include_inactive(mut self, include: bool) -> Self {
        self.include_inactive = include;
        self
    }
}

pub trait Host {
    /// Platform that binding exclusions are evaluated against
    fn platform(&self) -> Platform {
        Platform::current()
    }

    fn find_first(&self, origin: ObjectId, query: &StructuralQuery) -> Option<Instance>;

    /// Every match, in search order
    fn find_all(&self, origin: ObjectId, query: &StructuralQuery) -> Vec<Instance>;

    /// Any live, active object providing `capability`, optionally tagged
    fn find_live(&self, capability: CapabilityId, tag: Option<Tag>) -> Option<Instance>;

    fn group_of(&self, object: ObjectId) -> Option<String>;

    fn is_group_loaded(&self, group: &str) -> bool;

    /// Root objects of a loaded group, in hierarchy order
    fn group_roots(&self, group: &str) -> Vec<ObjectId>;

    /// Keep `object` alive across group unloads
    fn retain_across_groups(&self, _object: ObjectId) {}

    /// Human-readable object name for log lines
    fn describe(&self, object: ObjectId) -> String {
        object.to_string()
    }
}
