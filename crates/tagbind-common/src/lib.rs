//! Shared value types for tagbind
//!
//! - [`Tag`] and [`TagDatabase`]: stable-identity tags and their display names
//! - [`CapabilityId`] and [`Key`]: the (capability, tag) lookup unit
//! - [`Platform`]: execution platforms a binding can be excluded from
//! - [`logging`]: subscriber bootstrap for hosts

pub mod key;
pub mod logging;
pub mod platform;
pub mod tag;

pub use key::{CapabilityId, Key};
pub use platform::{Platform, UnknownPlatform};
pub use tag::{Tag, TagDatabase, TagDatabaseRecord, TagEntry, TagError};
