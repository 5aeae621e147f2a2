//! In-memory host for tagbind
//!
//! [`SceneGraph`] is a forest of named objects partitioned into logical
//! groups. It implements [`tagbind_di::Host`], so binders, contexts and the
//! injector can run against it without an engine.

pub mod graph;
pub mod tagger;

pub use graph::{SceneGraph, PERSISTENT_GROUP};
pub use tagger::{TaggedComponent, Tagger};

use tagbind_di::ObjectId;

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("Unknown object: {0}")]
    UnknownObject(ObjectId),

    #[error("Cannot parent {child} under its own descendant {parent}")]
    CyclicParent { child: ObjectId, parent: ObjectId },
}

pub type Result<T> = std::result::Result<T, SceneError>;
