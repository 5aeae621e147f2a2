//! End-to-end harness for tagbind
//!
//! Wires the workspace crates together the way an embedding application
//! would: settings and assets from `tagbind-config`, types discovered into
//! a catalog, a [`SceneGraph`](tagbind_scene::SceneGraph) host and the
//! injector. The integration tests under `tests/` drive it.

pub mod capture;
pub mod fixtures;
pub mod runtime;

pub use capture::LogCapture;
pub use runtime::Runtime;
