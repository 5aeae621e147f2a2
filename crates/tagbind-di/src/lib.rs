//! Scoped dependency resolution for tagbind
//!
//! Capabilities are resolved by `(capability, tag)` against a hierarchy of
//! binding scopes:
//!
//! - [`Binder`]: an ordered list of [`Binding`]s plus a cache of created
//!   instances, with platform exclusions and first-wins registration
//! - [`ContextBinder`]: a binder attached to a scope (process, group or
//!   owner), self-registering in the [`ScopeRegistry`]
//! - [`Injector`]: fills the declared fields of a target from a
//!   [`ResolutionChain`] (owner, then group, then process) or from the
//!   [`Host`] object hierarchy
//! - [`ServiceLocator`]: a weak-reference registry that never keeps a
//!   service alive
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use tagbind_common::Tag;
//! use tagbind_di::{Binder, Binding, ContextBinder, ContextOptions, Implementation, Scope, ScopeRegistry};
//!
//! let console = Implementation::builder::<ConsoleLogger>("ConsoleLogger")
//!     .provides::<dyn Logger>(|c| c as Rc<dyn Logger>)
//!     .factory(|_| ConsoleLogger::default())
//!     .build();
//!
//! let binder = Rc::new(Binder::new("app", vec![Binding::new::<dyn Logger>(&console)]));
//! let registry = ScopeRegistry::new();
//! let context = ContextBinder::create(ContextOptions::new(Scope::Process), &binder, &registry, &host);
//! let logger = context.resolve::<dyn Logger>(Tag::NONE);
//! ```

pub mod binder;
pub mod binding;
pub mod catalog;
pub mod chain;
pub mod context;
pub mod host;
pub mod inject;
pub mod instance;
pub mod locator;
pub mod registration;
pub mod registry;
pub mod resolver;

pub use binder::Binder;
pub use binding::{Binding, BindingMatch};
pub use catalog::{Implementation, ImplementationBuilder, TypeCatalog};
pub use chain::ResolutionChain;
pub use context::{ContextBinder, ContextOptions, Scope};
pub use host::{Host, ObjectId, SearchMode, StructuralQuery};
pub use inject::{
    FieldDescriptor, InjectRequirement, Injectable, InjectionPlan, InjectionPlanBuilder,
    InjectionReport, Injector, Requirement, StructuralRequirement, UnsatisfiedField,
};
pub use instance::{Destroyable, Initializable, Instance, WeakInstance};
pub use locator::{ServiceLocator, Services};
pub use registration::CatalogRegistration;
pub use registry::{ScopeRegistry, ScopeSlot};
pub use resolver::Resolver;

/// Errors raised by programming mistakes
///
/// Resolution misses are never errors: they are logged and surface as
/// `None` or in an [`InjectionReport`].
#[derive(Debug, thiserror::Error)]
pub enum DiError {
    #[error("Type mismatch: `{instance}` does not provide `{capability}`")]
    TypeMismatch {
        capability: String,
        instance: String,
    },

    #[error("Implementation not registered: {type_name}")]
    NotRegistered { type_name: String },

    #[error("Implementation already registered: {type_name}")]
    AlreadyRegistered { type_name: String },

    #[error("Catalog registration failed: {message}")]
    RegistrationFailed { message: String },
}

pub type DiResult<T> = Result<T, DiError>;

impl DiError {
    pub(crate) fn mismatch(capability: tagbind_common::CapabilityId, instance: &Instance) -> Self {
        DiError::TypeMismatch {
            capability: capability.name().to_string(),
            instance: instance.type_name().to_string(),
        }
    }
}
