//! Scope-attached binders
//!
//! A [`ContextBinder`] ties a [`Binder`] to a lifetime scope. Process and
//! group contexts register themselves in the [`ScopeRegistry`] so that
//! objects anywhere can reach them; owner contexts are found by walking up
//! the host hierarchy and get their own copy of the binder's cache.

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tagbind_common::{CapabilityId, Key, Tag};
use tracing::{debug, warn};

use crate::binder::Binder;
use crate::catalog::Implementation;
use crate::host::{Host, ObjectId};
use crate::instance::Instance;
use crate::registry::{ScopeRegistry, ScopeSlot};
use crate::resolver::Resolver;
use crate::DiResult;

/// Lifetime scope of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One per process; survives group unloads
    Process,
    /// One per loaded group
    Group,
    /// Attached to an object; serves that object's subtree
    Owner,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scope::Process => "process",
            Scope::Group => "group",
            Scope::Owner => "owner",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextOptions {
    pub scope: Scope,
    /// Resolve every binding when the context is created
    pub early_binding: bool,
    /// Object the context is attached to
    pub owner: Option<ObjectId>,
    /// Group a group-scoped context registers under
    pub group: Option<String>,
}

impl ContextOptions {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            early_binding: false,
            owner: None,
            group: None,
        }
    }

    pub fn with_owner(mut self, owner: ObjectId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn early_binding(mut self, enabled: bool) -> Self {
        self.early_binding = enabled;
        self
    }
}

thread_local! {
    static DESCRIPTOR: Rc<Implementation> =
        Implementation::builder::<ContextBinder>("ContextBinder").build();
}

pub struct ContextBinder {
    scope: Scope,
    owner: Option<ObjectId>,
    group: Option<String>,
    binder: Rc<Binder>,
    /// Configured binder the context was created from; `binder` for shared scopes
    source: Rc<Binder>,
    host: Weak<dyn Host>,
    registry: Weak<ScopeRegistry>,
    torn_down: Cell<bool>,
}

impl ContextBinder {
    /// Activate a context over `binder`
    ///
    /// The binder's reference count is incremented. Owner contexts work on
    /// an independent copy of the binder; process contexts claim the
    /// process slot (a second one is logged and left unregistered) and ask
    /// the host to keep their owner alive across group unloads.
    pub fn create(
        options: ContextOptions,
        binder: &Rc<Binder>,
        registry: &Rc<ScopeRegistry>,
        host: &Rc<dyn Host>,
    ) -> Rc<Self> {
        binder.retain();
        let source = Rc::clone(binder);
        let binder = match options.scope {
            Scope::Owner => Rc::new(binder.instantiate()),
            Scope::Process | Scope::Group => Rc::clone(binder),
        };

        let context = Rc::new(Self {
            scope: options.scope,
            owner: options.owner,
            group: options.group,
            binder,
            source,
            host: Rc::downgrade(host),
            registry: Rc::downgrade(registry),
            torn_down: Cell::new(false),
        });

        match context.scope {
            Scope::Process => {
                if registry.register(ScopeSlot::Process, &context) {
                    if let Some(owner) = context.owner {
                        host.retain_across_groups(owner);
                    }
                } else {
                    warn!(
                        binder = %context.binder.name(),
                        "A process context is already registered; this one stays unregistered"
                    );
                }
            }
            Scope::Group => match &context.group {
                Some(group) => {
                    registry.register(ScopeSlot::Group(group.clone()), &context);
                }
                None => warn!(
                    binder = %context.binder.name(),
                    "Group context has no group name and cannot be registered"
                ),
            },
            Scope::Owner => {}
        }

        debug!(
            scope = %context.scope,
            binder = %context.binder.name(),
            ref_count = context.binder.ref_count(),
            "Context created"
        );

        if options.early_binding {
            context.binder.create_all(&*context, &**host);
        }
        context
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn owner(&self) -> Option<ObjectId> {
        self.owner
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn binder(&self) -> &Rc<Binder> {
        &self.binder
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.get()
    }

    pub fn get_or_create(&self, capability: CapabilityId, tag: Tag) -> Option<Instance> {
        let Some(host) = self.host.upgrade() else {
            warn!(scope = %self.scope, "Host is gone; cannot create instances");
            return None;
        };
        self.binder.get_or_create(self, &*host, capability, tag)
    }

    pub fn try_get(&self, capability: CapabilityId, tag: Tag) -> Option<Instance> {
        self.binder.try_get(capability, tag)
    }

    pub fn resolve<T: ?Sized + 'static>(&self, tag: Tag) -> Option<Rc<T>> {
        self.get_or_create(CapabilityId::of::<T>(), tag)?.view::<T>()
    }

    pub fn lookup<T: ?Sized + 'static>(&self, tag: Tag) -> Option<Rc<T>> {
        self.try_get(CapabilityId::of::<T>(), tag)?.view::<T>()
    }

    pub fn add(&self, capability: CapabilityId, instance: Instance, tag: Tag) -> DiResult<()> {
        self.binder.add(capability, instance, tag)
    }

    /// Snapshot of everything cached in this context
    pub fn get_all(&self) -> HashMap<Key, Instance> {
        self.binder.cached()
    }

    /// Deregister and release the binder; idempotent
    ///
    /// The configured binder's cache is cleared once the last context
    /// created from it is gone, whichever scope that context has. An owner
    /// context always clears its own copy.
    pub fn teardown(&self) {
        if self.torn_down.replace(true) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.deregister(self);
        }

        let remaining = self.source.release();
        if self.binder.is_copy() {
            self.binder.clear();
        }
        if remaining == 0 {
            self.source.clear();
        }
        debug!(
            scope = %self.scope,
            binder = %self.binder.name(),
            remaining,
            "Context torn down"
        );
    }

    /// Descriptor used when the context is attached to a host object
    pub fn implementation() -> Rc<Implementation> {
        DESCRIPTOR.with(Rc::clone)
    }

    pub fn as_instance(self: &Rc<Self>) -> Instance {
        Instance::from_erased(Self::implementation(), Rc::clone(self) as Rc<dyn std::any::Any>)
    }
}

impl Resolver for ContextBinder {
    fn get_or_create(&self, capability: CapabilityId, tag: Tag) -> Option<Instance> {
        ContextBinder::get_or_create(self, capability, tag)
    }

    fn try_get(&self, capability: CapabilityId, tag: Tag) -> Option<Instance> {
        ContextBinder::try_get(self, capability, tag)
    }
}

impl Drop for ContextBinder {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for ContextBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextBinder")
            .field("scope", &self.scope)
            .field("owner", &self.owner)
            .field("group", &self.group)
            .field("binder", &self.binder.name())
            .field("torn_down", &self.torn_down.get())
            .finish()
    }
}
