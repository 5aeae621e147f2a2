//! Type-erased instances and their lifecycle hooks

use std::any::Any;
use std::fmt;
use std::rc::{Rc, Weak};

use tagbind_common::CapabilityId;

use crate::catalog::Implementation;
use crate::{DiError, DiResult};

/// Invoked once on a freshly produced instance, before it is cached
pub trait Initializable {
    fn on_created(&self);
}

/// Invoked once per cached instance when its binder is cleared
pub trait Destroyable {
    fn on_destroyed(&self);
}

/// A shared object together with the descriptor of its concrete type
///
/// The descriptor knows every capability the object provides, so an
/// `Instance` can be viewed as any of them without knowing the concrete
/// type at the call site.
#[derive(Clone)]
pub struct Instance {
    object: Rc<dyn Any>,
    implementation: Rc<Implementation>,
}

impl Instance {
    /// Wrap `object`, checking that it is the descriptor's concrete type
    pub fn new<C: 'static>(implementation: Rc<Implementation>, object: Rc<C>) -> DiResult<Self> {
        if implementation.id() != CapabilityId::of::<C>() {
            return Err(DiError::TypeMismatch {
                capability: implementation.name().to_string(),
                instance: std::any::type_name::<C>().to_string(),
            });
        }
        Ok(Self::from_erased(implementation, object))
    }

    pub(crate) fn from_erased(implementation: Rc<Implementation>, object: Rc<dyn Any>) -> Self {
        Self {
            object,
            implementation,
        }
    }

    pub fn implementation(&self) -> &Rc<Implementation> {
        &self.implementation
    }

    pub fn type_name(&self) -> &str {
        self.implementation.name()
    }

    /// Capability id of the concrete type
    pub fn concrete(&self) -> CapabilityId {
        self.implementation.id()
    }

    pub fn provides(&self, capability: CapabilityId) -> bool {
        self.implementation.provides(capability)
    }

    pub fn capabilities(&self) -> impl Iterator<Item = CapabilityId> + '_ {
        self.implementation.capabilities()
    }

    /// View the object as `I`, either its concrete type or a provided trait
    pub fn view<I: ?Sized + 'static>(&self) -> Option<Rc<I>> {
        self.implementation.cast::<I>(&self.object)
    }

    /// Identity comparison: both handles point at the same object
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        self.addr() == other.addr()
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.object) as *const () as usize
    }

    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.object)
    }

    pub fn downgrade(&self) -> WeakInstance {
        WeakInstance {
            object: Rc::downgrade(&self.object),
            implementation: Rc::clone(&self.implementation),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({} @ {:#x})", self.type_name(), self.addr())
    }
}

/// Non-owning counterpart of [`Instance`]
#[derive(Clone)]
pub struct WeakInstance {
    object: Weak<dyn Any>,
    implementation: Rc<Implementation>,
}

impl WeakInstance {
    pub fn upgrade(&self) -> Option<Instance> {
        self.object
            .upgrade()
            .map(|object| Instance::from_erased(Rc::clone(&self.implementation), object))
    }

    pub fn is_alive(&self) -> bool {
        self.object.strong_count() > 0
    }

    pub fn type_name(&self) -> &str {
        self.implementation.name()
    }

    pub(crate) fn points_to(&self, instance: &Instance) -> bool {
        self.is_alive() && self.object.as_ptr() as *const () as usize == instance.addr()
    }
}

impl fmt::Debug for WeakInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakInstance({}, alive: {})", self.type_name(), self.is_alive())
    }
}
