//! The resolver seam handed to factories

use std::rc::Rc;

use tagbind_common::{CapabilityId, Tag};

use crate::instance::Instance;

/// Anything that can answer `(capability, tag)` lookups
///
/// Implemented by [`ContextBinder`](crate::ContextBinder) and
/// [`ServiceLocator`](crate::ServiceLocator). Factories receive the
/// resolver that is constructing them so they can pull their own
/// dependencies from the same scope.
pub trait Resolver {
    /// Cached instance, or build one from the applicable binding
    fn get_or_create(&self, capability: CapabilityId, tag: Tag) -> Option<Instance>;

    /// Cached instance only; never constructs
    fn try_get(&self, capability: CapabilityId, tag: Tag) -> Option<Instance>;
}

impl<'a> dyn Resolver + 'a {
    pub fn resolve<T: ?Sized + 'static>(&self, tag: Tag) -> Option<Rc<T>> {
        self.get_or_create(CapabilityId::of::<T>(), tag)?.view::<T>()
    }

    pub fn lookup<T: ?Sized + 'static>(&self, tag: Tag) -> Option<Rc<T>> {
        self.try_get(CapabilityId::of::<T>(), tag)?.view::<T>()
    }
}
