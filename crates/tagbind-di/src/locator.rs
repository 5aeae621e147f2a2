//! Flat, weak-reference service registry
//!
//! Unlike the scope chain, the locator never owns what it stores: every
//! entry is a [`WeakInstance`], so registering a service does not extend
//! its lifetime. Dead entries are pruned as lookups encounter them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tagbind_common::{CapabilityId, Key, Tag};
use tracing::{debug, error, warn};

use crate::catalog::TypeCatalog;
use crate::instance::{Instance, WeakInstance};
use crate::resolver::Resolver;
use crate::{DiError, DiResult};

pub struct ServiceLocator {
    services: RefCell<HashMap<Key, Vec<WeakInstance>>>,
    catalog: Rc<TypeCatalog>,
}

impl ServiceLocator {
    /// `catalog` supplies factories for [`get_or_create`](Self::get_or_create)
    pub fn new(catalog: Rc<TypeCatalog>) -> Self {
        Self {
            services: RefCell::new(HashMap::new()),
            catalog,
        }
    }

    /// Register `service` under `(capability, tag)`
    ///
    /// Registering under the concrete type also registers under every
    /// capability it provides. An object already alive under a key is not
    /// added twice.
    pub fn add(&self, capability: CapabilityId, service: &Instance, tag: Tag) -> DiResult<()> {
        if !service.provides(capability) {
            return Err(DiError::mismatch(capability, service));
        }

        if capability == service.concrete() {
            for provided in service.capabilities() {
                self.insert(Key::new(provided, tag.clone()), service);
            }
        } else {
            self.insert(Key::new(capability, tag), service);
        }
        Ok(())
    }

    /// Register an object under its concrete type
    pub fn register<C: 'static>(&self, service: &Rc<C>, tag: Tag) -> DiResult<()> {
        let instance = self.catalog.instance(Rc::clone(service))?;
        self.add(instance.concrete(), &instance, tag)
    }

    fn insert(&self, key: Key, service: &Instance) {
        let mut services = self.services.borrow_mut();
        let entries = services.entry(key).or_default();
        if !entries.iter().any(|entry| entry.points_to(service)) {
            entries.push(service.downgrade());
        }
    }

    /// First live service for the key
    pub fn try_get(&self, capability: CapabilityId, tag: Tag) -> Option<Instance> {
        let key = Key::new(capability, tag);
        let mut services = self.services.borrow_mut();
        let entries = services.get_mut(&key)?;
        entries.retain(WeakInstance::is_alive);

        if entries.is_empty() {
            services.remove(&key);
            debug!(key = %key, "No live service registered");
            return None;
        }
        if entries.len() > 1 {
            warn!(
                key = %key,
                candidates = entries.len(),
                "More than one live service registered; using the first"
            );
        }
        entries[0].upgrade()
    }

    /// Every live service for the key, evaluated lazily
    pub fn get_all(&self, capability: CapabilityId, tag: Tag) -> Services<'_> {
        Services {
            locator: self,
            key: Key::new(capability, tag),
            pending: None,
        }
    }

    /// Registered service, or one built from the catalog and registered
    pub fn get_or_create(&self, capability: CapabilityId, tag: Tag) -> Option<Instance> {
        if let Some(found) = self.try_get(capability, tag.clone()) {
            return Some(found);
        }

        let Some(implementation) = self.catalog.implementation(capability).cloned() else {
            debug!(capability = %capability, "No implementation registered to construct");
            return None;
        };
        let Some(instance) = implementation.construct(self) else {
            warn!(implementation = %implementation.name(), "Implementation has no factory");
            return None;
        };

        if let Err(e) = self.add(capability, &instance, tag) {
            error!(error = %e, "Could not register created service");
        }
        Some(instance)
    }

    /// Forget every entry for the key
    pub fn remove(&self, capability: CapabilityId, tag: Tag) -> bool {
        self.services
            .borrow_mut()
            .remove(&Key::new(capability, tag))
            .is_some()
    }

    pub fn get<T: ?Sized + 'static>(&self, tag: Tag) -> Option<Rc<T>> {
        self.try_get(CapabilityId::of::<T>(), tag)?.view::<T>()
    }

    pub fn get_all_of<T: ?Sized + 'static>(&self, tag: Tag) -> impl Iterator<Item = Rc<T>> + '_ {
        self.get_all(CapabilityId::of::<T>(), tag)
            .filter_map(|instance| instance.view::<T>())
    }

    /// Number of keys with at least one entry, live or not yet pruned
    pub fn len(&self) -> usize {
        self.services.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.borrow().is_empty()
    }
}

impl Resolver for ServiceLocator {
    fn get_or_create(&self, capability: CapabilityId, tag: Tag) -> Option<Instance> {
        ServiceLocator::get_or_create(self, capability, tag)
    }

    fn try_get(&self, capability: CapabilityId, tag: Tag) -> Option<Instance> {
        ServiceLocator::try_get(self, capability, tag)
    }
}

/// Lazy iterator over the live services of one key
///
/// Dead entries are pruned when iteration starts; services dropped while
/// iterating are skipped.
pub struct Services<'a> {
    locator: &'a ServiceLocator,
    key: Key,
    pending: Option<std::vec::IntoIter<WeakInstance>>,
}

impl Iterator for Services<'_> {
    type Item = Instance;

    fn next(&mut self) -> Option<Instance> {
        if self.pending.is_none() {
            let snapshot = {
                let mut services = self.locator.services.borrow_mut();
                match services.get_mut(&self.key) {
                    Some(entries) => {
                        entries.retain(WeakInstance::is_alive);
                        entries.clone()
                    }
                    None => Vec::new(),
                }
            };
            self.pending = Some(snapshot.into_iter());
        }
        self.pending.as_mut()?.find_map(|entry| entry.upgrade())
    }
}
