//! Binding registry with a per-binder instance cache

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tagbind_common::{CapabilityId, Key, Platform, Tag};
use tagbind_config::BinderAsset;
use tracing::{debug, error, info, warn};

use crate::binding::{Binding, BindingMatch};
use crate::catalog::TypeCatalog;
use crate::host::Host;
use crate::instance::{Destroyable, Instance};
use crate::resolver::Resolver;
use crate::{DiError, DiResult};

/// Ordered bindings plus the instances created from them
///
/// The binding list and the reference count are shared between a binder
/// and every [`instantiate`](Binder::instantiate)d copy; the cache is not.
pub struct Binder {
    name: String,
    bindings: Rc<[Binding]>,
    ref_count: Rc<Cell<usize>>,
    cache: RefCell<HashMap<Key, Instance>>,
    in_progress: RefCell<HashSet<Key>>,
    is_copy: bool,
}

impl Binder {
    pub fn new(name: impl Into<String>, bindings: Vec<Binding>) -> Self {
        Self {
            name: name.into(),
            bindings: bindings.into(),
            ref_count: Rc::new(Cell::new(0)),
            cache: RefCell::new(HashMap::new()),
            in_progress: RefCell::new(HashSet::new()),
            is_copy: false,
        }
    }

    /// Build from a configuration asset, resolving names against `catalog`
    pub fn from_asset(asset: &BinderAsset, catalog: &TypeCatalog) -> Self {
        let bindings = asset
            .bindings
            .iter()
            .map(|record| Binding::from_record(record, catalog))
            .collect();
        let name = asset.name.clone().unwrap_or_else(|| "binder".to_string());
        info!(binder = %name, bindings = asset.bindings.len(), "Created binder from asset");
        Self::new(name, bindings)
    }

    /// Independent copy with an empty cache
    ///
    /// Used for owner-scoped contexts so each owner gets its own instances.
    pub fn instantiate(&self) -> Binder {
        Self {
            name: self.name.clone(),
            bindings: Rc::clone(&self.bindings),
            ref_count: Rc::clone(&self.ref_count),
            cache: RefCell::new(HashMap::new()),
            in_progress: RefCell::new(HashSet::new()),
            is_copy: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_copy(&self) -> bool {
        self.is_copy
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Number of live contexts using this binder's configuration
    pub fn ref_count(&self) -> usize {
        self.ref_count.get()
    }

    pub(crate) fn retain(&self) -> usize {
        let count = self.ref_count.get() + 1;
        self.ref_count.set(count);
        count
    }

    pub(crate) fn release(&self) -> usize {
        let count = self.ref_count.get().saturating_sub(1);
        self.ref_count.set(count);
        count
    }

    /// First binding for the key that is not excluded on `platform`
    pub fn find_binding(&self, capability: CapabilityId, tag: &Tag, platform: Platform) -> BindingMatch<'_> {
        let mut excluded = None;
        for binding in self.bindings.iter().filter(|b| b.matches(capability, tag)) {
            if binding.is_excluded_on(platform) {
                excluded.get_or_insert(binding);
            } else {
                return BindingMatch::Applicable(binding);
            }
        }
        match excluded {
            Some(binding) => BindingMatch::Excluded(binding),
            None => BindingMatch::Missing,
        }
    }

    /// Cached instance for the key, or one built from the applicable binding
    ///
    /// `resolver` is handed to the factory so it can resolve its own
    /// dependencies. A request for a key already under construction is a
    /// cycle and yields `None`.
    pub fn get_or_create(
        &self,
        resolver: &dyn Resolver,
        host: &dyn Host,
        capability: CapabilityId,
        tag: Tag,
    ) -> Option<Instance> {
        let key = Key::new(capability, tag);
        let cached = self.cache.borrow().get(&key).cloned();
        if cached.is_some() {
            return cached;
        }

        if !self.in_progress.borrow_mut().insert(key.clone()) {
            error!(binder = %self.name, key = %key, "Circular dependency detected");
            return None;
        }
        let created = self.create_instance(resolver, host, &key);
        self.in_progress.borrow_mut().remove(&key);

        let instance = created?;
        if let Err(e) = self.add(capability, instance.clone(), key.tag) {
            error!(binder = %self.name, error = %e, "Could not cache created instance");
        }
        Some(instance)
    }

    fn create_instance(&self, resolver: &dyn Resolver, host: &dyn Host, key: &Key) -> Option<Instance> {
        let platform = host.platform();
        match self.find_binding(key.capability, &key.tag, platform) {
            BindingMatch::Applicable(binding) => {
                let instance = binding.instantiate(resolver, host, key.capability)?;
                debug!(
                    binder = %self.name,
                    key = %key,
                    implementation = %instance.type_name(),
                    "Created instance"
                );
                Some(instance)
            }
            BindingMatch::Excluded(binding) => {
                warn!(
                    binder = %self.name,
                    key = %key,
                    implementation = %binding.implementation_name(),
                    platform = %platform,
                    "Binding exists but is excluded on the current platform"
                );
                None
            }
            BindingMatch::Missing => {
                debug!(binder = %self.name, key = %key, "No binding found");
                None
            }
        }
    }

    /// Cached instance only
    pub fn try_get(&self, capability: CapabilityId, tag: Tag) -> Option<Instance> {
        self.cache.borrow().get(&Key::new(capability, tag)).cloned()
    }

    /// Cache `instance` under `(capability, tag)`; existing entries win
    ///
    /// When `capability` is the instance's concrete type, the instance is
    /// also cached under every capability it provides.
    pub fn add(&self, capability: CapabilityId, instance: Instance, tag: Tag) -> DiResult<()> {
        if !instance.provides(capability) {
            return Err(DiError::mismatch(capability, &instance));
        }

        let mut cache = self.cache.borrow_mut();
        if capability == instance.concrete() {
            for provided in instance.capabilities() {
                cache
                    .entry(Key::new(provided, tag.clone()))
                    .or_insert_with(|| instance.clone());
            }
        } else {
            cache.entry(Key::new(capability, tag)).or_insert(instance);
        }
        Ok(())
    }

    /// Resolve every binding up front
    pub fn create_all(&self, resolver: &dyn Resolver, host: &dyn Host) {
        let bindings = Rc::clone(&self.bindings);
        for binding in bindings.iter() {
            if let Some(capability) = binding.capability() {
                self.get_or_create(resolver, host, capability, binding.tag().clone());
            }
        }
    }

    /// Snapshot of the cache
    pub fn cached(&self) -> HashMap<Key, Instance> {
        self.cache.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.borrow().is_empty()
    }

    /// Empty the cache, running each distinct instance's teardown hook once
    pub fn clear(&self) {
        let drained: Vec<Instance> = self.cache.borrow_mut().drain().map(|(_, v)| v).collect();
        let mut seen = HashSet::new();
        for instance in drained {
            if !seen.insert(instance.addr()) {
                continue;
            }
            if let Some(hook) = instance.view::<dyn Destroyable>() {
                hook.on_destroyed();
            }
        }
        debug!(binder = %self.name, released = seen.len(), "Cleared binder cache");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Implementation;
    use crate::host::{ObjectId, StructuralQuery};
    use crate::instance::Initializable;

    trait Speak {
        fn word(&self) -> &'static str;
    }

    #[derive(Default)]
    struct Loud {
        created: Cell<u32>,
        destroyed: Rc<Cell<u32>>,
    }

    impl Speak for Loud {
        fn word(&self) -> &'static str {
            "LOUD"
        }
    }

    impl Initializable for Loud {
        fn on_created(&self) {
            self.created.set(self.created.get() + 1);
        }
    }

    impl Destroyable for Loud {
        fn on_destroyed(&self) {
            self.destroyed.set(self.destroyed.get() + 1);
        }
    }

    struct Quiet;

    impl Speak for Quiet {
        fn word(&self) -> &'static str {
            "quiet"
        }
    }

    struct Bare {
        platform: Platform,
    }

    impl Host for Bare {
        fn platform(&self) -> Platform {
            self.platform
        }
        fn find_first(&self, _: ObjectId, _: &StructuralQuery) -> Option<Instance> {
            None
        }
        fn find_all(&self, _: ObjectId, _: &StructuralQuery) -> Vec<Instance> {
            Vec::new()
        }
        fn find_live(&self, _: CapabilityId, _: Option<Tag>) -> Option<Instance> {
            None
        }
        fn group_of(&self, _: ObjectId) -> Option<String> {
            None
        }
        fn is_group_loaded(&self, _: &str) -> bool {
            false
        }
        fn group_roots(&self, _: &str) -> Vec<ObjectId> {
            Vec::new()
        }
    }

    struct NoResolver;

    impl Resolver for NoResolver {
        fn get_or_create(&self, _: CapabilityId, _: Tag) -> Option<Instance> {
            None
        }
        fn try_get(&self, _: CapabilityId, _: Tag) -> Option<Instance> {
            None
        }
    }

    fn loud() -> Rc<Implementation> {
        Implementation::builder::<Loud>("Loud")
            .provides::<dyn Speak>(|l| l as Rc<dyn Speak>)
            .initializable()
            .destroyable()
            .factory(|_| Loud::default())
            .build()
    }

    fn quiet() -> Rc<Implementation> {
        Implementation::builder::<Quiet>("Quiet")
            .provides::<dyn Speak>(|q| q as Rc<dyn Speak>)
            .factory(|_| Quiet)
            .build()
    }

    fn speak() -> CapabilityId {
        CapabilityId::of::<dyn Speak>()
    }

    #[test]
    fn test_first_applicable_binding_wins() {
        let binder = Binder::new(
            "test",
            vec![
                Binding::new::<dyn Speak>(&loud()).excluding([Platform::Linux]),
                Binding::new::<dyn Speak>(&quiet()),
            ],
        );
        let host = Bare { platform: Platform::Linux };

        let instance = binder.get_or_create(&NoResolver, &host, speak(), Tag::NONE).unwrap();
        assert_eq!(instance.view::<dyn Speak>().unwrap().word(), "quiet");

        let host = Bare { platform: Platform::Windows };
        let binder = Binder::new("fresh", binder.bindings().to_vec());
        let instance = binder.get_or_create(&NoResolver, &host, speak(), Tag::NONE).unwrap();
        assert_eq!(instance.view::<dyn Speak>().unwrap().word(), "LOUD");
    }

    #[test]
    fn test_get_or_create_caches_and_runs_hook_once() {
        let binder = Binder::new("test", vec![Binding::new::<dyn Speak>(&loud())]);
        let host = Bare { platform: Platform::Linux };

        let first = binder.get_or_create(&NoResolver, &host, speak(), Tag::NONE).unwrap();
        let second = binder.get_or_create(&NoResolver, &host, speak(), Tag::NONE).unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(first.view::<Loud>().unwrap().created.get(), 1);
        assert!(binder.try_get(speak(), Tag::NONE).is_some());
    }

    #[test]
    fn test_find_binding_reports_exclusion() {
        let binder = Binder::new(
            "test",
            vec![Binding::new::<dyn Speak>(&loud()).excluding([Platform::Switch])],
        );
        assert!(matches!(
            binder.find_binding(speak(), &Tag::NONE, Platform::Switch),
            BindingMatch::Excluded(_)
        ));
        assert!(matches!(
            binder.find_binding(speak(), &Tag::from_id(1), Platform::Switch),
            BindingMatch::Missing
        ));

        let host = Bare { platform: Platform::Switch };
        assert!(binder.get_or_create(&NoResolver, &host, speak(), Tag::NONE).is_none());
        assert!(binder.is_empty());
    }

    #[test]
    fn test_tags_are_distinct_keys() {
        let binder = Binder::new(
            "test",
            vec![
                Binding::new::<dyn Speak>(&loud()).with_tag(1),
                Binding::new::<dyn Speak>(&quiet()).with_tag(2),
            ],
        );
        let host = Bare { platform: Platform::Linux };

        let one = binder.get_or_create(&NoResolver, &host, speak(), Tag::from_id(1)).unwrap();
        let two = binder.get_or_create(&NoResolver, &host, speak(), Tag::from_id(2)).unwrap();
        assert!(!one.ptr_eq(&two));
        assert!(binder.get_or_create(&NoResolver, &host, speak(), Tag::NONE).is_none());
    }

    #[test]
    fn test_add_concrete_registers_every_capability() {
        let binder = Binder::new("test", Vec::new());
        let instance = Instance::new(loud(), Rc::new(Loud::default())).unwrap();

        binder.add(CapabilityId::of::<Loud>(), instance.clone(), Tag::NONE).unwrap();
        assert!(binder.try_get(speak(), Tag::NONE).unwrap().ptr_eq(&instance));
        assert!(binder.try_get(CapabilityId::of::<dyn Destroyable>(), Tag::NONE).is_some());
        assert!(binder.try_get(speak(), Tag::from_id(9)).is_none());
    }

    #[test]
    fn test_add_keeps_existing_entry() {
        let binder = Binder::new("test", Vec::new());
        let first = Instance::new(quiet(), Rc::new(Quiet)).unwrap();
        let second = Instance::new(quiet(), Rc::new(Quiet)).unwrap();

        binder.add(speak(), first.clone(), Tag::NONE).unwrap();
        binder.add(speak(), second, Tag::NONE).unwrap();
        assert!(binder.try_get(speak(), Tag::NONE).unwrap().ptr_eq(&first));
    }

    #[test]
    fn test_add_rejects_type_mismatch() {
        let binder = Binder::new("test", Vec::new());
        let instance = Instance::new(quiet(), Rc::new(Quiet)).unwrap();
        let result = binder.add(CapabilityId::of::<dyn Destroyable>(), instance, Tag::NONE);
        assert!(matches!(result, Err(DiError::TypeMismatch { .. })));
    }

    #[test]
    fn test_clear_runs_teardown_once_per_instance() {
        let destroyed = Rc::new(Cell::new(0));
        let binder = Binder::new("test", Vec::new());
        let object = Rc::new(Loud {
            destroyed: Rc::clone(&destroyed),
            ..Loud::default()
        });
        let instance = Instance::new(loud(), object).unwrap();
        binder.add(CapabilityId::of::<Loud>(), instance, Tag::NONE).unwrap();
        assert!(binder.len() > 1);

        binder.clear();
        assert_eq!(destroyed.get(), 1);
        assert!(binder.is_empty());
    }

    #[test]
    fn test_instantiate_shares_bindings_not_cache() {
        let binder = Binder::new("test", vec![Binding::new::<dyn Speak>(&quiet())]);
        let host = Bare { platform: Platform::Linux };
        binder.retain();

        let copy = binder.instantiate();
        assert!(copy.is_copy());
        assert_eq!(copy.bindings().len(), 1);
        assert_eq!(copy.ref_count(), 1);

        let original = binder.get_or_create(&NoResolver, &host, speak(), Tag::NONE).unwrap();
        assert!(copy.try_get(speak(), Tag::NONE).is_none());
        let copied = copy.get_or_create(&NoResolver, &host, speak(), Tag::NONE).unwrap();
        assert!(!original.ptr_eq(&copied));

        assert_eq!(copy.release(), 0);
        assert_eq!(binder.ref_count(), 0);
        assert_eq!(binder.release(), 0);
    }

    #[test]
    fn test_create_all_builds_every_binding() {
        let binder = Binder::new(
            "test",
            vec![
                Binding::new::<dyn Speak>(&loud()),
                Binding::new::<dyn Speak>(&quiet()).with_tag(5),
            ],
        );
        binder.create_all(&NoResolver, &Bare { platform: Platform::Linux });
        assert!(binder.try_get(speak(), Tag::NONE).is_some());
        assert!(binder.try_get(speak(), Tag::from_id(5)).is_some());
    }
}
