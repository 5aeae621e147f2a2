//! Scope lifecycle and resolution chain tests

mod common;

use std::rc::Rc;

use common::*;
use tagbind_common::{CapabilityId, Platform, Tag};
use tagbind_di::*;

fn logger() -> CapabilityId {
    CapabilityId::of::<dyn Logger>()
}

#[test]
fn test_excluded_platform_falls_through_to_next_binding() {
    let host = TestHost::new();
    let registry = ScopeRegistry::new();
    let binder = logger_binder();

    let context = ContextBinder::create(ContextOptions::new(Scope::Process), &binder, &registry, &host.as_host());
    assert_eq!(context.resolve::<dyn Logger>(Tag::NONE).unwrap().name(), "console");

    context.teardown();
    host.set_platform(Platform::Windows);
    let context = ContextBinder::create(ContextOptions::new(Scope::Process), &binder, &registry, &host.as_host());
    assert_eq!(context.resolve::<dyn Logger>(Tag::NONE).unwrap().name(), "null");
}

#[test]
fn test_second_process_context_is_not_registered() {
    let host = TestHost::new();
    let registry = ScopeRegistry::new();
    let binder = logger_binder();
    let owner = host.spawn("app", None);

    let first = ContextBinder::create(
        ContextOptions::new(Scope::Process).with_owner(owner),
        &binder,
        &registry,
        &host.as_host(),
    );
    let second = ContextBinder::create(ContextOptions::new(Scope::Process), &binder, &registry, &host.as_host());

    let registered = registry.process_context().unwrap();
    assert!(Rc::ptr_eq(&registered, &first));
    assert!(!Rc::ptr_eq(&registered, &second));
    assert_eq!(host.retained(), vec![owner]);
    assert_eq!(binder.ref_count(), 2);
}

#[test]
fn test_first_group_context_keeps_slot() {
    let host = TestHost::new();
    let registry = ScopeRegistry::new();
    let binder = logger_binder();

    let first = ContextBinder::create(ContextOptions::new(Scope::Group).in_group("main"), &binder, &registry, &host.as_host());
    let _second = ContextBinder::create(ContextOptions::new(Scope::Group).in_group("main"), &binder, &registry, &host.as_host());
    assert!(Rc::ptr_eq(&registry.group_context("main").unwrap(), &first));
}

#[test]
fn test_teardown_clears_only_at_zero_references() {
    let host = TestHost::new();
    let registry = ScopeRegistry::new();
    let binder = logger_binder();

    let process = ContextBinder::create(ContextOptions::new(Scope::Process), &binder, &registry, &host.as_host());
    let group = ContextBinder::create(ContextOptions::new(Scope::Group).in_group("main"), &binder, &registry, &host.as_host());
    let instance = process.get_or_create(logger(), Tag::NONE).unwrap();
    let console = instance.view::<ConsoleLogger>().unwrap();
    assert_eq!(binder.ref_count(), 2);

    process.teardown();
    assert!(registry.process_context().is_none());
    assert_eq!(console.destroyed.get(), 0);
    assert!(group.try_get(logger(), Tag::NONE).is_some());

    drop(group);
    assert_eq!(binder.ref_count(), 0);
    assert_eq!(console.destroyed.get(), 1);
    assert!(binder.is_empty());
    assert!(registry.is_empty());

    process.teardown();
    assert_eq!(console.destroyed.get(), 1);
}

#[test]
fn test_owner_context_has_independent_cache() {
    let host = TestHost::new();
    let registry = ScopeRegistry::new();
    let binder = logger_binder();

    let process = ContextBinder::create(ContextOptions::new(Scope::Process), &binder, &registry, &host.as_host());
    let owner = ContextBinder::create(ContextOptions::new(Scope::Owner), &binder, &registry, &host.as_host());

    let shared = process.get_or_create(logger(), Tag::NONE).unwrap();
    let own = owner.get_or_create(logger(), Tag::NONE).unwrap();
    assert!(!shared.ptr_eq(&own));
    assert_eq!(binder.ref_count(), 2);
    assert!(registry.process_context().is_some());

    let own_logger = own.view::<ConsoleLogger>().unwrap();
    owner.teardown();
    assert_eq!(own_logger.destroyed.get(), 1);
    assert!(process.try_get(logger(), Tag::NONE).unwrap().ptr_eq(&shared));
}

#[test]
fn test_last_owner_teardown_clears_shared_cache() {
    let host = TestHost::new();
    let registry = ScopeRegistry::new();
    let binder = logger_binder();

    let group = ContextBinder::create(ContextOptions::new(Scope::Group).in_group("main"), &binder, &registry, &host.as_host());
    let owner = ContextBinder::create(ContextOptions::new(Scope::Owner), &binder, &registry, &host.as_host());
    let shared = group.get_or_create(logger(), Tag::NONE).unwrap().view::<ConsoleLogger>().unwrap();
    let own = owner.get_or_create(logger(), Tag::NONE).unwrap().view::<ConsoleLogger>().unwrap();

    group.teardown();
    assert_eq!(binder.ref_count(), 1);
    assert_eq!(shared.destroyed.get(), 0);
    assert_eq!(binder.len(), 1);

    owner.teardown();
    assert_eq!(binder.ref_count(), 0);
    assert_eq!(shared.destroyed.get(), 1);
    assert_eq!(own.destroyed.get(), 1);
    assert!(binder.is_empty());
}

#[test]
fn test_early_binding_creates_everything_up_front() {
    let host = TestHost::new();
    let registry = ScopeRegistry::new();
    let binder = logger_binder();

    let context = ContextBinder::create(
        ContextOptions::new(Scope::Process).early_binding(true),
        &binder,
        &registry,
        &host.as_host(),
    );
    assert!(context.try_get(logger(), Tag::NONE).is_some());
    assert!(context.lookup::<ConsoleLogger>(Tag::NONE).is_none());
    assert!(!context.get_all().is_empty());
}

#[test]
fn test_factory_resolves_dependencies_from_its_context() {
    trait Audio {
        fn logger_name(&self) -> &'static str;
    }

    struct Mixer {
        logger: Option<Rc<dyn Logger>>,
    }

    impl Audio for Mixer {
        fn logger_name(&self) -> &'static str {
            self.logger.as_ref().map_or("none", |l| l.name())
        }
    }

    let mixer = Implementation::builder::<Mixer>("Mixer")
        .provides::<dyn Audio>(|m| m as Rc<dyn Audio>)
        .factory(|resolver| Mixer {
            logger: resolver.resolve::<dyn Logger>(Tag::NONE),
        })
        .build();

    let binder = Rc::new(Binder::new(
        "audio",
        vec![
            Binding::new::<dyn Audio>(&mixer),
            Binding::new::<dyn Logger>(&null_logger()),
        ],
    ));
    let host = TestHost::new();
    let registry = ScopeRegistry::new();
    let context = ContextBinder::create(ContextOptions::new(Scope::Process), &binder, &registry, &host.as_host());

    let audio = context.resolve::<dyn Audio>(Tag::NONE).unwrap();
    assert_eq!(audio.logger_name(), "null");
    assert!(context.try_get(logger(), Tag::NONE).is_some());
}

#[test]
fn test_circular_construction_yields_none() {
    struct Chicken;
    struct Egg;

    let chicken = Implementation::builder::<Chicken>("Chicken")
        .factory(|resolver| {
            let _ = resolver.resolve::<Egg>(Tag::NONE);
            Chicken
        })
        .build();
    let egg = Implementation::builder::<Egg>("Egg")
        .factory(|resolver| {
            assert!(resolver.resolve::<Chicken>(Tag::NONE).is_none());
            Egg
        })
        .build();

    let binder = Rc::new(Binder::new(
        "cycle",
        vec![Binding::new::<Chicken>(&chicken), Binding::new::<Egg>(&egg)],
    ));
    let host = TestHost::new();
    let registry = ScopeRegistry::new();
    let context = ContextBinder::create(ContextOptions::new(Scope::Process), &binder, &registry, &host.as_host());

    assert!(context.resolve::<Chicken>(Tag::NONE).is_some());
    assert!(context.lookup::<Egg>(Tag::NONE).is_some());
}

#[test]
fn test_chain_orders_owner_group_process() {
    let host = TestHost::new();
    let registry = ScopeRegistry::new();
    let binder = logger_binder();

    let root = host.spawn("root", None);
    let player = host.spawn("player", Some(root));
    let weapon = host.spawn("weapon", Some(player));

    let process = ContextBinder::create(ContextOptions::new(Scope::Process), &binder, &registry, &host.as_host());
    let group = ContextBinder::create(
        ContextOptions::new(Scope::Group).in_group("main").with_owner(root),
        &binder,
        &registry,
        &host.as_host(),
    );
    let owner = ContextBinder::create(
        ContextOptions::new(Scope::Owner).with_owner(player),
        &binder,
        &registry,
        &host.as_host(),
    );
    host.attach(player, owner.as_instance(), Tag::NONE);

    let chain = ResolutionChain::build(&registry, &*host, weapon);
    let contexts = chain.contexts();
    assert_eq!(contexts.len(), 3);
    assert!(Rc::ptr_eq(&contexts[0], &owner));
    assert!(Rc::ptr_eq(&contexts[1], &group));
    assert!(Rc::ptr_eq(&contexts[2], &process));

    let resolved = chain.resolve(logger(), &Tag::NONE, false).unwrap();
    assert!(owner.try_get(logger(), Tag::NONE).unwrap().ptr_eq(&resolved));
    assert!(process.try_get(logger(), Tag::NONE).is_none());
}

#[test]
fn test_chain_skips_nearest_context_that_is_not_owner_scoped() {
    let host = TestHost::new();
    let registry = ScopeRegistry::new();
    let binder = logger_binder();

    let root = host.spawn("root", None);
    let child = host.spawn("child", Some(root));
    let process = ContextBinder::create(
        ContextOptions::new(Scope::Process).with_owner(root),
        &binder,
        &registry,
        &host.as_host(),
    );
    host.attach(root, process.as_instance(), Tag::NONE);

    let chain = ResolutionChain::build(&registry, &*host, child);
    assert_eq!(chain.len(), 1);
    assert!(Rc::ptr_eq(&chain.contexts()[0], &process));
}

#[test]
fn test_chain_discovers_unregistered_group_context_on_roots() {
    let host = TestHost::new();
    let registry = ScopeRegistry::new();
    let binder = logger_binder();

    let root = host.spawn("level", None);
    let enemy = host.spawn("enemy", None);
    let group = ContextBinder::create(ContextOptions::new(Scope::Group), &binder, &registry, &host.as_host());
    host.attach(root, group.as_instance(), Tag::NONE);
    assert!(registry.group_context("main").is_none());

    let chain = ResolutionChain::build(&registry, &*host, enemy);
    assert_eq!(chain.len(), 1);
    assert!(Rc::ptr_eq(&chain.contexts()[0], &group));
    assert!(Rc::ptr_eq(&registry.group_context("main").unwrap(), &group));
}

#[test]
fn test_optional_chain_lookup_never_constructs() {
    let host = TestHost::new();
    let registry = ScopeRegistry::new();
    let binder = logger_binder();
    let object = host.spawn("object", None);

    let _process = ContextBinder::create(ContextOptions::new(Scope::Process), &binder, &registry, &host.as_host());
    let chain = ResolutionChain::build(&registry, &*host, object);

    assert!(chain.resolve(logger(), &Tag::NONE, true).is_none());
    assert!(chain.resolve(logger(), &Tag::NONE, false).is_some());
    assert!(chain.resolve(logger(), &Tag::NONE, true).is_some());
}

#[test]
fn test_registry_shutdown_tears_down_contexts() {
    let host = TestHost::new();
    let registry = ScopeRegistry::new();
    let binder = logger_binder();

    let process = ContextBinder::create(ContextOptions::new(Scope::Process), &binder, &registry, &host.as_host());
    let group = ContextBinder::create(ContextOptions::new(Scope::Group).in_group("main"), &binder, &registry, &host.as_host());
    let instance = group.get_or_create(logger(), Tag::NONE).unwrap();

    registry.shutdown();
    assert!(process.is_torn_down());
    assert!(group.is_torn_down());
    assert!(registry.is_empty());
    assert_eq!(instance.view::<ConsoleLogger>().unwrap().destroyed.get(), 1);
}
