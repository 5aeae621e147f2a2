//! Application bootstrap over the workspace crates

use std::path::Path;
use std::rc::Rc;

use anyhow::Context as _;
use tracing::info;

use tagbind_common::logging::{init_logging, parse_level};
use tagbind_config::{ConfigLoader, RuntimeSettings};
use tagbind_di::{
    Binder, ContextBinder, ContextOptions, InjectionReport, Injectable, Injector, ObjectId, Scope,
    ScopeRegistry, ServiceLocator, TypeCatalog,
};
use tagbind_scene::SceneGraph;

/// Group the scene starts in
pub const MAIN_GROUP: &str = "main";

/// Everything a host needs to resolve bindings
pub struct Runtime {
    settings: RuntimeSettings,
    catalog: Rc<TypeCatalog>,
    scene: Rc<SceneGraph>,
    registry: Rc<ScopeRegistry>,
    injector: Injector,
    locator: ServiceLocator,
}

impl Runtime {
    /// Load settings, install logging and discover every registered type
    pub fn bootstrap(loader: &ConfigLoader) -> anyhow::Result<Self> {
        let settings = loader.load_settings().context("Failed to load runtime settings")?;
        init_logging(parse_level(&settings.log_level));
        Self::with_settings(settings)
    }

    /// Like [`bootstrap`](Self::bootstrap) but leaves the global subscriber alone
    pub fn with_settings(settings: RuntimeSettings) -> anyhow::Result<Self> {
        let catalog = Rc::new(TypeCatalog::discover().context("Type discovery failed")?);
        let scene = SceneGraph::new(MAIN_GROUP);
        scene.set_platform(settings.platform);
        let registry = ScopeRegistry::new();
        scene.track_registry(&registry);
        let injector = Injector::new(scene.as_host(), Rc::clone(&registry));
        let locator = ServiceLocator::new(Rc::clone(&catalog));

        info!(
            platform = %settings.effective_platform(),
            early_binding = settings.early_binding,
            types = catalog.len(),
            "Runtime ready"
        );

        Ok(Self {
            settings,
            catalog,
            scene,
            registry,
            injector,
            locator,
        })
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &Rc<TypeCatalog> {
        &self.catalog
    }

    pub fn scene(&self) -> &Rc<SceneGraph> {
        &self.scene
    }

    pub fn registry(&self) -> &Rc<ScopeRegistry> {
        &self.registry
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    pub fn locator(&self) -> &ServiceLocator {
        &self.locator
    }

    /// Read a binding asset and resolve its type names against the catalog
    pub fn load_binder(&self, path: &Path) -> anyhow::Result<Rc<Binder>> {
        let mut asset = ConfigLoader::new()
            .load_binder_asset(path)
            .with_context(|| format!("Failed to load binder asset {}", path.display()))?;
        if asset.name.is_none() {
            asset.name = path.file_stem().map(|stem| stem.to_string_lossy().into_owned());
        }
        Ok(Rc::new(Binder::from_asset(&asset, &self.catalog)))
    }

    /// Attach a context to `object`, using the configured early-binding default
    pub fn attach_context(
        &self,
        object: ObjectId,
        scope: Scope,
        binder: &Rc<Binder>,
    ) -> anyhow::Result<Rc<ContextBinder>> {
        let options = ContextOptions::new(scope).early_binding(self.settings.early_binding);
        let context = self.scene.attach_context(object, options, binder, &self.registry)?;
        Ok(context)
    }

    /// Fill the injected fields of `target` on behalf of `owner`
    pub fn inject<T: Injectable>(&self, owner: ObjectId, target: &mut T) -> anyhow::Result<InjectionReport> {
        let report = self.injector.inject_field_bindings(owner, target)?;
        Ok(report)
    }

    /// Tear down every registered context
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }
}
