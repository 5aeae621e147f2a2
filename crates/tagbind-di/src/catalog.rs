//! Implementation descriptors and the name-keyed type catalog
//!
//! Bindings reference types by name in configuration assets. The catalog
//! maps those names onto [`Implementation`] descriptors (how to build and
//! view a concrete type) and onto capability ids.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use tagbind_common::CapabilityId;
use tracing::debug;

use crate::instance::{Destroyable, Initializable, Instance};
use crate::resolver::Resolver;
use crate::{DiError, DiResult};

type Caster = Box<dyn Fn(Rc<dyn Any>) -> Option<Box<dyn Any>>>;
type Factory = Box<dyn Fn(&dyn Resolver) -> Rc<dyn Any>>;

struct View {
    capability: CapabilityId,
    cast: Caster,
}

impl View {
    fn identity<C: 'static>() -> Self {
        Self {
            capability: CapabilityId::of::<C>(),
            cast: Box::new(|object| {
                object
                    .downcast::<C>()
                    .ok()
                    .map(|concrete| Box::new(concrete) as Box<dyn Any>)
            }),
        }
    }
}

/// Everything the runtime knows about one concrete type
pub struct Implementation {
    id: CapabilityId,
    name: String,
    views: Vec<View>,
    factory: Option<Factory>,
    structural: bool,
}

impl Implementation {
    pub fn builder<C: 'static>(name: impl Into<String>) -> ImplementationBuilder<C> {
        ImplementationBuilder::new(name.into())
    }

    /// Capability id of the concrete type
    pub fn id(&self) -> CapabilityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instances live in the host hierarchy and are located, never built
    pub fn is_structural(&self) -> bool {
        self.structural
    }

    pub fn has_factory(&self) -> bool {
        self.factory.is_some()
    }

    pub fn provides(&self, capability: CapabilityId) -> bool {
        self.views.iter().any(|view| view.capability == capability)
    }

    /// The concrete type first, then every provided capability
    pub fn capabilities(&self) -> impl Iterator<Item = CapabilityId> + '_ {
        self.views.iter().map(|view| view.capability)
    }

    pub(crate) fn cast<I: ?Sized + 'static>(&self, object: &Rc<dyn Any>) -> Option<Rc<I>> {
        let wanted = CapabilityId::of::<I>();
        let view = self.views.iter().find(|view| view.capability == wanted)?;
        let boxed = (view.cast)(Rc::clone(object))?;
        boxed.downcast::<Rc<I>>().ok().map(|rc| *rc)
    }

    /// Run the factory; `None` when the type has no factory
    pub fn construct(self: &Rc<Self>, resolver: &dyn Resolver) -> Option<Instance> {
        let factory = self.factory.as_ref()?;
        let object = factory(resolver);
        Some(Instance::from_erased(Rc::clone(self), object))
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Implementation")
            .field("name", &self.name)
            .field(
                "capabilities",
                &self.views.iter().map(|v| v.capability.short_name()).collect::<Vec<_>>(),
            )
            .field("structural", &self.structural)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

/// Builder for [`Implementation`]
pub struct ImplementationBuilder<C> {
    name: String,
    views: Vec<View>,
    factory: Option<Factory>,
    structural: bool,
    _marker: PhantomData<fn() -> C>,
}

impl<C: 'static> ImplementationBuilder<C> {
    fn new(name: String) -> Self {
        Self {
            name,
            views: vec![View::identity::<C>()],
            factory: None,
            structural: false,
            _marker: PhantomData,
        }
    }

    /// Declare that `C` provides `I`; `upcast` is usually `|c| c as Rc<dyn I>`
    pub fn provides<I: ?Sized + 'static>(mut self, upcast: fn(Rc<C>) -> Rc<I>) -> Self {
        let capability = CapabilityId::of::<I>();
        self.views.retain(|view| view.capability != capability);
        self.views.push(View {
            capability,
            cast: Box::new(move |object| {
                object
                    .downcast::<C>()
                    .ok()
                    .map(|concrete| Box::new(upcast(concrete)) as Box<dyn Any>)
            }),
        });
        self
    }

    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&dyn Resolver) -> C + 'static,
    {
        self.factory = Some(Box::new(move |resolver| Rc::new(factory(resolver)) as Rc<dyn Any>));
        self
    }

    pub fn structural(mut self) -> Self {
        self.structural = true;
        self
    }

    pub fn build(self) -> Rc<Implementation> {
        Rc::new(Implementation {
            id: CapabilityId::of::<C>(),
            name: self.name,
            views: self.views,
            factory: self.factory,
            structural: self.structural,
        })
    }
}

impl<C: Initializable + 'static> ImplementationBuilder<C> {
    pub fn initializable(self) -> Self {
        self.provides::<dyn Initializable>(|c| c as Rc<dyn Initializable>)
    }
}

impl<C: Destroyable + 'static> ImplementationBuilder<C> {
    pub fn destroyable(self) -> Self {
        self.provides::<dyn Destroyable>(|c| c as Rc<dyn Destroyable>)
    }
}

/// Registry of implementations and capability names
#[derive(Default)]
pub struct TypeCatalog {
    implementations: HashMap<CapabilityId, Rc<Implementation>>,
    by_name: HashMap<String, Rc<Implementation>>,
    capabilities: HashMap<String, CapabilityId>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog populated from every `inventory`-submitted registration
    pub fn discover() -> DiResult<Self> {
        let mut catalog = Self::new();
        crate::registration::register_all_discovered(&mut catalog)?;
        Ok(catalog)
    }

    /// Add an implementation
    ///
    /// Its name becomes an alias of its concrete capability, and each
    /// provided capability becomes reachable by its full type name.
    pub fn register(&mut self, implementation: Rc<Implementation>) -> DiResult<()> {
        if self.implementations.contains_key(&implementation.id())
            || self.by_name.contains_key(implementation.name())
        {
            return Err(DiError::AlreadyRegistered {
                type_name: implementation.name().to_string(),
            });
        }

        for capability in implementation.capabilities() {
            self.capabilities
                .entry(capability.name().to_string())
                .or_insert(capability);
        }
        self.capabilities
            .entry(implementation.name().to_string())
            .or_insert(implementation.id());

        debug!(
            implementation = %implementation.name(),
            capabilities = implementation.views.len(),
            "Registered implementation"
        );
        self.by_name
            .insert(implementation.name().to_string(), Rc::clone(&implementation));
        self.implementations.insert(implementation.id(), implementation);
        Ok(())
    }

    /// Make capability `I` reachable by a short alias
    pub fn alias<I: ?Sized + 'static>(&mut self, name: impl Into<String>) -> &mut Self {
        let capability = CapabilityId::of::<I>();
        self.capabilities.insert(name.into(), capability);
        self.capabilities
            .entry(capability.name().to_string())
            .or_insert(capability);
        self
    }

    pub fn implementation(&self, id: CapabilityId) -> Option<&Rc<Implementation>> {
        self.implementations.get(&id)
    }

    pub fn implementation_named(&self, name: &str) -> Option<&Rc<Implementation>> {
        self.by_name.get(name)
    }

    pub fn capability_named(&self, name: &str) -> Option<CapabilityId> {
        self.capabilities.get(name).copied()
    }

    /// Wrap an existing object using its registered descriptor
    pub fn instance<C: 'static>(&self, object: Rc<C>) -> DiResult<Instance> {
        let implementation = self
            .implementation(CapabilityId::of::<C>())
            .ok_or_else(|| DiError::NotRegistered {
                type_name: std::any::type_name::<C>().to_string(),
            })?;
        Instance::new(Rc::clone(implementation), object)
    }

    pub fn len(&self) -> usize {
        self.implementations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.implementations.is_empty()
    }
}
