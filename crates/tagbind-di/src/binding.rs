//! A single declared binding and how it produces instances

use std::rc::Rc;

use tagbind_common::{CapabilityId, Platform, Tag};
use tagbind_config::BindingRecord;
use tracing::{error, warn};

use crate::catalog::{Implementation, TypeCatalog};
use crate::host::Host;
use crate::instance::{Initializable, Instance};
use crate::resolver::Resolver;

/// Maps `(capability, tag)` to an implementation, minus excluded platforms
///
/// Type references that did not resolve against the catalog are kept by
/// name: such a binding never matches, so lookups degrade to not-found.
#[derive(Debug, Clone)]
pub struct Binding {
    capability_name: String,
    capability: Option<CapabilityId>,
    implementation_name: String,
    implementation: Option<Rc<Implementation>>,
    tag: Tag,
    excluded_platforms: Vec<Platform>,
}

/// Outcome of looking up the binding for a key on a platform
#[derive(Debug, Clone, Copy)]
pub enum BindingMatch<'a> {
    /// First binding for the key that is not excluded
    Applicable(&'a Binding),
    /// Bindings exist for the key but all of them exclude the platform
    Excluded(&'a Binding),
    Missing,
}

impl Binding {
    /// Untagged binding of capability `I` to `implementation`
    pub fn new<I: ?Sized + 'static>(implementation: &Rc<Implementation>) -> Self {
        let capability = CapabilityId::of::<I>();
        Self {
            capability_name: capability.name().to_string(),
            capability: Some(capability),
            implementation_name: implementation.name().to_string(),
            implementation: Some(Rc::clone(implementation)),
            tag: Tag::NONE,
            excluded_platforms: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<Tag>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn excluding(mut self, platforms: impl IntoIterator<Item = Platform>) -> Self {
        self.excluded_platforms.extend(platforms);
        self
    }

    /// Resolve a configuration record against `catalog`
    pub fn from_record(record: &BindingRecord, catalog: &TypeCatalog) -> Self {
        let capability = catalog.capability_named(&record.capability);
        if capability.is_none() {
            warn!(
                capability = %record.capability,
                "Capability type reference does not resolve; binding will never match"
            );
        }

        let implementation = catalog.implementation_named(&record.implementation).cloned();
        match (&implementation, capability) {
            (None, _) => warn!(
                implementation = %record.implementation,
                "Implementation type reference does not resolve; binding will never match"
            ),
            (Some(found), Some(capability)) if !found.provides(capability) => warn!(
                implementation = %record.implementation,
                capability = %record.capability,
                "Implementation does not provide the bound capability"
            ),
            _ => {}
        }

        Self {
            capability_name: record.capability.clone(),
            capability,
            implementation_name: record.implementation.clone(),
            implementation,
            tag: record.tag.clone(),
            excluded_platforms: record.excluded_platforms.clone(),
        }
    }

    pub fn capability(&self) -> Option<CapabilityId> {
        self.capability
    }

    pub fn capability_name(&self) -> &str {
        &self.capability_name
    }

    pub fn implementation(&self) -> Option<&Rc<Implementation>> {
        self.implementation.as_ref()
    }

    pub fn implementation_name(&self) -> &str {
        &self.implementation_name
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn excluded_platforms(&self) -> &[Platform] {
        &self.excluded_platforms
    }

    pub fn matches(&self, capability: CapabilityId, tag: &Tag) -> bool {
        self.capability == Some(capability) && &self.tag == tag
    }

    pub fn is_excluded_on(&self, platform: Platform) -> bool {
        platform.is_excluded(&self.excluded_platforms)
    }

    /// Produce an instance for `capability` and run its creation hook
    pub(crate) fn instantiate(
        &self,
        resolver: &dyn Resolver,
        host: &dyn Host,
        capability: CapabilityId,
    ) -> Option<Instance> {
        let Some(implementation) = &self.implementation else {
            warn!(
                implementation = %self.implementation_name,
                "Binding implementation is unresolved"
            );
            return None;
        };

        if !implementation.provides(capability) {
            error!(
                implementation = %implementation.name(),
                capability = %capability,
                "Bound implementation does not provide the requested capability"
            );
            return None;
        }

        let instance = if implementation.is_structural() {
            let tag = (!self.tag.is_none()).then(|| self.tag.clone());
            match host.find_live(implementation.id(), tag) {
                Some(found) => found,
                None => {
                    error!(
                        implementation = %implementation.name(),
                        tag = %self.tag,
                        "No live object found for structural binding"
                    );
                    return None;
                }
            }
        } else {
            match implementation.construct(resolver) {
                Some(built) => built,
                None => {
                    error!(
                        implementation = %implementation.name(),
                        "Implementation has no factory"
                    );
                    return None;
                }
            }
        };

        if let Some(hook) = instance.view::<dyn Initializable>() {
            hook.on_created();
        }
        Some(instance)
    }
}
