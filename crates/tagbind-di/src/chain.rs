//! Ordered contexts consulted when injecting into an object

use std::rc::Rc;

use tagbind_common::{CapabilityId, Tag};
use tracing::debug;

use crate::context::{ContextBinder, Scope};
use crate::host::{Host, ObjectId, SearchMode, StructuralQuery};
use crate::instance::Instance;
use crate::registry::{ScopeRegistry, ScopeSlot};

/// Owner context, then group context, then process context
///
/// Each candidate appears at most once and absent ones are skipped.
#[derive(Debug, Default)]
pub struct ResolutionChain {
    contexts: Vec<Rc<ContextBinder>>,
}

impl ResolutionChain {
    pub fn build(registry: &ScopeRegistry, host: &dyn Host, owner: ObjectId) -> Self {
        let mut chain = Self::default();

        let nearest = StructuralQuery::new(SearchMode::Parent, CapabilityId::of::<ContextBinder>());
        if let Some(context) = host
            .find_first(owner, &nearest)
            .and_then(|found| found.view::<ContextBinder>())
        {
            if context.scope() == Scope::Owner {
                chain.push(context);
            }
        }

        if let Some(context) = Self::group_context(registry, host, owner) {
            chain.push(context);
        }

        if let Some(context) = registry.process_context() {
            chain.push(context);
        }

        debug!(owner = %host.describe(owner), contexts = chain.len(), "Built resolution chain");
        chain
    }

    fn push(&mut self, context: Rc<ContextBinder>) {
        if context.is_torn_down() || self.contexts.iter().any(|c| Rc::ptr_eq(c, &context)) {
            return;
        }
        self.contexts.push(context);
    }

    /// Registered context of the owner's group, or one found on the
    /// group's root objects (searched at most once per group)
    fn group_context(
        registry: &ScopeRegistry,
        host: &dyn Host,
        owner: ObjectId,
    ) -> Option<Rc<ContextBinder>> {
        let group = host.group_of(owner)?;
        if let Some(context) = registry.group_context(&group) {
            return Some(context);
        }
        if !host.is_group_loaded(&group) || !registry.mark_scanned(&group) {
            return None;
        }

        let on_root = StructuralQuery::new(SearchMode::OnSelf, CapabilityId::of::<ContextBinder>());
        for root in host.group_roots(&group) {
            let Some(context) = host
                .find_first(root, &on_root)
                .and_then(|found| found.view::<ContextBinder>())
            else {
                continue;
            };
            if context.scope() == Scope::Group {
                registry.register(ScopeSlot::Group(group.clone()), &context);
                return Some(context);
            }
        }
        None
    }

    /// First context that yields an instance
    ///
    /// Optional lookups only read caches; required ones may construct.
    pub fn resolve(&self, capability: CapabilityId, tag: &Tag, optional: bool) -> Option<Instance> {
        self.contexts.iter().find_map(|context| {
            if optional {
                context.try_get(capability, tag.clone())
            } else {
                context.get_or_create(capability, tag.clone())
            }
        })
    }

    pub fn contexts(&self) -> &[Rc<ContextBinder>] {
        &self.contexts
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
