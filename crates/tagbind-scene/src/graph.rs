//! Object hierarchy with logical groups

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use tagbind_common::{CapabilityId, Platform, Tag};
use tagbind_di::{
    Binder, ContextBinder, ContextOptions, Host, Instance, ObjectId, Scope, ScopeRegistry,
    SearchMode, StructuralQuery,
};
use tracing::{debug, info, warn};

use crate::tagger::Tagger;
use crate::{Result, SceneError};

/// Group that objects retained across group unloads are moved to
pub const PERSISTENT_GROUP: &str = "DontDestroyOnLoad";

struct Node {
    name: String,
    group: String,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
    active: bool,
    components: Vec<Instance>,
    tagger: Tagger,
}

struct SceneState {
    nodes: BTreeMap<ObjectId, Node>,
    next_id: u64,
    active_group: String,
    loaded_groups: Vec<String>,
}

impl SceneState {
    fn node(&self, id: ObjectId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(SceneError::UnknownObject(id))
    }

    fn node_mut(&mut self, id: ObjectId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(SceneError::UnknownObject(id))
    }

    fn load(&mut self, group: &str) {
        if !self.loaded_groups.iter().any(|g| g == group) {
            self.loaded_groups.push(group.to_string());
        }
    }

    fn active_in_hierarchy(&self, id: ObjectId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            match self.nodes.get(&current) {
                Some(node) if node.active => cursor = node.parent,
                _ => return false,
            }
        }
        true
    }

    fn roots_of(&self, group: &str) -> Vec<ObjectId> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.parent.is_none() && node.group == group)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Depth-first, parents before children
    fn subtree(&self, root: ObjectId) -> Vec<ObjectId> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                order.push(id);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        order
    }

    fn ancestry(&self, origin: ObjectId) -> Vec<ObjectId> {
        let mut chain = Vec::new();
        let mut cursor = Some(origin);
        while let Some(id) = cursor {
            match self.nodes.get(&id) {
                Some(node) => {
                    chain.push(id);
                    cursor = node.parent;
                }
                None => break,
            }
        }
        chain
    }

    fn search_order(&self, origin: ObjectId, mode: SearchMode) -> Vec<ObjectId> {
        match mode {
            SearchMode::OnSelf => self.nodes.contains_key(&origin).then_some(origin).into_iter().collect(),
            SearchMode::Children => self.subtree(origin),
            SearchMode::Parent => self.ancestry(origin),
            SearchMode::InActiveGroup => self
                .roots_of(&self.active_group)
                .into_iter()
                .flat_map(|root| self.subtree(root))
                .collect(),
        }
    }

    fn set_group(&mut self, root: ObjectId, group: &str) {
        for id in self.subtree(root) {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.group = group.to_string();
            }
        }
    }

    fn detach_from_parent(&mut self, child: ObjectId) {
        let parent = self.nodes.get(&child).and_then(|node| node.parent);
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = None;
        }
    }
}

fn matches(node: &Node, component: &Instance, capability: CapabilityId, tag: Option<&Tag>) -> bool {
    component.provides(capability) && tag.map_or(true, |tag| node.tagger.has_tag(component, tag))
}

/// In-memory host: a forest of named objects partitioned into groups
///
/// Objects carry components ([`Instance`]s) and a [`Tagger`]. Destroying an
/// object tears down every [`ContextBinder`] attached to it or to its
/// descendants. Registries that received a context through
/// [`attach_context`](Self::attach_context) are told when a group unloads.
pub struct SceneGraph {
    state: RefCell<SceneState>,
    platform: Cell<Option<Platform>>,
    registries: RefCell<Vec<Weak<ScopeRegistry>>>,
}

impl SceneGraph {
    /// Scene with `active_group` loaded and active
    pub fn new(active_group: impl Into<String>) -> Rc<Self> {
        let active_group = active_group.into();
        Rc::new(Self {
            state: RefCell::new(SceneState {
                nodes: BTreeMap::new(),
                next_id: 1,
                loaded_groups: vec![active_group.clone()],
                active_group,
            }),
            platform: Cell::new(None),
            registries: RefCell::new(Vec::new()),
        })
    }

    pub fn as_host(self: &Rc<Self>) -> Rc<dyn Host> {
        Rc::clone(self) as Rc<dyn Host>
    }

    /// Override the detected platform; `None` restores detection
    pub fn set_platform(&self, platform: Option<Platform>) {
        self.platform.set(platform);
    }

    pub fn active_group(&self) -> String {
        self.state.borrow().active_group.clone()
    }

    pub fn loaded_groups(&self) -> Vec<String> {
        self.state.borrow().loaded_groups.clone()
    }

    pub fn load_group(&self, group: &str) {
        self.state.borrow_mut().load(group);
        debug!(group, "Loaded group");
    }

    /// Load `group` if needed and make it the active one
    pub fn set_active_group(&self, group: &str) {
        let mut state = self.state.borrow_mut();
        state.load(group);
        state.active_group = group.to_string();
        debug!(group, "Activated group");
    }

    /// Root object in the active group
    pub fn spawn(&self, name: &str) -> ObjectId {
        let group = self.active_group();
        self.spawn_in(name, &group)
    }

    /// Root object in `group`, loading it if needed
    pub fn spawn_in(&self, name: &str, group: &str) -> ObjectId {
        let mut state = self.state.borrow_mut();
        state.load(group);
        let id = ObjectId(state.next_id);
        state.next_id += 1;
        state.nodes.insert(
            id,
            Node {
                name: name.to_string(),
                group: group.to_string(),
                parent: None,
                children: Vec::new(),
                active: true,
                components: Vec::new(),
                tagger: Tagger::new(),
            },
        );
        id
    }

    pub fn spawn_child(&self, parent: ObjectId, name: &str) -> Result<ObjectId> {
        let group = self.state.borrow().node(parent)?.group.clone();
        let child = self.spawn_in(name, &group);
        self.set_parent(child, parent)?;
        Ok(child)
    }

    /// Move `child` under `parent`; the subtree joins the parent's group
    pub fn set_parent(&self, child: ObjectId, parent: ObjectId) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.node(child)?;
        let group = state.node(parent)?.group.clone();
        if state.ancestry(parent).contains(&child) {
            return Err(SceneError::CyclicParent { child, parent });
        }

        state.detach_from_parent(child);
        state.node_mut(parent)?.children.push(child);
        state.node_mut(child)?.parent = Some(parent);
        state.set_group(child, &group);
        Ok(())
    }

    /// Make `child` a root of its current group
    pub fn unparent(&self, child: ObjectId) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.node(child)?;
        state.detach_from_parent(child);
        Ok(())
    }

    /// Remove the object and its descendants
    pub fn destroy(&self, id: ObjectId) -> Result<()> {
        let removed: Vec<Node> = {
            let mut state = self.state.borrow_mut();
            state.node(id)?;
            state.detach_from_parent(id);
            let ids = state.subtree(id);
            ids.iter().filter_map(|id| state.nodes.remove(id)).collect()
        };

        for node in &removed {
            for component in &node.components {
                if let Some(context) = component.view::<ContextBinder>() {
                    context.teardown();
                }
            }
        }
        debug!(object = %id, removed = removed.len(), "Destroyed object");
        Ok(())
    }

    /// Destroy every root of `group` and mark it unloaded
    ///
    /// Known registries forget the group, so a reload is searched again.
    pub fn unload_group(&self, group: &str) -> usize {
        let roots = {
            let mut state = self.state.borrow_mut();
            state.loaded_groups.retain(|g| g != group);
            state.roots_of(group)
        };
        let count = roots.len();
        for root in roots {
            if let Err(e) = self.destroy(root) {
                warn!(group, object = %root, error = %e, "Failed to destroy group root");
            }
        }

        let registries: Vec<Rc<ScopeRegistry>> = {
            let mut known = self.registries.borrow_mut();
            known.retain(|registry| registry.strong_count() > 0);
            known.iter().filter_map(Weak::upgrade).collect()
        };
        for registry in registries {
            registry.forget_group(group);
        }
        info!(group, roots = count, "Unloaded group");
        count
    }

    pub fn set_active(&self, id: ObjectId, active: bool) -> Result<()> {
        self.state.borrow_mut().node_mut(id)?.active = active;
        Ok(())
    }

    pub fn is_active_in_hierarchy(&self, id: ObjectId) -> bool {
        self.state.borrow().active_in_hierarchy(id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.state.borrow().nodes.contains_key(&id)
    }

    pub fn name_of(&self, id: ObjectId) -> Option<String> {
        self.state.borrow().nodes.get(&id).map(|node| node.name.clone())
    }

    pub fn parent_of(&self, id: ObjectId) -> Option<ObjectId> {
        self.state.borrow().nodes.get(&id).and_then(|node| node.parent)
    }

    pub fn children_of(&self, id: ObjectId) -> Vec<ObjectId> {
        self.state
            .borrow()
            .nodes
            .get(&id)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    /// First object with this name, in creation order
    pub fn find_by_name(&self, name: &str) -> Option<ObjectId> {
        self.state
            .borrow()
            .nodes
            .iter()
            .find(|(_, node)| node.name == name)
            .map(|(id, _)| *id)
    }

    pub fn attach(&self, id: ObjectId, component: Instance) -> Result<()> {
        self.state.borrow_mut().node_mut(id)?.components.push(component);
        Ok(())
    }

    pub fn attach_tagged(&self, id: ObjectId, component: Instance, tag: Tag) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let node = state.node_mut(id)?;
        node.tagger.add_tag(&component, tag);
        node.components.push(component);
        Ok(())
    }

    /// Remove a component and its tags
    pub fn detach(&self, id: ObjectId, component: &Instance) -> Result<bool> {
        let removed = {
            let mut state = self.state.borrow_mut();
            let node = state.node_mut(id)?;
            node.tagger.remove_all_tags(component);
            let index = node.components.iter().position(|c| c.ptr_eq(component));
            index.map(|i| node.components.remove(i))
        };
        Ok(removed.is_some())
    }

    pub fn components(&self, id: ObjectId) -> Vec<Instance> {
        self.state
            .borrow()
            .nodes
            .get(&id)
            .map(|node| node.components.clone())
            .unwrap_or_default()
    }

    pub fn add_tag(&self, id: ObjectId, component: &Instance, tag: Tag) -> Result<bool> {
        Ok(self.state.borrow_mut().node_mut(id)?.tagger.add_tag(component, tag))
    }

    pub fn remove_tag(&self, id: ObjectId, component: &Instance) -> Result<bool> {
        Ok(self.state.borrow_mut().node_mut(id)?.tagger.remove_tag(component))
    }

    /// Snapshot of an object's tagger
    pub fn tagger(&self, id: ObjectId) -> Option<Tagger> {
        self.state.borrow().nodes.get(&id).map(|node| node.tagger.clone())
    }

    /// Create a context owned by `id` and attach it as a component
    ///
    /// Group contexts default to the object's group.
    pub fn attach_context(
        self: &Rc<Self>,
        id: ObjectId,
        options: ContextOptions,
        binder: &Rc<Binder>,
        registry: &Rc<ScopeRegistry>,
    ) -> Result<Rc<ContextBinder>> {
        let group = self.state.borrow().node(id)?.group.clone();
        let mut options = options.with_owner(id);
        if options.scope == Scope::Group && options.group.is_none() {
            options.group = Some(group);
        }

        self.track_registry(registry);
        let context = ContextBinder::create(options, binder, registry, &self.as_host());
        self.attach(id, context.as_instance())?;
        Ok(context)
    }

    /// Have `unload_group` reset this registry's per-group root search
    ///
    /// Done implicitly by [`attach_context`](Self::attach_context).
    pub fn track_registry(&self, registry: &Rc<ScopeRegistry>) {
        let mut known = self.registries.borrow_mut();
        if !known.iter().any(|r| r.as_ptr() == Rc::as_ptr(registry)) {
            known.push(Rc::downgrade(registry));
        }
    }
}

impl Host for SceneGraph {
    fn platform(&self) -> Platform {
        self.platform.get().unwrap_or_else(Platform::current)
    }

    fn find_first(&self, origin: ObjectId, query: &StructuralQuery) -> Option<Instance> {
        let state = self.state.borrow();
        let found = state
            .search_order(origin, query.mode)
            .into_iter()
            .filter(|id| query.include_inactive || state.active_in_hierarchy(*id))
            .filter_map(|id| state.nodes.get(&id))
            .find_map(|node| {
                node.components
                    .iter()
                    .find(|c| matches(node, c, query.capability, query.tag.as_ref()))
                    .cloned()
            });
        found
    }

    fn find_all(&self, origin: ObjectId, query: &StructuralQuery) -> Vec<Instance> {
        let state = self.state.borrow();
        let mut found = Vec::new();
        for id in state.search_order(origin, query.mode) {
            if !query.include_inactive && !state.active_in_hierarchy(id) {
                continue;
            }
            if let Some(node) = state.nodes.get(&id) {
                found.extend(
                    node.components
                        .iter()
                        .filter(|c| matches(node, c, query.capability, query.tag.as_ref()))
                        .cloned(),
                );
            }
        }
        found
    }

    fn find_live(&self, capability: CapabilityId, tag: Option<Tag>) -> Option<Instance> {
        let state = self.state.borrow();
        let found = state
            .nodes
            .iter()
            .filter(|(id, node)| {
                state.loaded_groups.contains(&node.group) && state.active_in_hierarchy(**id)
            })
            .find_map(|(_, node)| {
                node.components
                    .iter()
                    .find(|c| matches(node, c, capability, tag.as_ref()))
                    .cloned()
            });
        found
    }

    fn group_of(&self, object: ObjectId) -> Option<String> {
        self.state.borrow().nodes.get(&object).map(|node| node.group.clone())
    }

    fn is_group_loaded(&self, group: &str) -> bool {
        self.state.borrow().loaded_groups.iter().any(|g| g == group)
    }

    fn group_roots(&self, group: &str) -> Vec<ObjectId> {
        self.state.borrow().roots_of(group)
    }

    /// Moves the object's root, with its whole subtree, to the persistent group
    fn retain_across_groups(&self, object: ObjectId) {
        let mut state = self.state.borrow_mut();
        let Some(root) = state.ancestry(object).last().copied() else {
            return;
        };
        state.load(PERSISTENT_GROUP);
        state.set_group(root, PERSISTENT_GROUP);
        debug!(object = %object, "Object retained across group unloads");
    }

    fn describe(&self, object: ObjectId) -> String {
        self.name_of(object).unwrap_or_else(|| object.to_string())
    }
}
