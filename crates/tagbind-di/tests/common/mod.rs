//! Minimal in-memory host shared by the integration tests

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use tagbind_common::{CapabilityId, Platform, Tag};
use tagbind_di::*;

#[derive(Default)]
struct Object {
    name: String,
    group: String,
    parent: Option<ObjectId>,
    active: bool,
    components: Vec<(Instance, Tag)>,
}

pub struct TestHost {
    objects: RefCell<BTreeMap<ObjectId, Object>>,
    next_id: Cell<u64>,
    platform: Cell<Platform>,
    active_group: RefCell<String>,
    retained: RefCell<Vec<ObjectId>>,
}

impl TestHost {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            objects: RefCell::new(BTreeMap::new()),
            next_id: Cell::new(1),
            platform: Cell::new(Platform::Linux),
            active_group: RefCell::new("main".to_string()),
            retained: RefCell::new(Vec::new()),
        })
    }

    pub fn as_host(self: &Rc<Self>) -> Rc<dyn Host> {
        Rc::clone(self) as Rc<dyn Host>
    }

    pub fn set_platform(&self, platform: Platform) {
        self.platform.set(platform);
    }

    pub fn spawn(&self, name: &str, parent: Option<ObjectId>) -> ObjectId {
        let id = ObjectId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let group = match parent {
            Some(parent) => self.objects.borrow()[&parent].group.clone(),
            None => self.active_group.borrow().clone(),
        };
        self.objects.borrow_mut().insert(
            id,
            Object {
                name: name.to_string(),
                group,
                parent,
                active: true,
                ..Object::default()
            },
        );
        id
    }

    pub fn attach(&self, object: ObjectId, instance: Instance, tag: Tag) {
        if let Some(found) = self.objects.borrow_mut().get_mut(&object) {
            found.components.push((instance, tag));
        }
    }

    pub fn set_active(&self, object: ObjectId, active: bool) {
        if let Some(found) = self.objects.borrow_mut().get_mut(&object) {
            found.active = active;
        }
    }

    pub fn retained(&self) -> Vec<ObjectId> {
        self.retained.borrow().clone()
    }

    fn matches(component: &(Instance, Tag), query_capability: CapabilityId, tag: &Option<Tag>) -> bool {
        component.0.provides(query_capability) && tag.as_ref().map_or(true, |t| &component.1 == t)
    }

    fn candidates(&self, origin: ObjectId, mode: SearchMode) -> Vec<ObjectId> {
        let objects = self.objects.borrow();
        match mode {
            SearchMode::OnSelf => vec![origin],
            SearchMode::Parent => {
                let mut chain = Vec::new();
                let mut cursor = Some(origin);
                while let Some(id) = cursor {
                    chain.push(id);
                    cursor = objects.get(&id).and_then(|o| o.parent);
                }
                chain
            }
            SearchMode::Children => {
                let mut order = Vec::new();
                let mut stack = vec![origin];
                while let Some(id) = stack.pop() {
                    order.push(id);
                    let mut children: Vec<ObjectId> = objects
                        .iter()
                        .filter(|(_, o)| o.parent == Some(id))
                        .map(|(child, _)| *child)
                        .collect();
                    children.reverse();
                    stack.extend(children);
                }
                order
            }
            SearchMode::InActiveGroup => {
                let group = self.active_group.borrow();
                objects
                    .iter()
                    .filter(|(_, o)| o.group == *group)
                    .map(|(id, _)| *id)
                    .collect()
            }
        }
    }
}

impl Host for TestHost {
    fn platform(&self) -> Platform {
        self.platform.get()
    }

    fn find_first(&self, origin: ObjectId, query: &StructuralQuery) -> Option<Instance> {
        self.find_all(origin, query).into_iter().next()
    }

    fn find_all(&self, origin: ObjectId, query: &StructuralQuery) -> Vec<Instance> {
        let candidates = self.candidates(origin, query.mode);
        let objects = self.objects.borrow();
        candidates
            .iter()
            .filter_map(|id| objects.get(id))
            .filter(|o| o.active || query.include_inactive)
            .flat_map(|o| o.components.iter())
            .filter(|c| Self::matches(c, query.capability, &query.tag))
            .map(|c| c.0.clone())
            .collect()
    }

    fn find_live(&self, capability: CapabilityId, tag: Option<Tag>) -> Option<Instance> {
        self.objects
            .borrow()
            .values()
            .filter(|o| o.active)
            .flat_map(|o| o.components.iter())
            .find(|c| Self::matches(c, capability, &tag))
            .map(|c| c.0.clone())
    }

    fn group_of(&self, object: ObjectId) -> Option<String> {
        self.objects.borrow().get(&object).map(|o| o.group.clone())
    }

    fn is_group_loaded(&self, group: &str) -> bool {
        self.objects.borrow().values().any(|o| o.group == group)
    }

    fn group_roots(&self, group: &str) -> Vec<ObjectId> {
        self.objects
            .borrow()
            .iter()
            .filter(|(_, o)| o.parent.is_none() && o.group == group)
            .map(|(id, _)| *id)
            .collect()
    }

    fn retain_across_groups(&self, object: ObjectId) {
        self.retained.borrow_mut().push(object);
    }

    fn describe(&self, object: ObjectId) -> String {
        self.objects
            .borrow()
            .get(&object)
            .map(|o| o.name.clone())
            .unwrap_or_else(|| object.to_string())
    }
}

// Shared fixtures

pub trait Logger {
    fn name(&self) -> &'static str;
}

#[derive(Default)]
pub struct ConsoleLogger {
    pub created: Cell<u32>,
    pub destroyed: Rc<Cell<u32>>,
}

impl Logger for ConsoleLogger {
    fn name(&self) -> &'static str {
        "console"
    }
}

impl Initializable for ConsoleLogger {
    fn on_created(&self) {
        self.created.set(self.created.get() + 1);
    }
}

impl Destroyable for ConsoleLogger {
    fn on_destroyed(&self) {
        self.destroyed.set(self.destroyed.get() + 1);
    }
}

pub struct NullLogger;

impl Logger for NullLogger {
    fn name(&self) -> &'static str {
        "null"
    }
}

pub fn console_logger() -> Rc<Implementation> {
    Implementation::builder::<ConsoleLogger>("ConsoleLogger")
        .provides::<dyn Logger>(|c| c as Rc<dyn Logger>)
        .initializable()
        .destroyable()
        .factory(|_| ConsoleLogger::default())
        .build()
}

pub fn null_logger() -> Rc<Implementation> {
    Implementation::builder::<NullLogger>("NullLogger")
        .provides::<dyn Logger>(|n| n as Rc<dyn Logger>)
        .factory(|_| NullLogger)
        .build()
}

pub fn logger_binder() -> Rc<Binder> {
    Rc::new(Binder::new(
        "loggers",
        vec![
            Binding::new::<dyn Logger>(&console_logger()).excluding([Platform::Windows]),
            Binding::new::<dyn Logger>(&null_logger()),
        ],
    ))
}
