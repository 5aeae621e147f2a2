//! Well-known slots for process- and group-scoped contexts

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, info};

use crate::context::ContextBinder;

/// Registry key of a shared context
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeSlot {
    Process,
    Group(String),
}

impl fmt::Display for ScopeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeSlot::Process => f.write_str("process"),
            ScopeSlot::Group(name) => write!(f, "group:{}", name),
        }
    }
}

/// Weak index of the contexts reachable without an owner link
///
/// Holds no strong references: a context that is dropped simply stops
/// being found.
#[derive(Default)]
pub struct ScopeRegistry {
    slots: RefCell<HashMap<ScopeSlot, Weak<ContextBinder>>>,
    scanned_groups: RefCell<HashSet<String>>,
}

impl ScopeRegistry {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Claim `slot` for `context`; fails if a live context already holds it
    pub fn register(&self, slot: ScopeSlot, context: &Rc<ContextBinder>) -> bool {
        let mut slots = self.slots.borrow_mut();
        if let Some(existing) = slots.get(&slot) {
            if existing.strong_count() > 0 {
                return false;
            }
        }
        debug!(slot = %slot, "Registered context");
        slots.insert(slot, Rc::downgrade(context));
        true
    }

    /// Drop every slot held by `context`
    pub fn deregister(&self, context: &ContextBinder) -> Vec<ScopeSlot> {
        let target = context as *const ContextBinder;
        let mut removed = Vec::new();
        self.slots.borrow_mut().retain(|slot, entry| {
            let keep = entry.as_ptr() != target && entry.strong_count() > 0;
            if entry.as_ptr() == target {
                removed.push(slot.clone());
            }
            keep
        });
        for slot in &removed {
            debug!(slot = %slot, "Deregistered context");
        }
        removed
    }

    pub fn get(&self, slot: &ScopeSlot) -> Option<Rc<ContextBinder>> {
        self.slots.borrow().get(slot).and_then(Weak::upgrade)
    }

    pub fn process_context(&self) -> Option<Rc<ContextBinder>> {
        self.get(&ScopeSlot::Process)
    }

    pub fn group_context(&self, group: &str) -> Option<Rc<ContextBinder>> {
        self.get(&ScopeSlot::Group(group.to_string()))
    }

    /// Live registered contexts
    pub fn contexts(&self) -> Vec<(ScopeSlot, Rc<ContextBinder>)> {
        self.slots
            .borrow()
            .iter()
            .filter_map(|(slot, entry)| entry.upgrade().map(|context| (slot.clone(), context)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().values().filter(|entry| entry.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record that `group`'s roots were searched for a context
    ///
    /// Returns `false` if the group had already been searched.
    pub(crate) fn mark_scanned(&self, group: &str) -> bool {
        self.scanned_groups.borrow_mut().insert(group.to_string())
    }

    /// Allow another root search for `group`, e.g. after it is reloaded
    pub fn forget_group(&self, group: &str) {
        self.scanned_groups.borrow_mut().remove(group);
        self.slots.borrow_mut().retain(|slot, entry| {
            *slot != ScopeSlot::Group(group.to_string()) || entry.strong_count() > 0
        });
    }

    /// Tear down every registered context
    pub fn shutdown(&self) {
        let contexts = self.contexts();
        info!(contexts = contexts.len(), "Shutting down scope registry");
        for (_, context) in &contexts {
            context.teardown();
        }
        self.slots.borrow_mut().clear();
        self.scanned_groups.borrow_mut().clear();
    }
}
