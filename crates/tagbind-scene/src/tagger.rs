//! Per-object component tags

use tagbind_common::{CapabilityId, Tag};
use tagbind_di::Instance;
use tracing::info;

/// A component paired with one of its tags
#[derive(Debug, Clone)]
pub struct TaggedComponent {
    pub component: Instance,
    pub tag: Tag,
}

/// Tags attached to the components of one object
///
/// A component may carry several tags; each (component, tag) pair is
/// stored once.
#[derive(Debug, Default, Clone)]
pub struct Tagger {
    tags: Vec<TaggedComponent>,
}

impl Tagger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Components of exactly `concrete` type carrying `tag`
    pub fn find(&self, concrete: CapabilityId, tag: &Tag) -> impl Iterator<Item = &Instance> + '_ {
        let tag = tag.clone();
        self.tags
            .iter()
            .filter(move |entry| entry.component.concrete() == concrete && entry.tag == tag)
            .map(|entry| &entry.component)
    }

    /// First entry for `component`
    pub fn find_component(&self, component: &Instance) -> Option<&TaggedComponent> {
        self.tags.iter().find(|entry| entry.component.ptr_eq(component))
    }

    pub fn has_tag(&self, component: &Instance, tag: &Tag) -> bool {
        self.tags
            .iter()
            .any(|entry| entry.component.ptr_eq(component) && &entry.tag == tag)
    }

    /// Display form of the component's first tag
    pub fn tag_of(&self, component: &Instance) -> Option<String> {
        self.find_component(component).map(|entry| entry.tag.to_string())
    }

    /// Attach `tag` to `component`; returns `false` if the pair exists
    pub fn add_tag(&mut self, component: &Instance, tag: Tag) -> bool {
        if self.has_tag(component, &tag) {
            return false;
        }
        self.tags.push(TaggedComponent {
            component: component.clone(),
            tag,
        });
        true
    }

    /// Remove the component's first tag
    pub fn remove_tag(&mut self, component: &Instance) -> bool {
        match self.tags.iter().position(|entry| entry.component.ptr_eq(component)) {
            Some(index) => {
                self.tags.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn remove_all_tags(&mut self, component: &Instance) -> usize {
        let before = self.tags.len();
        self.tags.retain(|entry| !entry.component.ptr_eq(component));
        before - self.tags.len()
    }

    pub fn log_all_tags(&self, component: &Instance) {
        for entry in self.tags.iter().filter(|entry| entry.component.ptr_eq(component)) {
            info!(component = %entry.component.type_name(), tag = %entry.tag, "Component tag");
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaggedComponent> + '_ {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
