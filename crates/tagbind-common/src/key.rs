//! Capability identifiers and the composite lookup key

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::tag::Tag;

/// Identity of a capability: a concrete type or a trait object type
///
/// Equality and hashing use the `TypeId` only; the name is kept for
/// diagnostics.
#[derive(Clone, Copy)]
pub struct CapabilityId {
    type_id: TypeId,
    name: &'static str,
}

impl CapabilityId {
    /// Capability id for `T`, which may be unsized (`dyn Trait`)
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name, for compact log lines
    pub fn short_name(&self) -> &'static str {
        let trimmed = self.name.trim_start_matches("dyn ");
        let base = trimmed.split('<').next().unwrap_or(trimmed);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for CapabilityId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for CapabilityId {}

impl Hash for CapabilityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CapabilityId").field(&self.name).finish()
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Composite (capability, tag) key used by every registry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    pub capability: CapabilityId,
    pub tag: Tag,
}

impl Key {
    pub fn new(capability: CapabilityId, tag: Tag) -> Self {
        Self { capability, tag }
    }

    pub fn of<T: ?Sized + 'static>(tag: Tag) -> Self {
        Self::new(CapabilityId::of::<T>(), tag)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.capability.short_name(), self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    trait Audio {}
    struct Speaker;
    struct Headphones;

    #[test]
    fn test_trait_objects_have_capability_ids() {
        let audio = CapabilityId::of::<dyn Audio>();
        assert_eq!(audio, CapabilityId::of::<dyn Audio>());
        assert_ne!(audio, CapabilityId::of::<Speaker>());
        assert_eq!(audio.short_name(), "Audio");
        assert_eq!(CapabilityId::of::<Speaker>().short_name(), "Speaker");
    }

    #[test]
    fn test_short_name_strips_generics() {
        assert_eq!(CapabilityId::of::<Vec<u8>>().short_name(), "Vec");
    }

    #[test]
    fn test_key_equality_ignores_tag_names() {
        let a = Key::of::<Speaker>(Tag::named(3, "Left"));
        let b = Key::of::<Speaker>(Tag::from_id(3));
        assert_eq!(a, b);
        assert_ne!(a, Key::of::<Headphones>(Tag::from_id(3)));
        assert_ne!(a, Key::of::<Speaker>(Tag::from_id(4)));
    }

    proptest! {
        #[test]
        fn test_key_equal_iff_parts_equal(t1 in 0..2usize, t2 in 0..2usize, g1 in -3i32..3, g2 in -3i32..3) {
            let caps = [CapabilityId::of::<Speaker>(), CapabilityId::of::<dyn Audio>()];
            let k1 = Key::new(caps[t1], Tag::from_id(g1));
            let k2 = Key::new(caps[t2], Tag::from_id(g2));
            prop_assert_eq!(k1 == k2, t1 == t2 && g1 == g2);
        }

        #[test]
        fn test_tag_equal_iff_ids_equal(a in any::<i32>(), b in any::<i32>(), name in "[a-z]{0,8}") {
            let left = Tag::named(a, name.as_str());
            let right = Tag::from_id(b);
            prop_assert_eq!(left == right, a == b);
        }
    }
}
