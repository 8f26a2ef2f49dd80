//! # Entity Identity
//!
//! Entities are values of user types implementing [`Entity`]. Each live
//! entity is identified by an [`EntityId`] drawn from a reusable pool owned
//! by the entity manager.

use std::any::Any;
use std::fmt;

/// Dense identifier of a concrete entity type, used as the registry key.
pub type EntityTypeId = u32;

/// Unique identifier of a live entity.
///
/// Ids are dense indices into the manager's lookup table and are reused
/// after the entity is destroyed. [`EntityId::INVALID`] never names an
/// entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Sentinel id outside the valid range.
    pub const INVALID: Self = Self(u32::MAX);

    /// Creates an id from a lookup table index.
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the lookup table index of this id.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Checks whether this is the invalid sentinel.
    #[inline]
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            f.write_str("#invalid")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// Marker trait for entity types.
///
/// Every concrete entity type declares a unique, dense type id. Types that
/// share an id are rejected by the entity manager at first use.
///
/// # Example
///
/// ```rust,ignore
/// struct Projectile { speed: f32 }
///
/// impl Entity for Projectile {
///     const TYPE_ID: EntityTypeId = 3;
/// }
/// ```
pub trait Entity: Any {
    /// Unique identifier for this entity type.
    const TYPE_ID: EntityTypeId;

    /// Human readable type name used in logs and errors.
    #[must_use]
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Object-safe view of an entity of any type.
pub trait EntityObject: Any {
    /// Type id of the concrete entity type.
    fn entity_type_id(&self) -> EntityTypeId;

    /// Name of the concrete entity type.
    fn entity_type_name(&self) -> &'static str;

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Entity> EntityObject for T {
    fn entity_type_id(&self) -> EntityTypeId {
        T::TYPE_ID
    }

    fn entity_type_name(&self) -> &'static str {
        T::type_name()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<'a> dyn EntityObject + 'a {
    /// Checks whether the entity is a `T`.
    #[must_use]
    pub fn is<T: Entity>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Downcasts to the concrete entity type.
    #[must_use]
    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably downcasts to the concrete entity type.
    pub fn downcast_mut<T: Entity>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Crate;

    impl Entity for Crate {
        const TYPE_ID: EntityTypeId = 7;
    }

    #[test]
    fn test_entity_id_sentinel() {
        assert!(EntityId::INVALID.is_invalid());
        assert!(EntityId::default().is_invalid());
        assert!(!EntityId::new(0).is_invalid());
        assert_eq!(EntityId::new(12).index(), 12);
    }

    #[test]
    fn test_entity_id_display() {
        assert_eq!(EntityId::new(4).to_string(), "#4");
        assert_eq!(EntityId::INVALID.to_string(), "#invalid");
    }

    #[test]
    fn test_erased_downcast() {
        let boxed: Box<dyn EntityObject> = Box::new(Crate);
        assert_eq!(boxed.entity_type_id(), 7);
        assert!(boxed.is::<Crate>());
        assert!(boxed.downcast_ref::<Crate>().is_some());
        assert!(boxed.entity_type_name().ends_with("Crate"));
    }
}
