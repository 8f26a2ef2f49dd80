//! # System Interface
//!
//! What the system manager consumes from a unit of per-frame logic.

use std::any::Any;
use std::fmt;

/// Scheduling priority of a system.
///
/// Only compared between independent groups: a group runs at the priority
/// of its highest member, and higher priorities run first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SystemPriority(pub u16);

impl SystemPriority {
    /// Runs after everything else.
    pub const LOWEST: Self = Self(u16::MIN);
    /// Very low priority.
    pub const VERY_LOW: Self = Self(99);
    /// Low priority.
    pub const LOW: Self = Self(100);
    /// Default priority.
    pub const NORMAL: Self = Self(200);
    /// Medium priority.
    pub const MEDIUM: Self = Self(300);
    /// High priority.
    pub const HIGH: Self = Self(400);
    /// Very high priority.
    pub const VERY_HIGH: Self = Self(401);
    /// Runs before everything else.
    pub const HIGHEST: Self = Self(u16::MAX);
}

impl Default for SystemPriority {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for SystemPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Dense index of a registered system.
///
/// Assigned in registration order; doubles as the row and column of the
/// system in the dependency matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SystemTypeId(u32);

impl SystemTypeId {
    /// Creates an id from a dependency matrix index.
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Dependency matrix index of this system.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SystemTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "system#{}", self.0)
    }
}

/// A unit of per-frame logic driven by the system manager.
///
/// All passes default to no-ops. `priority` and `update_interval` are read
/// once at registration; the manager owns the values afterwards.
///
/// `dt` is the frame time in milliseconds.
///
/// # Example
///
/// ```rust,ignore
/// struct Movement;
///
/// impl System for Movement {
///     fn update(&mut self, dt: f64) {
///         // integrate velocities
///     }
///
///     fn priority(&self) -> SystemPriority {
///         SystemPriority::HIGH
///     }
/// }
/// ```
pub trait System: Any {
    /// Runs before any system's `update` this frame.
    fn pre_update(&mut self, _dt: f64) {}

    /// Main per-frame work.
    fn update(&mut self, _dt: f64) {}

    /// Runs after every system's `update` this frame.
    fn post_update(&mut self, _dt: f64) {}

    /// Name used in logs and errors.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Initial priority.
    fn priority(&self) -> SystemPriority {
        SystemPriority::NORMAL
    }

    /// Initial update interval in milliseconds; `None` runs every frame.
    fn update_interval(&self) -> Option<f64> {
        None
    }
}

/// Object-safe view used by the manager to drive and downcast systems.
pub(crate) trait SystemObject: Any {
    fn run_pre_update(&mut self, dt: f64);
    fn run_update(&mut self, dt: f64);
    fn run_post_update(&mut self, dt: f64);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<S: System> SystemObject for S {
    fn run_pre_update(&mut self, dt: f64) {
        self.pre_update(dt);
    }

    fn run_update(&mut self, dt: f64) {
        self.update(dt);
    }

    fn run_post_update(&mut self, dt: f64) {
        self.post_update(dt);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Idle;

    impl System for Idle {}

    #[test]
    fn test_priority_ordering() {
        assert!(SystemPriority::LOWEST < SystemPriority::VERY_LOW);
        assert!(SystemPriority::VERY_LOW < SystemPriority::LOW);
        assert!(SystemPriority::LOW < SystemPriority::NORMAL);
        assert!(SystemPriority::NORMAL < SystemPriority::MEDIUM);
        assert!(SystemPriority::MEDIUM < SystemPriority::HIGH);
        assert!(SystemPriority::HIGH < SystemPriority::VERY_HIGH);
        assert!(SystemPriority::VERY_HIGH < SystemPriority::HIGHEST);
        assert_eq!(SystemPriority::default(), SystemPriority::NORMAL);
    }

    #[test]
    fn test_system_defaults() {
        let mut idle = Idle;
        idle.update(16.0);
        assert!(idle.name().ends_with("Idle"));
        assert_eq!(idle.priority(), SystemPriority::NORMAL);
        assert!(idle.update_interval().is_none());

        let erased: Box<dyn SystemObject> = Box::new(Idle);
        assert!(erased.as_any().is::<Idle>());
    }
}
