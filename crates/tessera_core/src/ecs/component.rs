//! # Component Types
//!
//! Components are plain data owned by their type's collection. The runtime
//! never looks inside a payload; it only needs to create, clone and drop it.

use std::fmt;

/// Marker trait for component payloads.
///
/// Components must be:
/// - `Clone`: entity cloning duplicates every attached payload
/// - `Default`: creation by type id or by name builds a default payload
///
/// # Example
///
/// ```rust
/// use tessera_core::Component;
///
/// #[derive(Clone, Default)]
/// struct Health {
///     current: u32,
///     max: u32,
/// }
///
/// impl Component for Health {
///     const NAME: &'static str = "Health";
/// }
/// ```
pub trait Component: Clone + Default + 'static {
    /// Unique registration name for this component type.
    ///
    /// Used by the name registry (`create_component_by_name`).
    const NAME: &'static str;
}

/// Dense id assigned to a component type at registration.
///
/// Ids are handed out in registration order starting at zero, so they
/// index the manager's collection table directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ComponentTypeId(u16);

impl ComponentTypeId {
    /// Sentinel for "no such type". Returned by lookups of unregistered names.
    pub const INVALID: Self = Self(u16::MAX);

    /// Creates an id from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Returns the id as a table index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Checks that this is not the [`INVALID`](Self::INVALID) sentinel.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != u16::MAX
    }
}

impl Default for ComponentTypeId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "#{}", self.0)
        } else {
            f.write_str("#invalid")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_sentinel() {
        assert!(!ComponentTypeId::INVALID.is_valid());
        assert!(!ComponentTypeId::default().is_valid());
        assert!(ComponentTypeId::new(0).is_valid());
        assert_eq!(ComponentTypeId::new(3).index(), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(ComponentTypeId::new(7).to_string(), "#7");
        assert_eq!(ComponentTypeId::INVALID.to_string(), "#invalid");
    }
}
