//! Surface identities, interaction traits, and the child-surface stack.

use std::fmt::Display;

use bitflags::bitflags;
use uuid::Uuid;

/// A unique identifier for a web surface, represented as a UUID.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(Uuid);

impl SurfaceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SurfaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags! {
    /// Interaction traits applied to a surface at creation time.
    pub struct SurfaceTraits: u8 {
        /// Pinch/gesture zoom enabled.
        const ALLOW_ZOOM     = 0b001;
        /// Scroll bounce enabled.
        const BOUNCE         = 0b010;
        /// Back/forward edge-swipe navigation enabled.
        const EDGE_SWIPE_NAV = 0b100;
    }
}

impl SurfaceTraits {
    /// The standard surface setup: no zoom, no bounce, edge swipe on.
    /// Children are configured identically to the primary.
    pub fn standard() -> Self {
        SurfaceTraits::EDGE_SWIPE_NAV
    }
}

/// Ordered stack of child (popup) surfaces, last-in-first-out. The primary
/// surface is never part of this stack, and entries leave in reverse
/// creation order only.
#[derive(Debug, Default)]
pub struct SurfaceStack {
    entries: Vec<SurfaceId>,
}

impl SurfaceStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, surface: SurfaceId) {
        self.entries.push(surface);
    }

    /// Removes and returns the topmost child.
    pub fn pop(&mut self) -> Option<SurfaceId> {
        self.entries.pop()
    }

    /// The topmost child without removing it.
    pub fn top(&self) -> Option<SurfaceId> {
        self.entries.last().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, surface: SurfaceId) -> bool {
        self.entries.contains(&surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_is_lifo() {
        let mut stack = SurfaceStack::new();
        let a = SurfaceId::new();
        let b = SurfaceId::new();

        stack.push(a);
        stack.push(b);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.top(), Some(b));

        assert_eq!(stack.pop(), Some(b));
        assert_eq!(stack.pop(), Some(a));
        assert_eq!(stack.pop(), None);
        assert!(stack.is_empty());
    }

    #[test]
    fn standard_traits_disable_zoom_and_bounce() {
        let traits = SurfaceTraits::standard();
        assert!(!traits.contains(SurfaceTraits::ALLOW_ZOOM));
        assert!(!traits.contains(SurfaceTraits::BOUNCE));
        assert!(traits.contains(SurfaceTraits::EDGE_SWIPE_NAV));
    }
}
