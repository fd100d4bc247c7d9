//! Item handles and string identifier generation.
//!
//! [`ItemId`] is the in-process handle callers hold on to. It is allocated
//! from a monotonic counter and never reused within one tree, so a handle to a
//! removed item resolves to "not found" rather than to a newer item.
//!
//! The string identifier is what the rest of the host maps sockets by. It is
//! produced by [`IdentifierGenerator`] as `<prefix>_<n>`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable handle to an item in an [`InterfaceTree`](crate::tree::InterfaceTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Produces `<prefix>_<n>` identifiers that do not collide with existing ones.
///
/// The counter only moves forward, so a freshly removed identifier is not
/// handed out again by the same generator. Collision checks still run against
/// the caller's view of the tree because identifiers can also arrive through
/// deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentifierGenerator {
    next: u32,
}

impl IdentifierGenerator {
    /// Creates a generator starting at suffix 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next suffix that will be tried.
    pub fn next_suffix(&self) -> u32 {
        self.next
    }

    /// Generates an identifier for which `is_taken` returns `false`.
    pub fn generate(&mut self, prefix: &str, is_taken: impl Fn(&str) -> bool) -> String {
        loop {
            let candidate = format!("{}_{}", prefix, self.next);
            self.next = self.next.wrapping_add(1);
            if !is_taken(&candidate) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn item_id_display() {
        assert_eq!(format!("{}", ItemId(12)), "12");
    }

    #[test]
    fn generator_counts_up() {
        let mut gen = IdentifierGenerator::new();
        assert_eq!(gen.generate("Socket", |_| false), "Socket_0");
        assert_eq!(gen.generate("Panel", |_| false), "Panel_1");
        assert_eq!(gen.next_suffix(), 2);
    }

    #[test]
    fn generator_skips_taken_identifiers() {
        let taken: HashSet<&str> = ["Socket_0", "Socket_1", "Socket_3"].into_iter().collect();
        let mut gen = IdentifierGenerator::new();

        assert_eq!(gen.generate("Socket", |c| taken.contains(c)), "Socket_2");
        assert_eq!(gen.generate("Socket", |c| taken.contains(c)), "Socket_4");
    }

    #[test]
    fn serde_roundtrip() {
        let id = ItemId(9);
        let json = serde_json::to_string(&id).unwrap();
        let back: ItemId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
