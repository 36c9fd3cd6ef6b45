//! Strategy lookup by identifier.

use std::collections::BTreeMap;
use std::fmt;

use super::{AllocationStrategy, ProportionalFair, RoundRobin};

type StrategyFactory = Box<dyn Fn() -> Box<dyn AllocationStrategy> + Send + Sync>;

/// Maps strategy identifiers to constructors.
///
/// Built once at startup and immutable afterwards; each scheduler instance
/// creates its own strategy so cross-TTI state is never shared.
pub struct StrategyRegistry {
    factories: BTreeMap<String, StrategyFactory>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl StrategyRegistry {
    /// Registry with the built-in strategies.
    pub fn builtin() -> Self {
        Self::empty()
            .with("round-robin", || Box::new(RoundRobin::new()))
            .with("proportional-fair", || Box::new(ProportionalFair::new()))
    }

    /// Registry with no strategies registered.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Adds a strategy constructor under `id`, replacing any previous
    /// registration.
    pub fn with<F>(mut self, id: &str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn AllocationStrategy> + Send + Sync + 'static,
    {
        self.factories.insert(id.to_owned(), Box::new(factory));
        self
    }

    /// Creates a fresh strategy instance, `None` for unknown identifiers.
    pub fn create(&self, id: &str) -> Option<Box<dyn AllocationStrategy>> {
        self.factories.get(id).map(|f| f())
    }

    /// Registered identifiers in sorted order.
    pub fn ids(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let registry = StrategyRegistry::builtin();
        assert_eq!(registry.ids(), vec!["proportional-fair", "round-robin"]);
        assert_eq!(registry.create("round-robin").unwrap().name(), "round-robin");
        assert_eq!(
            registry.create("proportional-fair").unwrap().name(),
            "proportional-fair"
        );
        assert!(registry.create("max-throughput").is_none());
    }

    #[test]
    fn test_instances_are_independent() {
        let registry = StrategyRegistry::builtin();
        let a = registry.create("round-robin").unwrap();
        let b = registry.create("round-robin").unwrap();
        // Distinct boxes, not shared state
        assert!(!std::ptr::eq(a.as_ref(), b.as_ref()));
    }

    #[test]
    fn test_custom_registration() {
        let registry = StrategyRegistry::empty().with("rr", || Box::new(RoundRobin::new()));
        assert!(registry.create("rr").is_some());
        assert!(registry.create("round-robin").is_none());
    }
}
