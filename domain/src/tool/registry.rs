//! Tool registry — name to descriptor mapping with last-write-wins merge.

use super::entities::ToolDescriptor;
use std::collections::HashMap;

/// Registry of every invokable tool, local and remote.
///
/// Registration is last-write-wins: a later descriptor under the same name
/// replaces the earlier one, and [`register`](Self::register) hands the
/// shadowed descriptor back so the caller can warn exactly once per
/// collision. The registry itself stays pure — it never logs.
#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Returns the previously registered descriptor if this
    /// name was already taken.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Option<ToolDescriptor> {
        self.tools.insert(descriptor.name.clone(), descriptor)
    }

    /// Look up a tool by exact name. O(1); `None` means the name is unknown
    /// to the whole system, not just unreachable.
    pub fn resolve(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All descriptors, sorted by name. Stable ordering keeps prompt
    /// rendering and `--list-tools` output deterministic.
    pub fn catalog(&self) -> Vec<&ToolDescriptor> {
        let mut tools: Vec<&ToolDescriptor> = self.tools.values().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::entities::ToolOwner;

    #[test]
    fn test_register_and_resolve() {
        let mut registry = ToolRegistry::new();
        assert!(registry.register(ToolDescriptor::local("ping", "liveness probe")).is_none());

        let tool = registry.resolve("ping").unwrap();
        assert_eq!(tool.owner, ToolOwner::Local);
        assert!(registry.resolve("missing").is_none());
    }

    #[test]
    fn test_last_write_wins_reports_shadowed() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolDescriptor::local("ping", "liveness probe"));

        let shadowed = registry
            .register(ToolDescriptor::remote("ping", "remote ping", "tracker"))
            .expect("first registration should be reported");
        assert_eq!(shadowed.owner, ToolOwner::Local);

        // The later registration is the live one.
        assert_eq!(
            registry.resolve("ping").unwrap().owner,
            ToolOwner::Server("tracker".into())
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_catalog_is_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolDescriptor::remote("update_issue", "", "tracker"));
        registry.register(ToolDescriptor::local("ping", ""));
        registry.register(ToolDescriptor::remote("get_issue", "", "tracker"));

        let names: Vec<&str> = registry.catalog().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["get_issue", "ping", "update_issue"]);
    }
}
