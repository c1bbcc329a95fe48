//! Group definitions for the target inventory: a named set of host labels
//! plus group-level settings/variables/environment and child-group references.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

/// A group of hosts with its own settings/variables/environment and
/// references to child groups (by name; children are defined as sibling
/// top-level groups, not nested inline).
#[derive(Debug, Clone, Default)]
pub struct Group {
    pub name: String,
    pub hosts: HashSet<String>,
    pub children: HashSet<String>,
    /// Connection-shaped overrides (`connection`, `hostname`, `port`, …)
    /// merged into each member host, host-specific keys winning.
    pub settings: Mapping,
    pub variables: IndexMap<String, Value>,
    pub environment: IndexMap<String, Value>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_host(&mut self, host: impl Into<String>) {
        self.hosts.insert(host.into());
    }

    pub fn add_child(&mut self, child: impl Into<String>) {
        self.children.insert(child.into());
    }

    pub fn has_host(&self, host: &str) -> bool {
        self.hosts.contains(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_group_is_empty() {
        let group = Group::new("webservers");
        assert!(group.hosts.is_empty());
        assert!(group.children.is_empty());
    }

    #[test]
    fn add_host_and_child() {
        let mut group = Group::new("production");
        group.add_host("web1");
        group.add_child("webservers");
        assert!(group.has_host("web1"));
        assert!(group.children.contains("webservers"));
    }
}
