//! Property tests for inventory normalization and pattern resolution.
//!
//! These exercise the invariants that `normalize` and `resolve_pattern` are
//! expected to hold for arbitrary well-formed inputs, rather than fixed
//! examples: normalizing a layer twice must be idempotent, and widening a
//! pattern with a union must never shrink the resolved host set.

use std::collections::BTreeSet;

use katmer::inventory::{normalize, resolve_pattern};
use proptest::collection::vec as pvec;
use proptest::prelude::*;
use serde_yaml::{Mapping, Value};

fn name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{1,6}".prop_filter("must not collide with a reserved inventory keyword", |s| {
        !matches!(s.as_str(), "all" | "children" | "settings" | "hosts" | "variables" | "environment")
    })
}

/// Builds an `all: children: {group: {hosts: {...}}}` layer from a small
/// set of distinct groups, each owning a disjoint slice of distinct hosts.
fn inventory_layer_strategy() -> impl Strategy<Value = Value> {
    pvec(name_strategy(), 1..4).prop_flat_map(|group_names| {
        let group_names: Vec<String> = group_names.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        let n = group_names.len();
        pvec(pvec(name_strategy(), 1..4), n).prop_map(move |host_lists| {
            let mut children = Mapping::new();
            // Prefix each host with its owning group so groups can never
            // collide down to an empty set, keeping every generated group
            // resolvable on its own.
            for (group, hosts) in group_names.iter().zip(host_lists.into_iter()) {
                let mut hosts_map = Mapping::new();
                let mut seen_in_group = BTreeSet::new();
                for host in hosts {
                    let qualified = format!("{group}_{host}");
                    if seen_in_group.insert(qualified.clone()) {
                        hosts_map.insert(Value::String(qualified), Value::Null);
                    }
                }
                let mut group_body = Mapping::new();
                group_body.insert(Value::String("hosts".to_string()), Value::Mapping(hosts_map));
                children.insert(Value::String(group.clone()), Value::Mapping(group_body));
            }
            let mut root_children = Mapping::new();
            root_children.insert(Value::String("children".to_string()), Value::Mapping(children));
            let mut root = Mapping::new();
            root.insert(Value::String("all".to_string()), Value::Mapping(root_children));
            Value::Mapping(root)
        })
    })
}

proptest! {
    #[test]
    fn normalization_is_idempotent(layer in inventory_layer_strategy()) {
        let once = normalize(std::slice::from_ref(&layer)).unwrap();
        let twice = normalize(&[layer.clone(), layer]).unwrap();

        let once_names: BTreeSet<_> = once.all_names.iter().cloned().collect();
        let twice_names: BTreeSet<_> = twice.all_names.iter().cloned().collect();
        prop_assert_eq!(once_names, twice_names);

        let once_hosts: BTreeSet<_> = once.hosts.keys().cloned().collect();
        let twice_hosts: BTreeSet<_> = twice.hosts.keys().cloned().collect();
        prop_assert_eq!(once_hosts, twice_hosts);

        for (name, members) in &once.groups {
            let once_members: BTreeSet<_> = members.iter().cloned().collect();
            let twice_members: BTreeSet<_> = twice
                .groups
                .get(name)
                .expect("group present in both normalizations")
                .iter()
                .cloned()
                .collect();
            prop_assert_eq!(once_members, twice_members);
        }
    }

    #[test]
    fn union_pattern_never_shrinks_resolution(layer in inventory_layer_strategy()) {
        let inventory = normalize(&[layer]).unwrap();
        let group_names: Vec<String> = inventory.groups.keys().cloned().collect();
        prop_assume!(group_names.len() >= 2);

        let a = resolve_pattern(&inventory, &group_names[0]).unwrap();
        let union_pattern = group_names.join(",");
        let union = resolve_pattern(&inventory, &union_pattern).unwrap();

        let a_set: BTreeSet<_> = a.into_iter().collect();
        let union_set: BTreeSet<_> = union.into_iter().collect();
        prop_assert!(a_set.is_subset(&union_set));

        for name in &union_set {
            prop_assert!(inventory.all_names.contains(name));
        }
    }
}
