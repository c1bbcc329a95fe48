//! Target inventory: normalizes grouped/ungrouped host maps into a flat
//! `{all_names, groups, hosts}` structure and resolves selection patterns
//! against it. See [`normalize`] and [`resolve_pattern`].

pub mod group;
pub mod host;

pub use group::Group;
pub use host::ResolvedHost;

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};
use crate::provider::{build_provider, ensure_ready, safe_shutdown, Provider};

/// One group/root node as it appears in a single input layer, before
/// cross-group merging.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawNode {
    #[serde(default)]
    hosts: IndexMap<String, Value>,
    #[serde(default)]
    settings: Value,
    #[serde(default)]
    variables: IndexMap<String, Value>,
    #[serde(default)]
    environment: IndexMap<String, Value>,
    #[serde(default)]
    children: Value,
}

#[derive(Debug, Clone, Default)]
struct GroupAccum {
    settings: Value,
    variables: IndexMap<String, Value>,
    environment: IndexMap<String, Value>,
    children: IndexSet<String>,
}

#[derive(Debug, Clone, Default)]
struct HostAccum {
    entry: Value,
    groups: IndexSet<String>,
}

/// The normalized inventory: every group/host name known, each group's
/// recursively-expanded host membership, and every host's merged connection
/// descriptor + variables/environment.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub all_names: IndexSet<String>,
    pub groups: IndexMap<String, IndexSet<String>>,
    pub hosts: IndexMap<String, ResolvedHost>,
}

/// Normalize one or more input layers (base config first, overrides last;
/// later layers win key-by-key) into an [`Inventory`].
pub fn normalize(layers: &[Value]) -> Result<Inventory> {
    let mut group_raw: IndexMap<String, GroupAccum> = IndexMap::new();
    let mut host_raw: IndexMap<String, HostAccum> = IndexMap::new();

    for layer in layers {
        apply_layer(layer, &mut group_raw, &mut host_raw)?;
    }

    for (name, accum) in &group_raw {
        for child in &accum.children {
            if !group_raw.contains_key(child) {
                return Err(Error::config(format!(
                    "group '{name}' references undefined child group '{child}'"
                )));
            }
        }
    }

    let group_effective = propagate_group_hierarchy(&group_raw);

    let mut hosts = IndexMap::new();
    for (host_name, accum) in &host_raw {
        let mut settings = Value::Null;
        let mut variables = IndexMap::new();
        let mut environment = IndexMap::new();
        for group_name in &accum.groups {
            if let Some(eff) = group_effective.get(group_name) {
                settings = deep_merge(settings, eff.settings.clone());
                deep_merge_indexmap(&mut variables, &eff.variables);
                shallow_merge_indexmap(&mut environment, &eff.environment);
            }
        }
        settings = deep_merge(settings, accum.entry.clone());
        let mapping = as_mapping(&settings);
        let descriptor = host::descriptor_from_settings(host_name, &mapping);
        hosts.insert(
            host_name.clone(),
            ResolvedHost {
                name: host_name.clone(),
                descriptor,
                variables,
                environment,
            },
        );
    }

    let mut groups: IndexMap<String, IndexSet<String>> = IndexMap::new();
    for name in group_raw.keys() {
        let mut visiting = HashSet::new();
        let expanded = expand_group_hosts(name, &group_raw, &host_raw, &mut visiting);
        groups.insert(name.clone(), expanded);
    }

    let mut all_names: IndexSet<String> = IndexSet::new();
    all_names.extend(group_raw.keys().cloned());
    all_names.extend(host_raw.keys().cloned());

    Ok(Inventory {
        all_names,
        groups,
        hosts,
    })
}

fn expand_group_hosts(
    name: &str,
    group_raw: &IndexMap<String, GroupAccum>,
    host_raw: &IndexMap<String, HostAccum>,
    visiting: &mut HashSet<String>,
) -> IndexSet<String> {
    let mut result = IndexSet::new();
    if !visiting.insert(name.to_string()) {
        return result;
    }
    for (host_name, accum) in host_raw {
        if accum.groups.contains(name) {
            result.insert(host_name.clone());
        }
    }
    if let Some(group) = group_raw.get(name) {
        for child in &group.children {
            result.extend(expand_group_hosts(child, group_raw, host_raw, visiting));
        }
    }
    visiting.remove(name);
    result
}

/// Flow settings/variables/environment from each group down through its
/// declared children until a fixpoint is reached (bounded by group count so
/// an accidental cycle still terminates).
fn propagate_group_hierarchy(
    group_raw: &IndexMap<String, GroupAccum>,
) -> IndexMap<String, GroupAccum> {
    let mut effective = group_raw.clone();
    let edges: Vec<(String, String)> = group_raw
        .iter()
        .flat_map(|(name, accum)| accum.children.iter().map(move |c| (name.clone(), c.clone())))
        .collect();

    for _ in 0..=group_raw.len() {
        for (parent, child) in &edges {
            let Some(parent_eff) = effective.get(parent).cloned() else {
                continue;
            };
            let Some(child_eff) = effective.get_mut(child) else {
                continue;
            };
            child_eff.settings = deep_merge(parent_eff.settings.clone(), child_eff.settings.clone());
            let mut vars = parent_eff.variables.clone();
            deep_merge_indexmap(&mut vars, &child_eff.variables);
            child_eff.variables = vars;
            let mut env = parent_eff.environment.clone();
            shallow_merge_indexmap(&mut env, &child_eff.environment);
            child_eff.environment = env;
        }
    }
    effective
}

fn apply_layer(
    layer: &Value,
    group_raw: &mut IndexMap<String, GroupAccum>,
    host_raw: &mut IndexMap<String, HostAccum>,
) -> Result<()> {
    let top = as_mapping(layer);
    if is_root_form(&top) {
        let node = node_from_mapping(&top)?;
        apply_node("ungrouped", &node, group_raw, host_raw)?;
    } else {
        for (key, value) in &top {
            let name = key
                .as_str()
                .ok_or_else(|| Error::config("inventory group names must be strings"))?;
            if host::is_reserved(name) {
                return Err(Error::config(format!("'{name}' is a reserved keyword and cannot be used as a group name")));
            }
            let node_map = as_mapping(value);
            let node = node_from_mapping(&node_map)?;
            apply_node(name, &node, group_raw, host_raw)?;
        }
    }
    Ok(())
}

fn apply_node(
    group_name: &str,
    node: &RawNode,
    group_raw: &mut IndexMap<String, GroupAccum>,
    host_raw: &mut IndexMap<String, HostAccum>,
) -> Result<()> {
    let accum = group_raw.entry(group_name.to_string()).or_default();
    accum.settings = deep_merge(accum.settings.clone(), node.settings.clone());
    deep_merge_indexmap(&mut accum.variables, &node.variables);
    shallow_merge_indexmap(&mut accum.environment, &node.environment);

    for child in children_names(&node.children) {
        accum.children.insert(child);
    }

    for (host_name, host_value) in &node.hosts {
        if host::is_reserved(host_name) {
            return Err(Error::config(format!(
                "'{host_name}' is a reserved keyword and cannot be used as a host name"
            )));
        }
        let host_accum = host_raw.entry(host_name.clone()).or_default();
        host_accum.entry = deep_merge(host_accum.entry.clone(), host_value.clone());
        host_accum.groups.insert(group_name.to_string());
    }

    Ok(())
}

fn children_names(value: &Value) -> Vec<String> {
    match value {
        Value::Mapping(m) => m
            .keys()
            .filter_map(|k| k.as_str().map(str::to_string))
            .collect(),
        Value::Sequence(seq) => seq
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn is_root_form(top: &Mapping) -> bool {
    ["hosts", "settings", "variables", "environment"]
        .iter()
        .any(|k| top.contains_key(Value::String(k.to_string())))
}

fn node_from_mapping(map: &Mapping) -> Result<RawNode> {
    let value = Value::Mapping(map.clone());
    serde_yaml::from_value(value).map_err(Error::Yaml)
}

fn as_mapping(value: &Value) -> Mapping {
    match value {
        Value::Mapping(m) => m.clone(),
        _ => Mapping::new(),
    }
}

/// Deep-merge two YAML values: mappings merge key-by-key (recursively);
/// anything else, `incoming` wins outright.
fn deep_merge(base: Value, incoming: Value) -> Value {
    match (base, incoming) {
        (Value::Mapping(mut b), Value::Mapping(i)) => {
            for (k, v) in i {
                let merged = match b.get(&k) {
                    Some(existing) => deep_merge(existing.clone(), v),
                    None => v,
                };
                b.insert(k, merged);
            }
            Value::Mapping(b)
        }
        (Value::Null, incoming) => incoming,
        (base, Value::Null) => base,
        (_, incoming) => incoming,
    }
}

fn deep_merge_indexmap(base: &mut IndexMap<String, Value>, incoming: &IndexMap<String, Value>) {
    for (k, v) in incoming {
        let merged = match base.get(k) {
            Some(existing) => deep_merge(existing.clone(), v.clone()),
            None => v.clone(),
        };
        base.insert(k.clone(), merged);
    }
}

fn shallow_merge_indexmap(base: &mut IndexMap<String, Value>, incoming: &IndexMap<String, Value>) {
    for (k, v) in incoming {
        base.insert(k.clone(), v.clone());
    }
}

/// `true` if `text` matches `pattern`, where `*` matches any run of
/// characters and `?` matches exactly one.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    fn inner(p: &[u8], t: &[u8]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some(b'*') => (0..=t.len()).any(|i| inner(&p[1..], &t[i..])),
            Some(b'?') => !t.is_empty() && inner(&p[1..], &t[1..]),
            Some(&c) => t.first() == Some(&c) && inner(&p[1..], &t[1..]),
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}

fn split_tokens(pattern: &str) -> Vec<&str> {
    pattern.split([',', ':']).collect()
}

/// Resolve a selection pattern (§4.3 mini-language: `,`/`:` separated
/// tokens, `!exclude`, `@intersect`, `all` ≡ `*`, `*`/`?` wildcards) against
/// an already-normalized [`Inventory`].
pub fn resolve_pattern(inventory: &Inventory, pattern: &str) -> Result<Vec<String>> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Err(Error::NoTargetsFound(pattern.to_string()));
    }

    let mut includes: Vec<&str> = Vec::new();
    let mut excludes: Vec<&str> = Vec::new();
    let mut intersects: Vec<&str> = Vec::new();

    for token in split_tokens(pattern) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if let Some(rest) = token.strip_prefix('!') {
            excludes.push(rest);
        } else if let Some(rest) = token.strip_prefix('@') {
            intersects.push(rest);
        } else if token == "all" {
            includes.push("*");
        } else {
            includes.push(token);
        }
    }

    let candidate_labels: Vec<&str> = inventory
        .all_names
        .iter()
        .map(String::as_str)
        .filter(|name| {
            if excludes.iter().any(|pat| wildcard_match(pat, name)) {
                return false;
            }
            includes.is_empty() || includes.iter().any(|pat| wildcard_match(pat, name))
        })
        .collect();

    let mut expanded: IndexSet<String> = IndexSet::new();
    for label in candidate_labels {
        if let Some(members) = inventory.groups.get(label) {
            expanded.extend(members.iter().cloned());
        } else if inventory.hosts.contains_key(label) {
            expanded.insert(label.to_string());
        }
    }

    expanded.retain(|h| !excludes.iter().any(|pat| wildcard_match(pat, h)));

    if !intersects.is_empty() {
        expanded.retain(|h| {
            intersects.iter().all(|pat| {
                wildcard_match(pat, h)
                    || inventory
                        .groups
                        .get(*pat)
                        .map(|members| members.contains(h))
                        .unwrap_or(false)
            })
        });
    }

    if expanded.is_empty() {
        return Err(Error::NoTargetsFound(pattern.to_string()));
    }

    Ok(expanded.into_iter().collect())
}

/// Owns the provider cache keyed by [`crate::provider::HostDescriptor::cache_key`],
/// so repeated resolutions of the same host reuse one connected provider.
pub struct Resolver {
    inventory: Inventory,
    providers: dashmap::DashMap<String, std::sync::Arc<tokio::sync::Mutex<Box<dyn Provider>>>>,
}

impl Resolver {
    pub fn new(inventory: Inventory) -> Self {
        Self {
            inventory,
            providers: dashmap::DashMap::new(),
        }
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Resolve `pattern` to the list of matching [`ResolvedHost`]s.
    pub fn resolve(&self, pattern: &str) -> Result<Vec<&ResolvedHost>> {
        let names = resolve_pattern(&self.inventory, pattern)?;
        Ok(names
            .iter()
            .filter_map(|name| self.inventory.hosts.get(name))
            .collect())
    }

    /// Get or create (and `ensure_ready`) the provider for `host`.
    pub async fn provider_for(
        &self,
        host: &ResolvedHost,
    ) -> Result<std::sync::Arc<tokio::sync::Mutex<Box<dyn Provider>>>> {
        let key = host.descriptor.cache_key();
        if let Some(existing) = self.providers.get(&key) {
            return Ok(existing.clone());
        }
        let mut provider = build_provider(&host.descriptor)?;
        ensure_ready(provider.as_mut()).await?;
        let provider = std::sync::Arc::new(tokio::sync::Mutex::new(provider));
        self.providers.insert(key, provider.clone());
        Ok(provider)
    }

    /// Shut down every cached provider, logging and swallowing errors.
    pub async fn dispose(&self) {
        for entry in self.providers.iter() {
            let mut guard = entry.value().lock().await;
            safe_shutdown(guard.as_mut()).await;
        }
        self.providers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn root_form_goes_to_ungrouped() {
        let layer = yaml(
            r#"
hosts:
  web1:
    connection: local
"#,
        );
        let inv = normalize(&[layer]).unwrap();
        assert!(inv.hosts.contains_key("web1"));
        assert!(inv.groups.get("ungrouped").unwrap().contains("web1"));
    }

    #[test]
    fn group_settings_merge_into_hosts_host_wins() {
        let layer = yaml(
            r#"
webservers:
  settings:
    connection: ssh
    username: deploy
  hosts:
    web1:
      hostname: 10.0.0.1
    web2:
      hostname: 10.0.0.2
      username: root
"#,
        );
        let inv = normalize(&[layer]).unwrap();
        let web1 = inv.hosts.get("web1").unwrap();
        assert_eq!(web1.descriptor.username.as_deref(), Some("deploy"));
        let web2 = inv.hosts.get("web2").unwrap();
        assert_eq!(web2.descriptor.username.as_deref(), Some("root"));
    }

    #[test]
    fn children_propagate_parent_vars() {
        let layer = yaml(
            r#"
production:
  variables:
    env: prod
  children:
    webservers:
webservers:
  hosts:
    web1: {}
"#,
        );
        let inv = normalize(&[layer]).unwrap();
        let web1 = inv.hosts.get("web1").unwrap();
        assert_eq!(
            web1.variables.get("env"),
            Some(&Value::String("prod".into()))
        );
        assert!(inv.groups.get("production").unwrap().contains("web1"));
    }

    #[test]
    fn undefined_child_group_fails_normalization() {
        let layer = yaml(
            r#"
production:
  children:
    ghosts:
"#,
        );
        assert!(normalize(&[layer]).is_err());
    }

    #[test]
    fn reserved_name_is_rejected() {
        let layer = yaml(
            r#"
hosts:
  all:
    connection: local
"#,
        );
        assert!(normalize(&[layer]).is_err());
    }

    #[test]
    fn pattern_resolution_union_exclude_intersect() {
        let layer = yaml(
            r#"
webservers:
  hosts:
    web1: {}
    web2: {}
databases:
  hosts:
    db1: {}
"#,
        );
        let inv = normalize(&[layer]).unwrap();

        let all = resolve_pattern(&inv, "all").unwrap();
        assert_eq!(all.len(), 3);

        let webs = resolve_pattern(&inv, "webservers").unwrap();
        assert_eq!(webs.len(), 2);

        let excluded = resolve_pattern(&inv, "webservers,databases:!web2").unwrap();
        assert_eq!(excluded.len(), 2);
        assert!(!excluded.contains(&"web2".to_string()));

        let intersected = resolve_pattern(&inv, "webservers:@web1").unwrap();
        assert_eq!(intersected, vec!["web1".to_string()]);
    }

    #[test]
    fn empty_pattern_match_raises_no_targets_found() {
        let inv = normalize(&[yaml("hosts: {}")]).unwrap();
        let err = resolve_pattern(&inv, "nonexistent").unwrap_err();
        assert!(matches!(err, Error::NoTargetsFound(_)));
    }

    #[test]
    fn wildcard_matches_glob_patterns() {
        assert!(wildcard_match("web*", "web1"));
        assert!(!wildcard_match("web*", "db1"));
        assert!(wildcard_match("web?", "web1"));
        assert!(!wildcard_match("web?", "web10"));
    }
}
