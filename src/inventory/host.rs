//! Resolved host type: the output of inventory normalization, carrying a
//! connection descriptor plus the merged variables/environment scope.

use indexmap::IndexMap;
use serde_yaml::Value;

use crate::provider::{ConnectionKind, HostDescriptor};

/// A single fully-normalized inventory entry, ready to be turned into a
/// [`HostDescriptor`] and handed to [`crate::provider::build_provider`].
#[derive(Debug, Clone)]
pub struct ResolvedHost {
    pub name: String,
    pub descriptor: HostDescriptor,
    pub variables: IndexMap<String, Value>,
    /// Raw (unrendered) environment values; rendered to strings by the
    /// resolver right before the provider cache lookup.
    pub environment: IndexMap<String, Value>,
}

/// Extract a [`HostDescriptor`] from a host's merged settings mapping.
/// Unknown keys are ignored (they belong in `variables`, not `settings`).
pub fn descriptor_from_settings(name: &str, settings: &serde_yaml::Mapping) -> HostDescriptor {
    let get_str = |key: &str| -> Option<String> {
        settings
            .get(Value::String(key.to_string()))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };
    let get_u64 = |key: &str| -> Option<u64> {
        settings
            .get(Value::String(key.to_string()))
            .and_then(|v| v.as_u64())
    };

    let connection = match get_str("connection").as_deref() {
        Some("ssh") => ConnectionKind::Ssh,
        _ => ConnectionKind::Local,
    };

    HostDescriptor {
        name: name.to_string(),
        connection,
        hostname: get_str("hostname"),
        port: get_u64("port").map(|p| p as u16),
        username: get_str("username"),
        password: get_str("password"),
        private_key: get_str("private_key"),
        private_key_password: get_str("private_key_password"),
        timeout: get_u64("timeout"),
    }
}

/// Reserved top-level/group keys that may not be used as group or host names.
pub const RESERVED_KEYS: &[&str] = &[
    "all",
    "children",
    "settings",
    "hosts",
    "variables",
    "environment",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_KEYS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Mapping;

    #[test]
    fn extracts_ssh_descriptor_from_settings() {
        let mut settings = Mapping::new();
        settings.insert(Value::String("connection".into()), Value::String("ssh".into()));
        settings.insert(Value::String("hostname".into()), Value::String("10.0.0.1".into()));
        settings.insert(Value::String("port".into()), Value::Number(2222.into()));
        settings.insert(Value::String("username".into()), Value::String("deploy".into()));

        let descriptor = descriptor_from_settings("web1", &settings);
        assert_eq!(descriptor.connection, ConnectionKind::Ssh);
        assert_eq!(descriptor.hostname.as_deref(), Some("10.0.0.1"));
        assert_eq!(descriptor.port, Some(2222));
    }

    #[test]
    fn defaults_to_local_connection() {
        let settings = Mapping::new();
        let descriptor = descriptor_from_settings("localhost", &settings);
        assert_eq!(descriptor.connection, ConnectionKind::Local);
    }

    #[test]
    fn reserved_keys_are_rejected_as_names() {
        assert!(is_reserved("hosts"));
        assert!(is_reserved("children"));
        assert!(!is_reserved("webservers"));
    }
}
