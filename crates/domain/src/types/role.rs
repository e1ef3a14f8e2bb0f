//! Counter classification: roles and keys

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::unit::Unit;

/// Classifies what kind of thing a counter measures.
///
/// Two roles are equal iff both name and unit match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Role {
    name: Arc<str>,
    unit: Unit,
}

impl Role {
    pub fn new(name: impl Into<String>, unit: Unit) -> Self {
        let name: String = name.into();
        Self { name: Arc::from(name), unit }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    /// HTTP requests, in nanoseconds.
    pub fn web() -> Self {
        Self::new("web", Unit::NANOSECOND)
    }

    /// Page rendering, in nanoseconds.
    pub fn jsp() -> Self {
        Self::new("jsp", Unit::NANOSECOND)
    }

    /// Database statements, in nanoseconds.
    pub fn jdbc() -> Self {
        Self::new("jdbc", Unit::NANOSECOND)
    }

    /// Generic method invocations, in nanoseconds.
    pub fn performances() -> Self {
        Self::new("performances", Unit::NANOSECOND)
    }

    /// Failed invocations, counted.
    pub fn failures() -> Self {
        Self::new("failures", Unit::UNARY)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.unit)
    }
}

/// Identity of one measured subject: a role plus a subject name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    role: Role,
    name: Arc<str>,
}

impl Key {
    pub fn new(role: Role, name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self { role, name: Arc::from(name) }
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.role.name, self.name)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_role_equality_requires_name_and_unit() {
        assert_eq!(Role::new("http", Unit::MILLISECOND), Role::new("http", Unit::MILLISECOND));
        assert_ne!(Role::new("http", Unit::MILLISECOND), Role::new("http", Unit::NANOSECOND));
        assert_ne!(Role::new("http", Unit::MILLISECOND), Role::new("jsp", Unit::MILLISECOND));
    }

    #[test]
    fn test_key_is_hashable() {
        let role = Role::web();
        let mut keys = HashSet::new();
        keys.insert(Key::new(role.clone(), "/index"));
        keys.insert(Key::new(role.clone(), "/index"));
        keys.insert(Key::new(role, "/login"));
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_key_display() {
        let key = Key::new(Role::jdbc(), "select 1");
        assert_eq!(key.to_string(), "jdbc/select 1");
    }

    #[test]
    fn test_role_serde_roundtrip_keeps_unit() {
        let role = Role::failures();
        let json = serde_json::to_string(&role).unwrap();
        assert_eq!(json, r#"{"name":"failures","unit":"u"}"#);
        let back: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(back, role);
    }
}
