//! Identity keys and limit classes.

use serde::{Deserialize, Serialize};

/// Which configured quota governs an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitClass {
    /// Identity derived from the client address
    Ip,
    /// Identity derived from a client-supplied API token
    Token,
}

impl LimitClass {
    /// Short lowercase name, also used as the key namespace.
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitClass::Ip => "ip",
            LimitClass::Token => "token",
        }
    }
}

impl std::fmt::Display for LimitClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rate-limited subject: its class plus the raw identity string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    /// The limit class this identity was resolved to
    pub class: LimitClass,
    /// The address or token, verbatim
    pub value: String,
}

impl IdentityKey {
    /// Create a new identity key.
    pub fn new(class: LimitClass, value: &str) -> Self {
        Self {
            class,
            value: value.to_string(),
        }
    }

    /// The key used in both the counter store and the block table.
    ///
    /// Namespaced keys are `"{class}:{value}"`; otherwise the value is used
    /// as-is and IP and token identities share one key space.
    pub fn lookup_key(&self, namespaced: bool) -> String {
        if namespaced {
            format!("{}:{}", self.class, self.value)
        } else {
            self.value.clone()
        }
    }
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.class, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_key_namespaced() {
        let key = IdentityKey::new(LimitClass::Token, "abc123");
        assert_eq!(key.lookup_key(true), "token:abc123");

        let key = IdentityKey::new(LimitClass::Ip, "10.0.0.1");
        assert_eq!(key.lookup_key(true), "ip:10.0.0.1");
    }

    #[test]
    fn test_lookup_key_verbatim() {
        let ip = IdentityKey::new(LimitClass::Ip, "shared");
        let token = IdentityKey::new(LimitClass::Token, "shared");

        assert_eq!(ip.lookup_key(false), token.lookup_key(false));
        assert_ne!(ip.lookup_key(true), token.lookup_key(true));
    }

    #[test]
    fn test_display() {
        let key = IdentityKey::new(LimitClass::Ip, "192.168.1.2");
        assert_eq!(key.to_string(), "ip:192.168.1.2");
    }
}
