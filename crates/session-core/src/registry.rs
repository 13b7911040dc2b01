//! Application registry collaborator.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use dashmap::DashMap;

/// Lookup between application names and the short hashes embedded in routing
/// tokens. Deployments provide their own implementation; the in-memory one
/// here backs tests and single-node setups.
pub trait ApplicationRegistry: Send + Sync {
    fn hash_for_name(&self, name: &str) -> Option<String>;
    fn name_for_hash(&self, hash: &str) -> Option<String>;
}

/// Concurrent in-memory registry.
#[derive(Debug, Default)]
pub struct InMemoryApplicationRegistry {
    by_name: DashMap<String, String>,
    by_hash: DashMap<String, String>,
}

impl InMemoryApplicationRegistry {
    pub fn new() -> Self {
        InMemoryApplicationRegistry::default()
    }

    /// Registers an application under a derived hash and returns the hash.
    pub fn register(&self, name: &str) -> String {
        let hash = derive_hash(name);
        self.register_with_hash(name, &hash);
        hash
    }

    /// Registers an application under an explicit hash, as a clustered
    /// deployment distributing a shared mapping would.
    pub fn register_with_hash(&self, name: &str, hash: &str) {
        self.by_name.insert(name.to_string(), hash.to_string());
        self.by_hash.insert(hash.to_string(), name.to_string());
    }
}

impl ApplicationRegistry for InMemoryApplicationRegistry {
    fn hash_for_name(&self, name: &str) -> Option<String> {
        self.by_name.get(name).map(|entry| entry.clone())
    }

    fn name_for_hash(&self, hash: &str) -> Option<String> {
        self.by_hash.get(hash).map(|entry| entry.clone())
    }
}

fn derive_hash(name: &str) -> String {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}
