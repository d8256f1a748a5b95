// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Bi-directional index between delivery envelopes and the configuration
//! resources they embed.
//!
//! The forward map answers "which cluster namespaces use this config?" for
//! event fan-out; the reverse map remembers what each envelope referenced
//! last time so stale forward edges can be dropped on the next `put`.

use kube::{Resource, ResourceExt};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

/// Identity of a referenced configuration resource.
/// `namespace` is empty for cluster-scoped resources.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigKey {
    pub group: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ConfigKey {
    pub fn new(group: &str, kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            group: group.to_string(),
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Key for a typed object, using its static group and kind
    pub fn for_object<K>(obj: &K) -> Self
    where
        K: Resource<DynamicType = ()>,
    {
        Self::new(
            &K::group(&()),
            &K::kind(&()),
            &obj.namespace().unwrap_or_default(),
            &obj.name_any(),
        )
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}/{}", self.group, self.kind, self.namespace, self.name)
    }
}

/// Identity of a delivery envelope
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvelopeKey {
    pub namespace: String,
    pub name: String,
}

impl EnvelopeKey {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

#[derive(Default)]
struct Index {
    /// ConfigKey -> envelopes referencing it. Envelope names are kept so two
    /// envelopes in one namespace don't drop each other's edge.
    forward: HashMap<ConfigKey, HashSet<EnvelopeKey>>,
    reverse: HashMap<EnvelopeKey, HashSet<ConfigKey>>,
}

impl Index {
    fn unlink(&mut self, key: &ConfigKey, envelope: &EnvelopeKey) {
        if let Some(envelopes) = self.forward.get_mut(key) {
            envelopes.remove(envelope);
            if envelopes.is_empty() {
                self.forward.remove(key);
            }
        }
    }
}

/// Process-wide reference index. Writers are exclusive, readers shared;
/// the lock is never held across an await.
#[derive(Default)]
pub struct ReferenceCache {
    index: RwLock<Index>,
}

impl fmt::Debug for ReferenceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let index = self.index.read();
        f.debug_struct("ReferenceCache")
            .field("keys", &index.forward.len())
            .field("envelopes", &index.reverse.len())
            .finish()
    }
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the envelope's reference set. Only the symmetric difference
    /// against the previous set touches the forward map.
    pub fn put<I>(&self, namespace: &str, name: &str, keys: I)
    where
        I: IntoIterator<Item = ConfigKey>,
    {
        let envelope = EnvelopeKey::new(namespace, name);
        let new_keys: HashSet<ConfigKey> = keys.into_iter().collect();

        let mut index = self.index.write();
        let old_keys = index.reverse.remove(&envelope).unwrap_or_default();

        for stale in old_keys.difference(&new_keys) {
            index.unlink(stale, &envelope);
        }
        for added in new_keys.difference(&old_keys) {
            index
                .forward
                .entry(added.clone())
                .or_default()
                .insert(envelope.clone());
        }

        if !new_keys.is_empty() {
            index.reverse.insert(envelope, new_keys);
        }
    }

    /// Drop every reference owned by the envelope
    pub fn delete(&self, namespace: &str, name: &str) {
        let envelope = EnvelopeKey::new(namespace, name);
        let mut index = self.index.write();
        if let Some(keys) = index.reverse.remove(&envelope) {
            for key in &keys {
                index.unlink(key, &envelope);
            }
        }
    }

    /// Namespaces of the envelopes currently referencing `key`, without duplicates
    pub fn namespaces(&self, key: &ConfigKey) -> Vec<String> {
        let index = self.index.read();
        index
            .forward
            .get(key)
            .map(|envelopes| {
                envelopes
                    .iter()
                    .map(|e| e.namespace.clone())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Keys the envelope referenced in its latest `put`
    pub fn keys(&self, namespace: &str, name: &str) -> Vec<ConfigKey> {
        let index = self.index.read();
        let mut keys: Vec<ConfigKey> = index
            .reverse
            .get(&EnvelopeKey::new(namespace, name))
            .map(|k| k.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Number of config keys with at least one referencing envelope
    pub fn len(&self) -> usize {
        self.index.read().forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
