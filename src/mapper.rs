// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Maps watch events on related objects to reconcile requests for addon instances.
//!
//! The mappers run synchronously inside the controller's watch streams, so
//! they only consult in-memory state: the reflector stores of addons and
//! managed clusters, the reference cache and the content digests.

use crate::cache::{ConfigKey, ReferenceCache};
use crate::constants::annotations;
use crate::types::{ManagedCluster, ManagedClusterAddOn};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::runtime::watcher;
use kube::{Resource, ResourceExt};
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Last seen content per object, used to drop events that change nothing
/// the reconciler reads.
#[derive(Debug, Default)]
pub struct ContentDigests {
    seen: Mutex<HashMap<ConfigKey, String>>,
}

impl ContentDigests {
    pub fn new() -> Self {
        Self::default()
    }

    fn digest<T: Serialize + ?Sized>(content: &T) -> Option<String> {
        let canonical = serde_json::to_vec(&serde_json::to_value(content).ok()?).ok()?;
        Some(format!("{:x}", Sha256::digest(&canonical)))
    }

    /// Record the content for `key`. Returns false only when it equals the
    /// content recorded last time.
    pub fn observe<T: Serialize + ?Sized>(&self, key: ConfigKey, content: &T) -> bool {
        let Some(digest) = Self::digest(content) else {
            return true;
        };
        let mut seen = self.seen.lock();
        match seen.get(&key) {
            Some(previous) if *previous == digest => false,
            _ => {
                seen.insert(key, digest);
                true
            }
        }
    }

    pub fn forget(&self, key: &ConfigKey) {
        self.seen.lock().remove(key);
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}

pub struct RequestMapper {
    addon_name: String,
    addons: Store<ManagedClusterAddOn>,
    clusters: Store<ManagedCluster>,
    cache: Arc<ReferenceCache>,
    digests: Arc<ContentDigests>,
}

impl RequestMapper {
    pub fn new(
        addon_name: &str,
        addons: Store<ManagedClusterAddOn>,
        clusters: Store<ManagedCluster>,
        cache: Arc<ReferenceCache>,
        digests: Arc<ContentDigests>,
    ) -> Self {
        Self {
            addon_name: addon_name.to_string(),
            addons,
            clusters,
            cache,
            digests,
        }
    }

    fn addon_ref(&self, namespace: &str) -> ObjectRef<ManagedClusterAddOn> {
        ObjectRef::new(&self.addon_name).within(namespace)
    }

    /// The addon instance in `namespace`, if there is one
    pub fn map_namespaced(&self, namespace: Option<&str>) -> Vec<ObjectRef<ManagedClusterAddOn>> {
        let Some(namespace) = namespace else {
            return vec![];
        };
        let oref = self.addon_ref(namespace);
        if self.addons.get(&oref).is_some() {
            vec![oref]
        } else {
            vec![]
        }
    }

    /// Every addon instance, restricted to the members of the cluster-set
    /// named by the event object's annotation when it carries one
    pub fn map_fleet<K: Resource>(&self, obj: &K) -> Vec<ObjectRef<ManagedClusterAddOn>> {
        let cluster_set = obj.annotations().get(annotations::CLUSTER_SET);
        let members: Option<BTreeSet<String>> = cluster_set.map(|set| {
            self.clusters
                .state()
                .iter()
                .filter(|c| c.in_cluster_set(set))
                .map(|c| c.name_any())
                .collect()
        });

        let mut namespaces: Vec<String> = self
            .addons
            .state()
            .iter()
            .filter(|a| a.name_any() == self.addon_name)
            .filter_map(|a| a.namespace())
            .filter(|ns| members.as_ref().map_or(true, |m| m.contains(ns)))
            .collect();
        namespaces.sort();
        namespaces.dedup();

        debug!(
            "Fleet event on {} fans out to {} addon(s)",
            obj.name_any(),
            namespaces.len()
        );
        namespaces.iter().map(|ns| self.addon_ref(ns)).collect()
    }

    /// Addons whose envelopes reference `key`
    pub fn map_referenced(&self, key: &ConfigKey) -> Vec<ObjectRef<ManagedClusterAddOn>> {
        self.cache
            .namespaces(key)
            .iter()
            .map(|ns| self.addon_ref(ns))
            .collect()
    }

    fn config_object_refs<K>(&self, obj: &K, key: &ConfigKey) -> Vec<ObjectRef<ManagedClusterAddOn>>
    where
        K: Resource<DynamicType = ()>,
    {
        let mut refs = self.map_namespaced(obj.meta().namespace.as_deref());
        refs.extend(self.map_referenced(key));
        refs.sort_by(|a, b| a.namespace.cmp(&b.namespace));
        refs.dedup();
        refs
    }

    /// Secret or config map: the addon in its namespace plus every addon
    /// referencing it, unless its content is unchanged. Digests are kept only
    /// for objects some addon depends on.
    pub fn map_config_object<K, C>(&self, obj: &K, content: &C) -> Vec<ObjectRef<ManagedClusterAddOn>>
    where
        K: Resource<DynamicType = ()>,
        C: Serialize + ?Sized,
    {
        let key = ConfigKey::for_object(obj);
        let refs = self.config_object_refs(obj, &key);
        if refs.is_empty() {
            self.digests.forget(&key);
            return vec![];
        }
        if !self.digests.observe(key.clone(), content) {
            debug!("{} content unchanged, not reconciling", key);
            return vec![];
        }
        refs
    }

    /// Deleted secret or config map: every dependent addon, regardless of content
    pub fn map_deleted_config_object<K>(&self, obj: &K) -> Vec<ObjectRef<ManagedClusterAddOn>>
    where
        K: Resource<DynamicType = ()>,
    {
        let key = ConfigKey::for_object(obj);
        self.digests.forget(&key);
        let refs = self.config_object_refs(obj, &key);
        debug!("{} deleted, reconciling {} addon(s)", key, refs.len());
        refs
    }

    /// Raw watch event on a secret or config map; `content` extracts what
    /// the reconciler reads from the object
    pub fn map_config_event<K, C, F>(
        &self,
        event: &watcher::Event<K>,
        content: F,
    ) -> Vec<ObjectRef<ManagedClusterAddOn>>
    where
        K: Resource<DynamicType = ()>,
        C: Serialize,
        F: Fn(&K) -> C,
    {
        match event {
            watcher::Event::Apply(obj) | watcher::Event::InitApply(obj) => {
                self.map_config_object(obj, &content(obj))
            }
            watcher::Event::Delete(obj) => self.map_deleted_config_object(obj),
            watcher::Event::Init | watcher::Event::InitDone => vec![],
        }
    }

    /// Envelope: the addon in its namespace, unless its manifests are the
    /// ones last written by the reconciler
    pub fn map_envelope<K, C>(&self, obj: &K, manifests: &C) -> Vec<ObjectRef<ManagedClusterAddOn>>
    where
        K: Resource<DynamicType = ()>,
        C: Serialize + ?Sized,
    {
        let key = ConfigKey::for_object(obj);
        if !self.digests.observe(key.clone(), manifests) {
            debug!("{} carries the delivered manifests, not reconciling", key);
            return vec![];
        }
        self.map_namespaced(obj.meta().namespace.as_deref())
    }

    /// Managed cluster: the addon in the namespace named after it
    pub fn map_cluster(&self, cluster: &ManagedCluster) -> Vec<ObjectRef<ManagedClusterAddOn>> {
        self.map_namespaced(Some(&cluster.name_any()))
    }
}
