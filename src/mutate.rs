// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Type-directed convergence of API objects for the create-or-update idiom.
//!
//! Metadata merges the same way for every kind. The rest of the object is
//! only touched through a policy registered per kind; objects of any other
//! kind are refused instead of being half-updated.

use crate::error::{AddonError, Result};
use kube::{
    api::{ApiResource, DynamicObject, PostParams, TypeMeta},
    Api, Resource, ResourceExt,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Outcome of a create-or-update call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    Created,
    Updated,
    Unchanged,
}

/// Closure converging an existing object onto the desired one
pub type MutateFn<'a> = Box<dyn FnOnce(&mut DynamicObject) -> Result<()> + Send + 'a>;

/// How the non-metadata part of a kind converges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecPolicy {
    /// Overwrite `.spec` wholesale
    ReplaceSpec,
    /// Overwrite `.data` and `.type`
    ReplaceSecretData,
    /// Overwrite `.spec.workload.manifests` when desired carries them; the
    /// rest of the envelope spec belongs to the addon framework
    ReplaceManifests,
}

fn policy_for(kind: &str) -> Result<SpecPolicy> {
    match kind {
        "Certificate" => Ok(SpecPolicy::ReplaceSpec),
        "ManifestWork" => Ok(SpecPolicy::ReplaceManifests),
        "Secret" => Ok(SpecPolicy::ReplaceSecretData),
        other => Err(AddonError::UnsupportedKind(other.to_string())),
    }
}

fn kind_of(obj: &DynamicObject) -> &str {
    obj.types.as_ref().map(|t| t.kind.as_str()).unwrap_or_default()
}

fn merge_map(
    existing: &mut Option<BTreeMap<String, String>>,
    overrides: Option<&BTreeMap<String, String>>,
) {
    let Some(overrides) = overrides.filter(|o| !o.is_empty()) else {
        return;
    };
    let target = existing.get_or_insert_with(BTreeMap::new);
    for (k, v) in overrides {
        target.insert(k.clone(), v.clone());
    }
}

fn replace_field(existing: &mut DynamicObject, desired: &DynamicObject, field: &str) {
    match desired.data.get(field) {
        Some(value) => {
            if !existing.data.is_object() {
                existing.data = serde_json::Value::Object(serde_json::Map::new());
            }
            if let Some(obj) = existing.data.as_object_mut() {
                obj.insert(field.to_string(), value.clone());
            }
        }
        None => {
            if let Some(obj) = existing.data.as_object_mut() {
                obj.remove(field);
            }
        }
    }
}

const MANIFESTS_PATH: [&str; 3] = ["spec", "workload", "manifests"];

fn replace_manifests(existing: &mut DynamicObject, desired: &DynamicObject) {
    let Some(manifests) = desired.data.pointer("/spec/workload/manifests") else {
        return;
    };
    let mut node = &mut existing.data;
    for segment in MANIFESTS_PATH {
        if !node.is_object() {
            *node = serde_json::Value::Object(serde_json::Map::new());
        }
        let Some(obj) = node.as_object_mut() else {
            return;
        };
        node = obj.entry(segment).or_insert(serde_json::Value::Null);
    }
    *node = manifests.clone();
}

/// Build the mutation converging an existing object onto `desired`.
///
/// Annotations and labels merge with `desired` winning, then
/// `extra_annotations` winning over both. Owner references are replaced
/// when `desired` sets any.
pub fn mutate_fn<'a>(
    desired: &'a DynamicObject,
    extra_annotations: &'a BTreeMap<String, String>,
) -> MutateFn<'a> {
    Box::new(move |existing: &mut DynamicObject| {
        let kind = kind_of(desired);
        let policy = policy_for(kind)?;
        let existing_kind = kind_of(existing);
        if !existing_kind.is_empty() && existing_kind != kind {
            return Err(AddonError::UnsupportedKind(format!(
                "cannot converge {} onto {}",
                existing_kind, kind
            )));
        }

        merge_map(&mut existing.metadata.annotations, desired.metadata.annotations.as_ref());
        merge_map(&mut existing.metadata.annotations, Some(extra_annotations));
        merge_map(&mut existing.metadata.labels, desired.metadata.labels.as_ref());

        if desired
            .metadata
            .owner_references
            .as_ref()
            .is_some_and(|o| !o.is_empty())
        {
            existing.metadata.owner_references = desired.metadata.owner_references.clone();
        }

        match policy {
            SpecPolicy::ReplaceSpec => replace_field(existing, desired, "spec"),
            SpecPolicy::ReplaceSecretData => {
                replace_field(existing, desired, "data");
                replace_field(existing, desired, "type");
            }
            SpecPolicy::ReplaceManifests => replace_manifests(existing, desired),
        }
        Ok(())
    })
}

/// Erase a typed object into a `DynamicObject` carrying its type meta
pub fn to_dynamic<K>(obj: &K) -> Result<DynamicObject>
where
    K: Resource<DynamicType = ()> + Serialize,
{
    let mut dynamic: DynamicObject = serde_json::from_value(serde_json::to_value(obj)?)?;
    dynamic.types = Some(TypeMeta {
        api_version: K::api_version(&()).to_string(),
        kind: K::kind(&()).to_string(),
    });
    Ok(dynamic)
}

/// Namespaced dynamic API for the kind of `K`
pub fn dynamic_api<K>(client: kube::Client, namespace: &str) -> Api<DynamicObject>
where
    K: Resource<DynamicType = ()>,
{
    Api::namespaced_with(client, namespace, &ApiResource::erase::<K>(&()))
}

/// Converge the live object onto `desired` and write it back only when the
/// mutation changed something. Returns `None` when the object does not exist,
/// otherwise the outcome and the object as it now stands.
#[instrument(skip(api, desired, extra_annotations), fields(kind = %kind_of(desired), name = %desired.name_any()))]
pub async fn update_existing(
    api: &Api<DynamicObject>,
    desired: &DynamicObject,
    extra_annotations: &BTreeMap<String, String>,
) -> Result<Option<(OperationResult, DynamicObject)>> {
    // Unsupported kinds fail before any API call
    policy_for(kind_of(desired))?;
    let name = desired.name_any();

    let Some(mut existing) = api.get_opt(&name).await? else {
        return Ok(None);
    };
    let before = serde_json::to_value(&existing)?;
    mutate_fn(desired, extra_annotations)(&mut existing)?;
    if serde_json::to_value(&existing)? == before {
        debug!("{} unchanged, skipping update", name);
        return Ok(Some((OperationResult::Unchanged, existing)));
    }
    let updated = api.replace(&name, &PostParams::default(), &existing).await?;
    debug!("Updated {}", name);
    Ok(Some((OperationResult::Updated, updated)))
}

/// Create the object if absent; otherwise converge it as `update_existing` does.
pub async fn create_or_update(
    api: &Api<DynamicObject>,
    desired: DynamicObject,
    extra_annotations: &BTreeMap<String, String>,
) -> Result<OperationResult> {
    if let Some((result, _)) = update_existing(api, &desired, extra_annotations).await? {
        return Ok(result);
    }

    let name = desired.name_any();
    let mut fresh = desired;
    merge_map(&mut fresh.metadata.annotations, Some(extra_annotations));
    api.create(&PostParams::default(), &fresh).await?;
    debug!("Created {}", name);
    Ok(OperationResult::Created)
}
