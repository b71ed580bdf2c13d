//! Resource representations understood by the typed client.
use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value as Json;

/// Metadata attached to every resource.
///
/// Fields the harness does not interpret are preserved in `extra` so resources
/// survive read-modify-write cycles untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Set once the server starts deleting the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<String>,

    /// Conditions to meet before a resource marked for deletion is removed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Opaque version used by the server for optimistic concurrency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Json>,
}

/// A resource the typed client can read and write.
pub trait Resource: Clone + DeserializeOwned + Serialize + Send + Sync {
    /// Access the resource metadata.
    fn metadata(&self) -> &ObjectMeta;

    /// Access the resource metadata for changes.
    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    /// Name of the resource, empty if not set.
    fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    /// Namespace of the resource, empty for cluster-scoped resources.
    fn namespace(&self) -> &str {
        self.metadata().namespace.as_deref().unwrap_or_default()
    }
}

/// Resource of any kind, with a schema-less body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Every other top-level attribute (`spec`, `status`, ...).
    #[serde(flatten)]
    pub data: Map<String, Json>,
}

impl DynamicObject {
    /// Create an empty object with the given name and namespace.
    pub fn new<S1, S2>(name: S1, namespace: S2) -> DynamicObject
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        let namespace = namespace.into();
        DynamicObject {
            metadata: ObjectMeta {
                name: Some(name.into()),
                namespace: Some(namespace).filter(|namespace| !namespace.is_empty()),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

impl Resource for DynamicObject {
    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
