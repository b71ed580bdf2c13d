//! Verify dry-run requests leave no observable change on the API server.
//!
//! Each scenario issues a dry-run request for one verb and then re-reads the resource
//! through the typed client to assert nothing changed:
//!
//! - create: the object must not exist afterwards;
//! - delete: the object must still exist, unchanged and not marked for deletion;
//! - update and patch: a marker label (or annotation) must not be set.
use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use serde_json::Value as Json;

use dryproof_executor::MutationVerb;
use dryproof_rest::DynamicObject;
use dryproof_rest::ObjectMeta;

mod error;
mod report;
mod verifier;


pub use self::error::VerificationFailed;
pub use self::report::Report;
pub use self::report::ScenarioOutcome;
pub use self::verifier::Verifier;

pub use dryproof_executor::MissingName;

/// Key of the metadata entry dry-run updates and patches attempt to set.
pub const MARKER_KEY: &str = "key";

/// Value of the metadata entry dry-run updates and patches attempt to set.
pub const MARKER_VALUE: &str = "42";

/// Metadata map mutated by update and patch scenarios.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataField {
    Annotations,
    #[default]
    Labels,
}

impl MetadataField {
    /// Access the selected map in the metadata.
    pub fn get<'a>(&self, meta: &'a ObjectMeta) -> &'a BTreeMap<String, String> {
        match self {
            MetadataField::Annotations => &meta.annotations,
            MetadataField::Labels => &meta.labels,
        }
    }

    /// Access the selected map in the metadata for changes.
    pub fn get_mut<'a>(&self, meta: &'a mut ObjectMeta) -> &'a mut BTreeMap<String, String> {
        match self {
            MetadataField::Annotations => &mut meta.annotations,
            MetadataField::Labels => &mut meta.labels,
        }
    }

    /// Check if the marker entry is set in the metadata.
    pub fn has_marker(&self, meta: &ObjectMeta) -> bool {
        self.get(meta).get(MARKER_KEY).map(String::as_str) == Some(MARKER_VALUE)
    }

    /// Merge patch document setting the marker entry.
    pub fn marker_patch(&self) -> Json {
        let field = match self {
            MetadataField::Annotations => "annotations",
            MetadataField::Labels => "labels",
        };
        json!({"metadata": {field: {MARKER_KEY: MARKER_VALUE}}})
    }
}

/// A resource to verify dry-run behaviour with.
#[derive(Clone, Debug)]
pub struct Scenario {
    /// Pluralised name of the collection.
    pub kind: String,

    /// Object to create, the namespace in its metadata selects the collection namespace.
    pub object: DynamicObject,

    /// Metadata map the patch verb sets the marker entry in.
    pub patch_field: MetadataField,

    /// Metadata map the update verb sets the marker entry in.
    pub update_field: MetadataField,

    /// Verbs to verify, in order.
    pub verbs: Vec<MutationVerb>,
}

impl Scenario {
    /// Verify all verbs for an object of the given kind.
    pub fn new<S>(kind: S, object: DynamicObject) -> Scenario
    where
        S: Into<String>,
    {
        Scenario {
            kind: kind.into(),
            object,
            patch_field: MetadataField::default(),
            update_field: MetadataField::default(),
            verbs: MutationVerb::ALL.to_vec(),
        }
    }
}

#[cfg(test)]
mod field_tests {
    use serde_json::json;

    use super::MetadataField;
    use dryproof_rest::ObjectMeta;

    #[test]
    fn marker_patch_documents() {
        assert_eq!(
            MetadataField::Labels.marker_patch(),
            json!({"metadata": {"labels": {"key": "42"}}}),
        );
        assert_eq!(
            MetadataField::Annotations.marker_patch(),
            json!({"metadata": {"annotations": {"key": "42"}}}),
        );
    }

    #[test]
    fn marker_detection() {
        let mut meta = ObjectMeta::default();
        assert!(!MetadataField::Labels.has_marker(&meta));
        meta.annotations.insert("key".into(), "42".into());
        assert!(!MetadataField::Labels.has_marker(&meta));
        assert!(MetadataField::Annotations.has_marker(&meta));
        meta.labels.insert("key".into(), "43".into());
        assert!(!MetadataField::Labels.has_marker(&meta));
    }
}
