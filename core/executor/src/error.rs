//! Errors reported by the dry-run executor and updater.
use crate::MutationVerb;

/// A dry-run request did not complete successfully.
#[derive(Debug, thiserror::Error)]
#[error("dry-run {verb} of {kind} '{name}' failed")]
pub struct DryRunFailed {
    /// Collection the request targeted.
    pub kind: String,

    /// Name of the resource the request targeted, empty if unknown.
    pub name: String,

    /// Verb the request was for.
    pub verb: MutationVerb,
}

/// The resource to operate on has no name to address it with.
#[derive(Debug, thiserror::Error)]
#[error("{kind} resource has no metadata.name")]
pub struct MissingName {
    pub kind: String,
}

/// Exceeded maximum number of update attempts.
#[derive(Debug, thiserror::Error)]
#[error("update still conflicting after {0} attempts")]
pub struct RetriesExceeded(u16);

impl RetriesExceeded {
    /// Report the given number of attempts was exhausted.
    pub fn new(max: u16) -> RetriesExceeded {
        RetriesExceeded(max)
    }

    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u16 {
        self.0
    }
}
