//! Errors reported by verification scenarios.
use dryproof_executor::MutationVerb;

/// A dry-run request changed the observable state of a resource.
#[derive(Debug, thiserror::Error)]
#[error("dry-run {verb} of {kind} '{name}' changed observable state: {reason}")]
pub struct VerificationFailed {
    /// Collection the resource belongs to.
    pub kind: String,

    /// Name of the resource that changed.
    pub name: String,

    /// What was observed instead of the original state.
    pub reason: String,

    /// Verb whose dry-run was verified.
    pub verb: MutationVerb,
}
