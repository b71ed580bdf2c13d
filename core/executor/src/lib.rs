//! Issue dry-run requests against structured-resource APIs.
//!
//! The [`DryRunExecutor`] sends create, update and patch requests annotated with the
//! dry-run directive for any resource kind. The [`ConvergentUpdater`] retries
//! read-modify-write sequences that lose optimistic concurrency races.
use serde::Deserialize;
use serde::Serialize;

use dryproof_rest::Verb;

mod conf;
mod error;
mod executor;
mod updater;

#[cfg(test)]
mod tests;

pub use self::conf::UpdaterBackoff;
pub use self::error::DryRunFailed;
pub use self::error::MissingName;
pub use self::error::RetriesExceeded;
pub use self::executor::DryRunExecutor;
pub use self::updater::ConvergentUpdater;

/// Mutating operations whose dry-run behaviour is verified.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationVerb {
    Create,
    Delete,
    Patch,
    Update,
}

impl MutationVerb {
    /// All mutating verbs, in verification order.
    pub const ALL: [MutationVerb; 4] = [
        MutationVerb::Create,
        MutationVerb::Delete,
        MutationVerb::Update,
        MutationVerb::Patch,
    ];

    /// HTTP method requests for this verb are sent with.
    pub fn http_verb(&self) -> Verb {
        match self {
            MutationVerb::Create => Verb::Post,
            MutationVerb::Delete => Verb::Delete,
            MutationVerb::Patch => Verb::Patch,
            MutationVerb::Update => Verb::Put,
        }
    }
}

impl std::fmt::Display for MutationVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationVerb::Create => write!(f, "create"),
            MutationVerb::Delete => write!(f, "delete"),
            MutationVerb::Patch => write!(f, "patch"),
            MutationVerb::Update => write!(f, "update"),
        }
    }
}
