//! Options and error classification shared by structured-resource API clients.
mod config;
mod error;

pub use self::config::ClientOptions;
pub use self::config::ClientOptionsBuilder;
pub use self::config::DEFAULT_API_PREFIX;
pub use self::error::check;
pub use self::error::inspect;
pub use self::error::is_conflict;
pub use self::error::is_not_found;
pub use self::error::is_rejected;
pub use self::error::is_transport;
pub use self::error::ConflictError;
pub use self::error::EmptyResponse;
pub use self::error::InvalidResponse;
pub use self::error::NotFoundError;
pub use self::error::RejectedError;
pub use self::error::ResourceIdentifier;
pub use self::error::Status;
pub use self::error::TransportError;
pub use self::error::REASON_CONFLICT;
