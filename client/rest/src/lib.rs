//! Async REST layer to interact with structured-resource APIs.
//!
//! Requests are described by the transport-agnostic [`Request`] builder and sent
//! through a [`Rest`] handle backed by any [`IRest`] implementation.
use std::sync::Arc;

use anyhow::Result;

mod models;
mod request;
mod typed;

#[cfg(any(test, feature = "test-fixture"))]
pub mod fixture;


pub use self::models::DynamicObject;
pub use self::models::ObjectMeta;
pub use self::models::Resource;
pub use self::request::Body;
pub use self::request::PatchType;
pub use self::request::Request;
pub use self::request::ResourcePath;
pub use self::request::Response;
pub use self::request::Verb;
pub use self::request::CONTENT_TYPE_JSON;
pub use self::request::DRY_RUN_ALL;
pub use self::request::DRY_RUN_PARAM;
pub use self::typed::Api;
pub use self::typed::DeleteOptions;
pub use self::typed::PropagationPolicy;

/// Handle to send [`Request`]s to the API server.
#[derive(Clone)]
pub struct Rest(Arc<dyn IRest>);

impl Rest {
    /// Send a request and wait for the server to respond.
    ///
    /// Only failures to exchange the request and response are returned as errors.
    /// Non-success statuses are returned in the [`Response`] for callers to classify.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        self.0.execute(request).await
    }
}

impl<T> From<T> for Rest
where
    T: IRest + 'static,
{
    fn from(value: T) -> Self {
        Rest(Arc::new(value))
    }
}

/// Interface to transports able to deliver [`Request`]s.
///
/// Enables the REST layer to be implemented across different protocols, or mocked in tests.
#[async_trait::async_trait]
pub trait IRest: Send + Sync {
    /// Send a request and wait for the server to respond.
    async fn execute(&self, request: Request) -> Result<Response>;
}
