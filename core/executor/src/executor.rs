//! Send mutating requests carrying the dry-run directive.
use anyhow::Context as _;
use anyhow::Result;
use serde::Serialize;
use serde_json::Value as Json;

use dryproof_client_utils::TransportError;
use dryproof_context::Context;
use dryproof_rest::PatchType;
use dryproof_rest::Request;
use dryproof_rest::Rest;

use crate::error::DryRunFailed;
use crate::error::MissingName;
use crate::MutationVerb;

/// Issue create, update and patch requests that the server must not persist.
///
/// Every request built by the executor carries the dry-run directive, regardless of
/// verb or resource kind. Responses are only checked for success: the objects returned
/// by dry-run requests never existed and are discarded.
#[derive(Clone)]
pub struct DryRunExecutor {
    rest: Rest,
}

impl DryRunExecutor {
    /// Initialise an executor sending requests through the given REST handle.
    pub fn new(rest: Rest) -> DryRunExecutor {
        DryRunExecutor { rest }
    }

    /// Dry-run the creation of `body` in the `kind` collection.
    pub async fn create<B>(
        &self,
        context: &Context,
        kind: &str,
        namespace: &str,
        body: &B,
        subresource: Option<&str>,
    ) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body).context(TransportError)?;
        let name = body
            .pointer("/metadata/name")
            .and_then(Json::as_str)
            .unwrap_or_default()
            .to_string();
        let request = dry_run_request(MutationVerb::Create, kind, namespace, None, subresource)
            .json(&body)?;
        self.dispatch(context, MutationVerb::Create, request, name)
            .await
    }

    /// Dry-run a merge, JSON or strategic-merge patch of the named resource.
    ///
    /// Fails with [`MissingName`] without sending anything if `name` is empty.
    #[allow(clippy::too_many_arguments)]
    pub async fn patch(
        &self,
        context: &Context,
        kind: &str,
        name: &str,
        namespace: &str,
        patch_type: PatchType,
        patch: &[u8],
        subresource: Option<&str>,
    ) -> Result<()> {
        require_name(kind, name)?;
        let request =
            dry_run_request(MutationVerb::Patch, kind, namespace, Some(name), subresource)
                .body(patch_type.content_type(), patch.to_vec());
        self.dispatch(context, MutationVerb::Patch, request, name.to_string())
            .await
    }

    /// Dry-run the replacement of the named resource with `body`.
    pub async fn update<B>(
        &self,
        context: &Context,
        kind: &str,
        name: &str,
        namespace: &str,
        body: &B,
        subresource: Option<&str>,
    ) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        require_name(kind, name)?;
        let request =
            dry_run_request(MutationVerb::Update, kind, namespace, Some(name), subresource)
                .json(body)?;
        self.dispatch(context, MutationVerb::Update, request, name.to_string())
            .await
    }

    async fn dispatch(
        &self,
        context: &Context,
        verb: MutationVerb,
        request: Request,
        name: String,
    ) -> Result<()> {
        let kind = request.path.kind.clone();
        slog::debug!(
            context.logger, "Sending dry-run request";
            "verb" => %verb,
            "kind" => &kind,
            "name" => &name,
            "namespace" => request.path.namespace.clone(),
            "subresource" => request.path.subresource.clone(),
        );
        let failed = || DryRunFailed {
            kind: kind.clone(),
            name: name.clone(),
            verb,
        };
        let response = self.rest.execute(request).await.with_context(failed)?;
        dryproof_client_utils::check(response.status, &response.body).with_context(failed)?;
        Ok(())
    }
}

/// Named operations must not fall back to the collection path.
fn require_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        anyhow::bail!(MissingName {
            kind: kind.to_string(),
        });
    }
    Ok(())
}

/// Build the request for a verb, attaching the dry-run directive.
///
/// This is the only place dry-run requests are addressed and annotated.
fn dry_run_request(
    verb: MutationVerb,
    kind: &str,
    namespace: &str,
    name: Option<&str>,
    subresource: Option<&str>,
) -> Request {
    let mut request = Request::new(verb.http_verb())
        .resource(kind)
        .namespace(namespace);
    if let Some(name) = name {
        request = request.name(name);
    }
    if let Some(subresource) = subresource {
        request = request.subresource(subresource);
    }
    request.dry_run()
}
