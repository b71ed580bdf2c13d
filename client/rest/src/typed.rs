//! Typed client to read, create and delete resources of one kind.
use std::marker::PhantomData;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

use dryproof_client_utils::EmptyResponse;
use dryproof_client_utils::ResourceIdentifier;

use crate::models::Resource;
use crate::request::Request;
use crate::request::Verb;
use crate::request::DRY_RUN_ALL;
use crate::Rest;

/// How the server should handle dependents of a deleted resource.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum PropagationPolicy {
    /// Delete dependents in the background after the owner is gone.
    Background,

    /// Delete dependents before the owner is removed.
    Foreground,

    /// Leave dependents alone.
    Orphan,
}

/// Options sent in the body of delete requests.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOptions {
    /// Dry-run stages requested, only `All` is meaningful.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dry_run: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub propagation_policy: Option<PropagationPolicy>,
}

impl DeleteOptions {
    /// Options to validate a delete request without removing anything.
    pub fn dry_run_all() -> DeleteOptions {
        DeleteOptions {
            dry_run: vec![DRY_RUN_ALL.to_string()],
            propagation_policy: None,
        }
    }

    /// Check if the options carry the dry-run directive.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run.iter().any(|stage| stage == DRY_RUN_ALL)
    }

    /// Set the propagation policy for dependents.
    pub fn with_propagation(mut self, policy: PropagationPolicy) -> DeleteOptions {
        self.propagation_policy = Some(policy);
        self
    }
}

/// Typed access to a collection of resources of kind `K`.
pub struct Api<K> {
    kind: String,
    namespace: String,
    rest: Rest,
    resource: PhantomData<fn() -> K>,
}

impl<K> Api<K>
where
    K: Resource,
{
    /// Access a collection of cluster-scoped resources.
    pub fn cluster<S>(rest: Rest, kind: S) -> Api<K>
    where
        S: Into<String>,
    {
        Api::namespaced(rest, kind, "")
    }

    /// Access a collection of resources in a namespace.
    pub fn namespaced<S1, S2>(rest: Rest, kind: S1, namespace: S2) -> Api<K>
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Api {
            kind: kind.into(),
            namespace: namespace.into(),
            rest,
            resource: PhantomData,
        }
    }

    /// Create a new resource in the collection.
    pub async fn create(&self, resource: &K) -> Result<K> {
        let request = self.request(Verb::Post).json(resource)?;
        let response = self.rest.execute(request).await?;
        let created = dryproof_client_utils::inspect::<K>(response.status, &response.body)
            .with_context(|| ResourceIdentifier::reference(&self.kind, resource.name()))?;
        let created = created.ok_or(EmptyResponse)?;
        Ok(created)
    }

    /// Delete a resource, honouring dry-run and propagation options.
    pub async fn delete(&self, name: &str, options: &DeleteOptions) -> Result<()> {
        let request = self.request(Verb::Delete).name(name).json(options)?;
        let response = self.rest.execute(request).await?;
        dryproof_client_utils::check(response.status, &response.body)
            .with_context(|| ResourceIdentifier::reference(&self.kind, name))?;
        Ok(())
    }

    /// Fetch the current state of a resource.
    pub async fn get(&self, name: &str) -> Result<K> {
        let request = self.request(Verb::Get).name(name);
        let response = self.rest.execute(request).await?;
        let resource = dryproof_client_utils::inspect::<K>(response.status, &response.body)
            .with_context(|| ResourceIdentifier::reference(&self.kind, name))?;
        let resource = resource.ok_or(EmptyResponse)?;
        Ok(resource)
    }

    /// Pluralised name of the collection.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Namespace of the collection, empty for cluster-scoped kinds.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn request(&self, verb: Verb) -> Request {
        Request::new(verb)
            .resource(&self.kind)
            .namespace(&self.namespace)
    }
}

impl<K> Clone for Api<K> {
    fn clone(&self) -> Self {
        Api {
            kind: self.kind.clone(),
            namespace: self.namespace.clone(),
            rest: self.rest.clone(),
            resource: PhantomData,
        }
    }
}
