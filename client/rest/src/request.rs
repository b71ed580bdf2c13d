//! Resource-kind-agnostic description of API requests and responses.
use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

use dryproof_client_utils::TransportError;

/// Content type of full resource bodies.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Query parameter carrying the dry-run directive.
pub const DRY_RUN_PARAM: &str = "dryRun";

/// Value of the dry-run directive asking for all stages to skip persistence.
pub const DRY_RUN_ALL: &str = "All";

/// HTTP methods requests can be sent with.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Verb {
    Delete,
    Get,
    Patch,
    Post,
    Put,
}

impl Verb {
    /// Upper case HTTP method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Delete => "DELETE",
            Verb::Get => "GET",
            Verb::Patch => "PATCH",
            Verb::Post => "POST",
            Verb::Put => "PUT",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format of a patch payload, selected by the caller.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatchType {
    /// RFC 6902 list of operations.
    Json,

    /// RFC 7386 merge document.
    Merge,

    /// Merge document aware of list merge keys.
    StrategicMerge,
}

impl PatchType {
    /// Media type the server expects for this kind of patch.
    pub fn content_type(&self) -> &'static str {
        match self {
            PatchType::Json => "application/json-patch+json",
            PatchType::Merge => "application/merge-patch+json",
            PatchType::StrategicMerge => "application/strategic-merge-patch+json",
        }
    }

    /// Lookup the patch type matching a media type.
    pub fn from_content_type(content_type: &str) -> Option<PatchType> {
        match content_type {
            "application/json-patch+json" => Some(PatchType::Json),
            "application/merge-patch+json" => Some(PatchType::Merge),
            "application/strategic-merge-patch+json" => Some(PatchType::StrategicMerge),
            _ => None,
        }
    }
}

/// Location of a resource, or collection of resources, relative to the API prefix.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResourcePath {
    /// Pluralised collection name, interpolated as is.
    pub kind: String,

    /// Name of a single resource in the collection.
    pub name: Option<String>,

    /// Namespace of the collection, `None` for cluster-scoped kinds.
    pub namespace: Option<String>,

    /// Nested endpoint to target instead of the resource itself.
    pub subresource: Option<String>,
}

impl ResourcePath {
    /// Render the path as `[namespaces/{ns}/]{kind}[/{name}][/{subresource}]`.
    pub fn render(&self) -> String {
        let mut segments: Vec<&str> = Vec::with_capacity(5);
        if let Some(namespace) = &self.namespace {
            segments.push("namespaces");
            segments.push(namespace);
        }
        segments.push(&self.kind);
        if let Some(name) = &self.name {
            segments.push(name);
        }
        if let Some(subresource) = &self.subresource {
            segments.push(subresource);
        }
        segments.join("/")
    }
}

/// Encoded payload attached to a request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Body {
    pub content_type: String,
    pub payload: Vec<u8>,
}

/// A request to a resource collection, built incrementally.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    /// Encoded payload sent with the request, if any.
    pub body: Option<Body>,

    /// Query parameters in the order they were added.
    pub params: Vec<(String, String)>,

    /// Target of the request.
    pub path: ResourcePath,

    /// HTTP method to send the request with.
    pub verb: Verb,
}

impl Request {
    /// Start building a request with the given verb.
    pub fn new(verb: Verb) -> Request {
        Request {
            body: None,
            params: Vec::new(),
            path: ResourcePath::default(),
            verb,
        }
    }

    /// Attach an encoded payload to the request.
    pub fn body<S>(mut self, content_type: S, payload: Vec<u8>) -> Self
    where
        S: Into<String>,
    {
        let content_type = content_type.into();
        self.body = Some(Body {
            content_type,
            payload,
        });
        self
    }

    /// Mark the request so the server validates it but does not persist any change.
    pub fn dry_run(self) -> Self {
        self.param(DRY_RUN_PARAM, DRY_RUN_ALL)
    }

    /// Check if the request carries the dry-run directive in its query.
    pub fn is_dry_run(&self) -> bool {
        self.param_value(DRY_RUN_PARAM) == Some(DRY_RUN_ALL)
    }

    /// Attach a JSON encoded payload to the request.
    pub fn json<T>(self, body: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(body).context(TransportError)?;
        Ok(self.body(CONTENT_TYPE_JSON, payload))
    }

    /// Target a single resource in the collection.
    pub fn name<S>(mut self, name: S) -> Self
    where
        S: Into<String>,
    {
        let name = name.into();
        self.path.name = Some(name).filter(|name| !name.is_empty());
        self
    }

    /// Scope the collection to a namespace, an empty namespace targets cluster-scoped kinds.
    pub fn namespace<S>(mut self, namespace: S) -> Self
    where
        S: Into<String>,
    {
        let namespace = namespace.into();
        self.path.namespace = Some(namespace).filter(|namespace| !namespace.is_empty());
        self
    }

    /// Append a query parameter to the request.
    pub fn param<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Lookup the first value of a query parameter.
    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Select the resource collection the request is for.
    pub fn resource<S>(mut self, kind: S) -> Self
    where
        S: Into<String>,
    {
        self.path.kind = kind.into();
        self
    }

    /// Target a nested endpoint of the resource.
    pub fn subresource<S>(mut self, subresource: S) -> Self
    where
        S: Into<String>,
    {
        let subresource = subresource.into();
        self.path.subresource = Some(subresource).filter(|subresource| !subresource.is_empty());
        self
    }
}

/// Status and raw body of a response received from the API server.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Response {
    pub body: Vec<u8>,
    pub status: u16,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::PatchType;
    use super::Request;
    use super::ResourcePath;
    use super::Verb;
    use super::CONTENT_TYPE_JSON;

    #[test]
    fn render_collection() {
        let request = Request::new(Verb::Post)
            .resource("widgets")
            .namespace("ns1");
        assert_eq!(request.path.render(), "namespaces/ns1/widgets");
    }

    #[test]
    fn render_cluster_scoped() {
        let request = Request::new(Verb::Get)
            .resource("nodes")
            .namespace("")
            .name("n1");
        assert_eq!(request.path.namespace, None);
        assert_eq!(request.path.render(), "nodes/n1");
    }

    #[test]
    fn render_subresource() {
        let path = ResourcePath {
            kind: "virtualmachineinstancemigrations".into(),
            name: Some("m1".into()),
            namespace: Some("default".into()),
            subresource: Some("status".into()),
        };
        assert_eq!(
            path.render(),
            "namespaces/default/virtualmachineinstancemigrations/m1/status",
        );
    }

    #[test]
    fn dry_run_directive() {
        let request = Request::new(Verb::Put).resource("widgets").name("w1");
        assert!(!request.is_dry_run());
        let request = request.dry_run();
        assert!(request.is_dry_run());
        assert_eq!(
            request.params,
            vec![("dryRun".to_string(), "All".to_string())]
        );
    }

    #[test]
    fn json_body() {
        let request = Request::new(Verb::Post)
            .json(&json!({"metadata": {"name": "w1"}}))
            .unwrap();
        let body = request.body.unwrap();
        assert_eq!(body.content_type, CONTENT_TYPE_JSON);
        assert_eq!(body.payload, br#"{"metadata":{"name":"w1"}}"#.to_vec());
    }

    #[test]
    fn patch_content_types() {
        for patch in [PatchType::Json, PatchType::Merge, PatchType::StrategicMerge] {
            let content_type = patch.content_type();
            assert_eq!(PatchType::from_content_type(content_type), Some(patch));
        }
        assert_eq!(PatchType::from_content_type(CONTENT_TYPE_JSON), None);
    }
}
