//! In-memory API server to exercise clients in unit tests.
//!
//! The server stores objects as JSON documents, keyed by kind, namespace and name.
//! It implements enough of the structured-resource API conventions to verify dry-run
//! behaviour: optimistic concurrency, patches, delete options and admission rejections.
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use anyhow::Result;
use serde_json::json;
use serde_json::Value as Json;

use crate::request::PatchType;
use crate::request::Request;
use crate::request::Response;
use crate::request::Verb;
use crate::typed::DeleteOptions;
use crate::typed::PropagationPolicy;

/// Deletion timestamp assigned to objects marked for foreground deletion.
const DELETION_TIMESTAMP: &str = "2000-01-01T00:00:00Z";

/// Finalizer holding objects marked for foreground deletion.
const FOREGROUND_FINALIZER: &str = "foregroundDeletion";

/// Outcome of request handling, failures are responses too.
type Handled = std::result::Result<Response, Response>;

/// Storage key of an object: (kind, namespace, name).
type ObjectKey = (String, String, String);

/// In-memory API server to exercise clients in unit tests.
#[derive(Clone, Default)]
pub struct ApiServer {
    state: Arc<Mutex<ServerState>>,
}

impl ApiServer {
    /// Initialise an empty server.
    pub fn new() -> ApiServer {
        ApiServer::default()
    }

    /// Mark objects deleted with foreground propagation instead of removing them.
    ///
    /// Marked objects stay readable with `deletionTimestamp` and the `foregroundDeletion`
    /// finalizer set, like they do while a real server waits on their dependents.
    /// Deletes with any other propagation policy remove them.
    pub fn defer_foreground_deletes(&self) -> &Self {
        self.state.lock().unwrap().defer_foreground = true;
        self
    }

    /// Persist changes requested with the dry-run directive, like a broken server would.
    pub fn ignore_dry_run(&self) -> &Self {
        self.state.lock().unwrap().ignore_dry_run = true;
        self
    }

    /// Fail the next `count` update and patch requests with a conflict.
    pub fn inject_conflicts(&self, count: u32) -> &Self {
        self.state.lock().unwrap().conflicts = count;
        self
    }

    /// Store an object directly, bypassing admission.
    ///
    /// Returns the object as stored, with `uid` and `resourceVersion` assigned.
    pub fn insert<S>(&self, kind: S, mut object: Json) -> Json
    where
        S: Into<String>,
    {
        let mut state = self.state.lock().unwrap();
        let name = meta_str(&object, "name");
        let namespace = meta_str(&object, "namespace");
        let version = state.next_version();
        set_meta(&mut object, "uid", uuid::Uuid::new_v4().to_string());
        set_meta(&mut object, "resourceVersion", version);
        state
            .objects
            .insert((kind.into(), namespace, name), object.clone());
        object
    }

    /// Number of objects stored across all kinds.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().objects.len()
    }

    /// Check if the server stores no objects at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lookup a stored object.
    pub fn object(&self, kind: &str, namespace: &str, name: &str) -> Option<Json> {
        let key = (kind.to_string(), namespace.to_string(), name.to_string());
        self.state.lock().unwrap().objects.get(&key).cloned()
    }

    /// Reject create, update and patch requests for a kind, like an admission webhook would.
    pub fn reject<S1, S2>(&self, kind: S1, message: S2) -> &Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        self.state
            .lock()
            .unwrap()
            .rejections
            .insert(kind.into(), message.into());
        self
    }

    /// All requests received so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Change the version of a stored object, like a concurrent writer would.
    pub fn touch(&self, kind: &str, namespace: &str, name: &str) {
        let key = (kind.to_string(), namespace.to_string(), name.to_string());
        let mut state = self.state.lock().unwrap();
        let version = state.next_version();
        if let Some(object) = state.objects.get_mut(&key) {
            set_meta(object, "resourceVersion", version);
        }
    }
}

#[async_trait::async_trait]
impl crate::IRest for ApiServer {
    async fn execute(&self, request: Request) -> Result<Response> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());
        let response = match request.verb {
            Verb::Delete => state.delete(&request),
            Verb::Get => state.get(&request),
            Verb::Patch => state.patch(&request),
            Verb::Post => state.create(&request),
            Verb::Put => state.update(&request),
        };
        match response {
            Ok(response) | Err(response) => Ok(response),
        }
    }
}

/// Internal state of the in-memory server.
#[derive(Default)]
struct ServerState {
    conflicts: u32,
    defer_foreground: bool,
    ignore_dry_run: bool,
    objects: BTreeMap<ObjectKey, Json>,
    rejections: BTreeMap<String, String>,
    requests: Vec<Request>,
    version: u64,
}

impl ServerState {
    fn admit(&self, request: &Request) -> std::result::Result<(), Response> {
        match self.rejections.get(&request.path.kind) {
            None => Ok(()),
            Some(message) => Err(status(422, "Invalid", message.clone())),
        }
    }

    fn create(&mut self, request: &Request) -> Handled {
        let kind = request.path.kind.clone();
        let namespace = request.path.namespace.clone().unwrap_or_default();
        let mut object = decode_body(request)?;
        let name = meta_str(&object, "name");
        if name.is_empty() {
            let message = "metadata.name: Required value: name is required".to_string();
            return Err(status(422, "Invalid", message));
        }
        self.admit(request)?;

        let key = (kind, namespace, name);
        if self.objects.contains_key(&key) {
            let message = format!("{} \"{}\" already exists", key.0, key.2);
            return Err(status(409, "AlreadyExists", message));
        }
        if !key.1.is_empty() {
            set_meta(&mut object, "namespace", key.1.clone());
        }
        set_meta(&mut object, "uid", uuid::Uuid::new_v4().to_string());
        if self.dry_run(request.is_dry_run()) {
            return Ok(object_response(201, &object));
        }
        let version = self.next_version();
        set_meta(&mut object, "resourceVersion", version);
        self.objects.insert(key, object.clone());
        Ok(object_response(201, &object))
    }

    fn delete(&mut self, request: &Request) -> Handled {
        let key = object_key(request)?;
        let options = match &request.body {
            Some(body) if !body.payload.is_empty() => {
                serde_json::from_slice::<DeleteOptions>(&body.payload).map_err(bad_request)?
            }
            _ => DeleteOptions::default(),
        };
        let current = self.lookup(&key)?;
        if self.dry_run(options.is_dry_run() || request.is_dry_run()) {
            return Ok(object_response(200, &current));
        }
        let foreground = options.propagation_policy == Some(PropagationPolicy::Foreground);
        if foreground && self.defer_foreground {
            let marked = self.mark_deleted(key, current);
            return Ok(object_response(200, &marked));
        }
        self.objects.remove(&key);
        Ok(object_response(200, &current))
    }

    /// Flag an object as being deleted, keeping it stored.
    fn mark_deleted(&mut self, key: ObjectKey, mut object: Json) -> Json {
        if !meta_str(&object, "deletionTimestamp").is_empty() {
            return object;
        }
        let version = self.next_version();
        set_meta(&mut object, "deletionTimestamp", DELETION_TIMESTAMP.to_string());
        set_meta(&mut object, "resourceVersion", version);
        if let Some(meta) = object.get_mut("metadata").and_then(Json::as_object_mut) {
            meta.insert("finalizers".into(), json!([FOREGROUND_FINALIZER]));
        }
        self.objects.insert(key, object.clone());
        object
    }

    fn dry_run(&self, requested: bool) -> bool {
        requested && !self.ignore_dry_run
    }

    fn get(&self, request: &Request) -> Handled {
        let key = object_key(request)?;
        let object = self.lookup(&key)?;
        Ok(object_response(200, &object))
    }

    fn lookup(&self, key: &ObjectKey) -> std::result::Result<Json, Response> {
        self.objects.get(key).cloned().ok_or_else(|| {
            let message = format!("{} \"{}\" not found", key.0, key.2);
            status(404, "NotFound", message)
        })
    }

    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    fn patch(&mut self, request: &Request) -> Handled {
        let key = object_key(request)?;
        let body = request.body.as_ref().ok_or_else(|| {
            let message = "patch requests must carry a body".to_string();
            status(400, "BadRequest", message)
        })?;
        let patch_type = PatchType::from_content_type(&body.content_type).ok_or_else(|| {
            let message = format!(
                "the body of the request was in an unknown format: {}",
                body.content_type,
            );
            status(415, "UnsupportedMediaType", message)
        })?;
        self.admit(request)?;
        let current = self.lookup(&key)?;
        self.take_conflict(&key)?;

        let mut object = current.clone();
        match patch_type {
            PatchType::Json => {
                let patch = serde_json::from_slice::<json_patch::Patch>(&body.payload)
                    .map_err(bad_request)?;
                json_patch::patch(&mut object, &patch)
                    .map_err(|error| status(422, "Invalid", error.to_string()))?;
            }
            PatchType::Merge | PatchType::StrategicMerge => {
                let patch = serde_json::from_slice::<Json>(&body.payload).map_err(bad_request)?;
                json_patch::merge(&mut object, &patch);
            }
        }
        self.commit(request, key, &current, object)
    }

    fn take_conflict(&mut self, key: &ObjectKey) -> std::result::Result<(), Response> {
        if self.conflicts == 0 {
            return Ok(());
        }
        self.conflicts -= 1;
        Err(conflict(key))
    }

    fn update(&mut self, request: &Request) -> Handled {
        let key = object_key(request)?;
        let object = decode_body(request)?;
        let name = meta_str(&object, "name");
        if !name.is_empty() && name != key.2 {
            let message = "the name of the object does not match the name on the URL".to_string();
            return Err(status(400, "BadRequest", message));
        }
        self.admit(request)?;
        let current = self.lookup(&key)?;
        self.take_conflict(&key)?;

        let expected = meta_str(&current, "resourceVersion");
        let given = meta_str(&object, "resourceVersion");
        if !given.is_empty() && given != expected {
            return Err(conflict(&key));
        }
        self.commit(request, key, &current, object)
    }

    /// Finalise an update or patch, persisting it unless the request is a dry-run.
    fn commit(
        &mut self,
        request: &Request,
        key: ObjectKey,
        current: &Json,
        mut object: Json,
    ) -> Handled {
        set_meta(&mut object, "name", key.2.clone());
        set_meta(&mut object, "uid", meta_str(current, "uid"));
        if !key.1.is_empty() {
            set_meta(&mut object, "namespace", key.1.clone());
        }
        if self.dry_run(request.is_dry_run()) {
            set_meta(&mut object, "resourceVersion", meta_str(current, "resourceVersion"));
            return Ok(object_response(200, &object));
        }
        let version = self.next_version();
        set_meta(&mut object, "resourceVersion", version);
        self.objects.insert(key, object.clone());
        Ok(object_response(200, &object))
    }
}

fn bad_request(error: serde_json::Error) -> Response {
    status(400, "BadRequest", error.to_string())
}

fn conflict(key: &ObjectKey) -> Response {
    let message = format!(
        "Operation cannot be fulfilled on {} \"{}\": the object has been modified; \
        please apply your changes to the latest version and try again",
        key.0, key.2,
    );
    status(409, "Conflict", message)
}

fn decode_body(request: &Request) -> std::result::Result<Json, Response> {
    let body = request.body.as_ref().ok_or_else(|| {
        let message = "request must carry a body".to_string();
        status(400, "BadRequest", message)
    })?;
    let object = serde_json::from_slice::<Json>(&body.payload).map_err(bad_request)?;
    if !object.is_object() {
        let message = "request body must be an object".to_string();
        return Err(status(400, "BadRequest", message));
    }
    Ok(object)
}

fn meta_str(object: &Json, field: &str) -> String {
    object
        .get("metadata")
        .and_then(|meta| meta.get(field))
        .and_then(Json::as_str)
        .unwrap_or_default()
        .to_string()
}

fn object_key(request: &Request) -> std::result::Result<ObjectKey, Response> {
    let name = match &request.path.name {
        Some(name) => name.clone(),
        None => {
            let message = "resource name may not be empty".to_string();
            return Err(status(405, "MethodNotAllowed", message));
        }
    };
    let namespace = request.path.namespace.clone().unwrap_or_default();
    Ok((request.path.kind.clone(), namespace, name))
}

fn object_response(code: u16, object: &Json) -> Response {
    Response {
        body: serde_json::to_vec(object).unwrap_or_default(),
        status: code,
    }
}

fn set_meta(object: &mut Json, field: &str, value: String) {
    let Some(object) = object.as_object_mut() else {
        return;
    };
    let meta = object
        .entry("metadata")
        .or_insert_with(|| Json::Object(Default::default()));
    if let Some(meta) = meta.as_object_mut() {
        meta.insert(field.to_string(), Json::String(value));
    }
}

fn status(code: u16, reason: &str, message: String) -> Response {
    let status = json!({
        "apiVersion": "v1",
        "kind": "Status",
        "metadata": {},
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code,
    });
    object_response(code, &status)
}
