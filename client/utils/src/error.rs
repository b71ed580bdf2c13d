//! Errors encountered during API requests or reported by the remote server.
use anyhow::Error;
use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Status reason the server reports for optimistic concurrency failures.
pub const REASON_CONFLICT: &str = "Conflict";

/// The request was rejected because of a resource version mismatch.
#[derive(Debug, thiserror::Error)]
#[error("the resource was modified concurrently: {message}")]
pub struct ConflictError {
    pub message: String,
}

/// The server returned an empty API response.
#[derive(Debug, thiserror::Error)]
#[error("the server returned an empty API response")]
pub struct EmptyResponse;

/// Invalid API response received.
#[derive(Debug, thiserror::Error)]
#[error("invalid API response received: {response}")]
pub struct InvalidResponse {
    pub response: String,
}

/// The resource is not available, or access to it is restricted.
#[derive(Debug, thiserror::Error)]
#[error("the resource is not available, or access to it is restricted: {message}")]
pub struct NotFoundError {
    pub message: String,
}

/// The server refused to process the request.
#[derive(Debug, thiserror::Error)]
#[error("the server rejected the request with status {code} ({reason}): {message}")]
pub struct RejectedError {
    /// HTTP status code of the response.
    pub code: u16,

    /// Message returned by the server, or the raw response body.
    pub message: String,

    /// Machine readable reason returned by the server, if any.
    pub reason: String,
}

/// Error refers to a resource with name.
#[derive(Debug, thiserror::Error)]
#[error("error refers to {kind} '{name}'")]
pub struct ResourceIdentifier {
    /// Collection of the resource the error refers to.
    pub kind: String,

    /// Name of the resource the error refers to.
    pub name: String,
}

impl ResourceIdentifier {
    /// Resource identifier context for the given resource collection and name.
    pub fn reference<S1, S2>(kind: S1, name: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        ResourceIdentifier {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// Unable to send the request or read the response.
#[derive(Debug, thiserror::Error)]
#[error("unable to exchange request and response with the API server")]
pub struct TransportError;

/// Status object returned by the API server alongside failed responses.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: Option<u16>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub reason: Option<String>,

    #[serde(default)]
    pub status: Option<String>,
}

/// Check the status of an API response, converting failures into classified errors.
///
/// Successful response bodies are ignored.
pub fn check(code: u16, body: &[u8]) -> Result<()> {
    if is_success(code) {
        return Ok(());
    }
    Err(classify(code, body))
}

/// Decode the body of an API response and correctly handle errors in the process.
pub fn inspect<T>(code: u16, body: &[u8]) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    if !is_success(code) {
        return Err(classify(code, body));
    }

    // On success decode the payload, if any, into the requested type.
    if body.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice::<T>(body)
        .map_err(|error| {
            let response = String::from_utf8_lossy(body).into_owned();
            let decode = InvalidResponse { response };
            anyhow::anyhow!(error).context(decode)
        })
        .map(Some)
}

/// Check if an error was caused by an optimistic concurrency conflict.
pub fn is_conflict(error: &Error) -> bool {
    error.downcast_ref::<ConflictError>().is_some()
}

/// Check if an error was caused by the resource not being found.
pub fn is_not_found(error: &Error) -> bool {
    error.downcast_ref::<NotFoundError>().is_some()
}

/// Check if an error was caused by the server refusing the request.
pub fn is_rejected(error: &Error) -> bool {
    error.downcast_ref::<RejectedError>().is_some()
}

/// Check if an error was caused by a failure to talk to the server.
pub fn is_transport(error: &Error) -> bool {
    error.downcast_ref::<TransportError>().is_some()
}

fn is_success(code: u16) -> bool {
    (200..300).contains(&code)
}

/// Convert a failed response into the matching error type.
fn classify(code: u16, body: &[u8]) -> Error {
    let text = String::from_utf8_lossy(body).into_owned();
    let status = serde_json::from_slice::<Status>(body).unwrap_or_default();
    let message = status.message.unwrap_or(text);
    let reason = status.reason;
    match code {
        404 => anyhow::anyhow!(NotFoundError { message }),
        409 if reason.is_none() || reason.as_deref() == Some(REASON_CONFLICT) => {
            anyhow::anyhow!(ConflictError { message })
        }
        _ => anyhow::anyhow!(RejectedError {
            code,
            message,
            reason: reason.unwrap_or_default(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;
    use serde_json::json;
    use serde_json::Value as Json;

    use super::*;

    fn status(code: u16, reason: &str, message: &str) -> Vec<u8> {
        let status = json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "code": code,
            "reason": reason,
            "message": message,
        });
        serde_json::to_vec(&status).unwrap()
    }

    #[test]
    fn check_success_ignores_body() {
        check(201, b"not json at all").unwrap();
        check(200, b"").unwrap();
    }

    #[test]
    fn conflict_from_status_reason() {
        let body = status(409, "Conflict", "the object has been modified");
        let error = check(409, &body).unwrap_err();
        assert!(is_conflict(&error));
        assert!(!is_rejected(&error));
        let conflict = error.downcast_ref::<ConflictError>().unwrap();
        assert_eq!(conflict.message, "the object has been modified");
    }

    #[test]
    fn conflict_without_status_body() {
        let error = check(409, b"").unwrap_err();
        assert!(is_conflict(&error));
    }

    #[test]
    fn already_exists_is_rejected() {
        let body = status(409, "AlreadyExists", "widgets \"w1\" already exists");
        let error = check(409, &body).unwrap_err();
        assert!(!is_conflict(&error));
        let rejected = error.downcast_ref::<RejectedError>().unwrap();
        assert_eq!(rejected.code, 409);
        assert_eq!(rejected.reason, "AlreadyExists");
    }

    #[test]
    fn admission_rejection_keeps_message() {
        let body = status(422, "Invalid", "spec.domain: Required value");
        let error = check(422, &body).unwrap_err();
        let rejected = error.downcast_ref::<RejectedError>().unwrap();
        assert_eq!(rejected.code, 422);
        assert_eq!(rejected.reason, "Invalid");
        assert_eq!(rejected.message, "spec.domain: Required value");
    }

    #[test]
    fn rejection_with_raw_body() {
        let error = check(500, b"upstream exploded").unwrap_err();
        let rejected = error.downcast_ref::<RejectedError>().unwrap();
        assert_eq!(rejected.message, "upstream exploded");
        assert_eq!(rejected.reason, "");
    }

    #[test]
    fn not_found() {
        let body = status(404, "NotFound", "widgets \"w1\" not found");
        let error = inspect::<Json>(404, &body).unwrap_err();
        assert!(is_not_found(&error));
    }

    #[test]
    fn classification_survives_context() {
        let error = check(409, b"")
            .with_context(|| ResourceIdentifier::reference("widgets", "w1"))
            .unwrap_err();
        assert!(is_conflict(&error));
        assert_eq!(error.to_string(), "error refers to widgets 'w1'");
    }

    #[test]
    fn inspect_decodes_payload() {
        let value = inspect::<Json>(200, br#"{"a": 1}"#).unwrap();
        assert_eq!(value, Some(json!({"a": 1})));
    }

    #[test]
    fn inspect_empty_payload() {
        let value = inspect::<Json>(200, b"").unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn inspect_invalid_payload() {
        let error = inspect::<Json>(200, b"{").unwrap_err();
        let invalid = error.downcast_ref::<InvalidResponse>().unwrap();
        assert_eq!(invalid.response, "{");
    }
}
