//! Request and response body values.

use crate::error::{RequestError, TransportError, TransportErrorKind};
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub(crate) const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub(crate) const APPLICATION_JSON: &str = "application/json";

/// Body carried by a request configuration or a response.
///
/// Adapters receive whatever the request transform chain produced and
/// return raw `Text` or `Bytes`; the response transform chain may turn
/// those into `Json`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    #[default]
    Empty,
    Json(Value),
    Text(String),
    Bytes(Bytes),
}

impl Payload {
    /// Serialize any `Serialize` value into a `Json` payload.
    ///
    /// # Errors
    /// Returns `RequestError::Transform` if serialization fails.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, RequestError> {
        serde_json::to_value(value)
            .map(Payload::Json)
            .map_err(RequestError::transform)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Empty => true,
            Payload::Text(text) => text.is_empty(),
            Payload::Bytes(bytes) => bytes.is_empty(),
            Payload::Json(_) => false,
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Deserialize the payload into `T`.
    ///
    /// `Json` values are converted directly; `Text` and `Bytes` are parsed.
    ///
    /// # Errors
    /// Returns `RequestError::Transform` if the payload is empty or does not
    /// deserialize into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        let parsed = match self {
            Payload::Json(value) => T::deserialize(value),
            Payload::Text(text) => serde_json::from_str(text),
            Payload::Bytes(bytes) => serde_json::from_slice(bytes),
            Payload::Empty => {
                return Err(RequestError::transform("cannot deserialize an empty payload"));
            }
        };
        parsed.map_err(RequestError::transform)
    }

    /// Encode the payload into bytes for a transport.
    ///
    /// `Json` values are form-encoded when `content_type` is
    /// `application/x-www-form-urlencoded`, otherwise serialized as JSON.
    ///
    /// # Errors
    /// Returns `RequestError::Transport` of kind `Other` when the value
    /// cannot be encoded (e.g. nested objects in a form body).
    pub fn encode(&self, content_type: Option<&str>) -> Result<Bytes, RequestError> {
        match self {
            Payload::Empty => Ok(Bytes::new()),
            Payload::Text(text) => Ok(Bytes::from(text.clone())),
            Payload::Bytes(bytes) => Ok(bytes.clone()),
            Payload::Json(value) => {
                let is_form = content_type.is_some_and(|ct| ct.contains(FORM_URLENCODED));
                let encoded = if is_form {
                    serde_urlencoded::to_string(value)
                        .map(Bytes::from)
                        .map_err(|e| encode_error("form", e))?
                } else {
                    serde_json::to_vec(value)
                        .map(Bytes::from)
                        .map_err(|e| encode_error("json", e))?
                };
                Ok(encoded)
            }
        }
    }
}

fn encode_error(format: &str, err: impl Into<crate::error::BoxError>) -> RequestError {
    TransportError::new(
        TransportErrorKind::Other,
        format!("failed to encode request body as {format}"),
    )
    .with_source(err)
    .into()
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_owned())
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(bytes))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_json_by_default() {
        let payload = Payload::from(json!({"name": "alice"}));
        let bytes = payload.encode(None).unwrap();
        assert_eq!(&bytes[..], br#"{"name":"alice"}"#);
    }

    #[test]
    fn test_encode_form_when_content_type_is_form() {
        let payload = Payload::from(json!({"grant_type": "client_credentials", "scope": "a b"}));
        let bytes = payload
            .encode(Some("application/x-www-form-urlencoded;charset=utf-8"))
            .unwrap();
        assert_eq!(&bytes[..], b"grant_type=client_credentials&scope=a+b");
    }

    #[test]
    fn test_encode_nested_form_fails() {
        let payload = Payload::from(json!({"outer": {"inner": 1}}));
        let result = payload.encode(Some(FORM_URLENCODED));
        assert!(matches!(result, Err(RequestError::Transport(_))));
    }

    #[test]
    fn test_deserialize_from_text() {
        #[derive(serde::Deserialize)]
        struct User {
            id: u32,
        }
        let payload = Payload::from(r#"{"id": 7}"#);
        let user: User = payload.deserialize().unwrap();
        assert_eq!(user.id, 7);
    }

    #[test]
    fn test_is_empty() {
        assert!(Payload::Empty.is_empty());
        assert!(Payload::from("").is_empty());
        assert!(!Payload::from(json!(null)).is_empty());
    }
}
