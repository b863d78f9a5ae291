use std::fmt;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::{Value, json};

use crate::Result;

/// A REST route. `path` may contain a single `{…}` placeholder filled from
/// [`RequestSpec::path_param`].
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub method: Method,
    pub path: &'static str,
    pub requires_auth: bool,
}

impl Endpoint {
    #[must_use]
    pub const fn private(method: Method, path: &'static str) -> Self {
        Self {
            method,
            path,
            requires_auth: true,
        }
    }

    #[must_use]
    pub const fn public(method: Method, path: &'static str) -> Self {
        Self {
            method,
            path,
            requires_auth: false,
        }
    }

    /// Substitutes the path parameter, if the route has one.
    ///
    /// The parameter must stay a single literal segment: separators, dot segments,
    /// percent escapes and control characters would let URL normalization route the
    /// request elsewhere.
    pub(crate) fn resolve(&self, param: Option<&str>) -> std::result::Result<String, String> {
        let Some((prefix, template)) = self.path.split_once('{') else {
            return match param {
                None => Ok(self.path.to_owned()),
                Some(_) => Err(format!("{} takes no path parameter", self.path)),
            };
        };
        let Some((_, suffix)) = template.split_once('}') else {
            return Err(format!("malformed route template {}", self.path));
        };
        let Some(param) = param else {
            return Err(format!("{} requires a path parameter", self.path));
        };
        if matches!(param, "" | "." | "..")
            || param.contains(['/', '\\', '?', '#', '%'])
            || param.contains(char::is_control)
        {
            return Err(format!("invalid path parameter `{param}`"));
        }

        Ok(format!("{prefix}{param}{suffix}"))
    }
}

/// One outbound call: route, optional path parameter, ordered query pairs and
/// pre-serialized body bytes.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestSpec {
    pub endpoint: Endpoint,
    pub path_param: Option<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl RequestSpec {
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            path_param: None,
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_path_param<S: Into<String>>(mut self, param: S) -> Self {
        self.path_param = Some(param.into());
        self
    }

    /// Appends a query pair; pairs are sent and signed in insertion order.
    #[must_use]
    pub fn with_query<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Serializes `body` to compact JSON once; these bytes are both sent and signed.
    pub fn with_json_body<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }

    /// `?k=v&k2=v2`, or empty when there are no pairs.
    #[must_use]
    pub fn query_string(&self) -> String {
        if self.query.is_empty() {
            return String::new();
        }

        let joined = self
            .query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("?{joined}")
    }
}

/// Response body after HTTP-level classification, not yet unwrapped.
///
/// Error statuses are folded into `{"error": ...}` so callers only have to look
/// for the `error` key.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedResponse {
    status: StatusCode,
    body: Value,
}

impl NormalizedResponse {
    #[must_use]
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    pub(crate) fn from_error_body(status: StatusCode, raw: &str) -> Self {
        let error = serde_json::from_str::<Value>(raw)
            .ok()
            .and_then(|value| match value {
                Value::Object(mut map) => map.remove("error"),
                _ => None,
            })
            .filter(|error| !error.is_null())
            .unwrap_or_else(|| json!({"code": "unknown_error", "message": raw}));

        Self::new(status, json!({ "error": error }))
    }

    pub(crate) fn from_success_body(status: StatusCode, raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(body) => Self::new(status, body),
            Err(_) => Self::new(
                status,
                json!({"error": {"code": "invalid_response", "message": raw}}),
            ),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// The `error` member, if the body is an object carrying a non-null one.
    #[must_use]
    pub fn error(&self) -> Option<&Value> {
        self.body.get("error").filter(|error| !error.is_null())
    }

    #[must_use]
    pub fn into_body(self) -> Value {
        self.body
    }
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TransportKind {
    Timeout,
    ConnectionError,
    RequestError,
}

/// The request never produced an HTTP response.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportFailure {
    pub kind: TransportKind,
    pub message: String,
}

impl TransportFailure {
    pub(crate) fn new<S: Into<String>>(kind: TransportKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn request<E: fmt::Display>(err: E) -> Self {
        Self::new(TransportKind::RequestError, err.to_string())
    }
}

impl From<reqwest::Error> for TransportFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(TransportKind::Timeout, "request timed out")
        } else if err.is_connect() {
            Self::new(TransportKind::ConnectionError, err.to_string())
        } else {
            Self::request(err)
        }
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for TransportFailure {}

#[cfg(test)]
#[expect(clippy::missing_assert_message, reason = "each test name states the expectation")]
mod tests {
    use super::*;

    #[test]
    fn resolve_path_param() {
        let endpoint = Endpoint::private(Method::GET, "/v2/tickers/{symbol}");

        assert_eq!(
            endpoint.resolve(Some("BTCUSD")).as_deref(),
            Ok("/v2/tickers/BTCUSD")
        );
        assert!(endpoint.resolve(None).is_err());
        assert!(endpoint.resolve(Some("BTC/USD")).is_err());
        assert!(endpoint.resolve(Some("")).is_err());
    }

    #[test]
    fn resolve_rejects_segments_that_normalize_away() {
        let endpoint = Endpoint::private(Method::GET, "/v2/tickers/{symbol}");

        for param in [".", "..", "a\\b", "%2e%2e", "BTC\tUSD", "BTC\nUSD"] {
            assert!(endpoint.resolve(Some(param)).is_err(), "{param:?} accepted");
        }
        assert_eq!(
            endpoint.resolve(Some("BTC.USD")).as_deref(),
            Ok("/v2/tickers/BTC.USD")
        );
    }

    #[test]
    fn resolve_plain_path() {
        let endpoint = Endpoint::private(Method::GET, "/v2/assets");

        assert_eq!(endpoint.resolve(None).as_deref(), Ok("/v2/assets"));
        assert!(endpoint.resolve(Some("x")).is_err());
    }

    #[test]
    fn query_string_keeps_insertion_order() {
        let spec = RequestSpec::new(Endpoint::private(Method::GET, "/v2/orders"))
            .with_query("states", "open")
            .with_query("product_ids", 27);

        assert_eq!(spec.query_string(), "?states=open&product_ids=27");
        assert_eq!(
            RequestSpec::new(Endpoint::public(Method::GET, "/v2/products")).query_string(),
            ""
        );
    }

    #[test]
    fn error_body_with_error_field() {
        let response = NormalizedResponse::from_error_body(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"code":"SignatureExpired"},"success":false}"#,
        );

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.error(), Some(&json!({"code": "SignatureExpired"})));
    }

    #[test]
    fn error_body_not_json() {
        let response =
            NormalizedResponse::from_error_body(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");

        assert_eq!(
            response.error(),
            Some(&json!({"code": "unknown_error", "message": "<html>bad gateway</html>"}))
        );
    }

    #[test]
    fn error_body_json_without_error_field() {
        let response =
            NormalizedResponse::from_error_body(StatusCode::FORBIDDEN, r#"{"success":false}"#);

        assert_eq!(
            response.error(),
            Some(&json!({"code": "unknown_error", "message": r#"{"success":false}"#}))
        );
    }

    #[test]
    fn error_status_with_null_error_field() {
        let response = NormalizedResponse::from_error_body(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":null,"success":false}"#,
        );

        assert_eq!(
            response.error(),
            Some(&json!({"code": "unknown_error", "message": r#"{"error":null,"success":false}"#}))
        );
    }

    #[test]
    fn success_body_passes_through() {
        let response =
            NormalizedResponse::from_success_body(StatusCode::OK, r#"{"result":[1,2],"success":true}"#);

        assert!(response.error().is_none());
        assert_eq!(response.into_body(), json!({"result": [1, 2], "success": true}));
    }

    #[test]
    fn null_error_is_not_an_error() {
        let response = NormalizedResponse::new(StatusCode::OK, json!({"error": null, "result": []}));

        assert!(response.error().is_none());
    }

    #[test]
    fn transport_failure_display() {
        let failure = TransportFailure::new(TransportKind::Timeout, "request timed out");

        assert_eq!(failure.to_string(), "timeout: request timed out");
        assert_eq!(TransportKind::ConnectionError.to_string(), "connection_error");
    }
}
