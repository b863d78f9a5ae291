use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

use reqwest::StatusCode;
use serde_json::Value;

use crate::exchange::TransportFailure;
use crate::tools::ValidationError;

/// Broad classification of everything that can go wrong while serving a tool call.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Bad tool name or arguments, caught before anything reaches the network.
    Validation,
    /// Timeout, connection failure, or a local fault while preparing the request.
    Transport,
    /// The exchange answered with an error body.
    Exchange,
    /// Anything else, including panics caught at the dispatcher boundary.
    Internal,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Validation => "validation error",
            Kind::Transport => "transport error",
            Kind::Exchange => "exchange error",
            Kind::Internal => "unexpected failure",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl Error {
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
            backtrace: Backtrace::capture(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    #[must_use]
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let e = self.source.as_deref()?;
        e.downcast_ref::<E>()
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Validation {
            reason: message.into(),
        }
        .into()
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::with_source(
            Kind::Internal,
            Unexpected {
                message: message.into(),
            },
        )
    }

    pub fn exchange(status: Option<StatusCode>, error: Value) -> Self {
        ExchangeError { status, error }.into()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{}: {}", self.kind, src),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// Configuration or other locally detected misuse that is not tied to a tool argument.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub reason: String,
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid: {}", self.reason)
    }
}

impl StdError for Validation {}

/// Error payload relayed from the exchange.
///
/// `status` is `None` when the exchange reported an error inside a successful HTTP response.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeError {
    pub status: Option<StatusCode>,
    pub error: Value,
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {})", self.error, status.as_u16()),
            None => write!(f, "{}", self.error),
        }
    }
}

impl StdError for ExchangeError {}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unexpected {
    pub message: String,
}

impl fmt::Display for Unexpected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for Unexpected {}

impl From<Validation> for Error {
    fn from(err: Validation) -> Self {
        Error::with_source(Kind::Validation, err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::with_source(Kind::Validation, err)
    }
}

impl From<TransportFailure> for Error {
    fn from(err: TransportFailure) -> Self {
        Error::with_source(Kind::Transport, err)
    }
}

impl From<ExchangeError> for Error {
    fn from(err: ExchangeError) -> Self {
        Error::with_source(Kind::Exchange, err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::with_source(Kind::Internal, err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::with_source(Kind::Validation, err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source(Kind::Internal, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(Kind::Internal, err)
    }
}

#[cfg(test)]
#[expect(clippy::missing_assert_message, reason = "each test name states the expectation")]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn display_prefixes_kind() {
        let err = Error::exchange(
            Some(StatusCode::BAD_REQUEST),
            json!({"code": "insufficient_margin"}),
        );

        assert_eq!(err.kind(), Kind::Exchange);
        assert_eq!(
            err.to_string(),
            r#"exchange error: {"code":"insufficient_margin"} (HTTP 400)"#
        );
    }

    #[test]
    fn downcast_recovers_source() {
        let err = Error::validation("DELTA_API_KEY is not set");

        let validation = err.downcast_ref::<Validation>().expect("validation source");
        assert_eq!(validation.reason, "DELTA_API_KEY is not set");
        assert!(err.downcast_ref::<ExchangeError>().is_none());
    }
}
