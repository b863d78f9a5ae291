use reqwest::Client as ReqwestClient;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use url::Url;

use crate::Result;
use crate::auth::{Credentials, Signer};
use crate::exchange::policy::TimePolicy;
use crate::exchange::types::{NormalizedResponse, RequestSpec, TransportFailure};
use crate::exchange::Config;

/// Fixed client identifier; the exchange rejects requests without a `User-Agent`.
const CLIENT_IDENTIFIER: &str = concat!("delta-mcp/", env!("CARGO_PKG_VERSION"));

const API_KEY_HEADER: &str = "api-key";
const SIGNATURE_HEADER: &str = "signature";
const TIMESTAMP_HEADER: &str = "timestamp";

/// Signs and sends single REST calls.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone, Debug)]
pub struct ExchangeClient {
    host: Url,
    credentials: Credentials,
    signer: Signer,
    time: TimePolicy,
    client: ReqwestClient,
}

impl ExchangeClient {
    /// Builds a client with an HTTP pool configured from `config`.
    pub fn new(config: Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_IDENTIFIER));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = ReqwestClient::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Self::with_client(config, client)
    }

    /// Uses a caller-provided HTTP client. Its timeout and default headers are kept as-is.
    pub fn with_client(config: Config, client: ReqwestClient) -> Result<Self> {
        let host = config.base_url()?;
        let signer = config.credentials.signer();

        #[cfg(feature = "tracing")]
        tracing::info!(
            host = %host,
            api_key = %config.credentials.masked_key(),
            "initialized exchange client"
        );

        Ok(Self {
            host,
            credentials: config.credentials,
            signer,
            time: config.time,
            client,
        })
    }

    #[must_use]
    pub fn host(&self) -> &Url {
        &self.host
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Sends one request and classifies the outcome. Never retries.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            level = "debug",
            skip(self, request),
            fields(method = %request.endpoint.method, path = request.endpoint.path, status_code)
        )
    )]
    pub async fn call(
        &self,
        request: RequestSpec,
    ) -> std::result::Result<NormalizedResponse, TransportFailure> {
        let url = self.url(&request)?;
        let path = url.path().to_owned();
        let query = url.query().map(|q| format!("?{q}")).unwrap_or_default();
        let body = request.body.unwrap_or_default();
        let method = request.endpoint.method;

        let mut builder = self.client.request(method.clone(), url);
        if request.endpoint.requires_auth {
            builder = builder.headers(self.auth_headers(&method, &path, &query, &body)?);
        }
        if !body.is_empty() {
            builder = builder.body(body);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(%method, %path, %query, "sending request");

        let response = builder.send().await.inspect_err(|_e| {
            #[cfg(feature = "tracing")]
            tracing::warn!(%method, %path, error = %_e, "request failed");
        })?;
        let status = response.status();

        #[cfg(feature = "tracing")]
        tracing::Span::current().record("status_code", status.as_u16());

        let raw = response.text().await?;

        if status.as_u16() >= 400 {
            #[cfg(feature = "tracing")]
            tracing::warn!(%method, %path, status = status.as_u16(), body = %raw, "exchange returned an error status");

            return Ok(NormalizedResponse::from_error_body(status, &raw));
        }

        Ok(NormalizedResponse::from_success_body(status, &raw))
    }

    /// Final URL for `request`. The signed path and query are read back from this value.
    fn url(&self, request: &RequestSpec) -> std::result::Result<Url, TransportFailure> {
        let path = request
            .endpoint
            .resolve(request.path_param.as_deref())
            .map_err(TransportFailure::request)?;
        let path_and_query = format!("{path}{}", request.query_string());

        self.host
            .join(&path_and_query)
            .map_err(TransportFailure::request)
    }

    fn auth_headers(
        &self,
        method: &reqwest::Method,
        path: &str,
        query: &str,
        body: &[u8],
    ) -> std::result::Result<HeaderMap, TransportFailure> {
        let signature = self
            .signer
            .sign_at(self.time.now(), method, path, query, body);

        let mut headers = HeaderMap::new();
        headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(self.credentials.key()).map_err(TransportFailure::request)?,
        );
        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(&signature.hex).map_err(TransportFailure::request)?,
        );
        headers.insert(
            TIMESTAMP_HEADER,
            HeaderValue::from_str(&signature.timestamp).map_err(TransportFailure::request)?,
        );

        Ok(headers)
    }
}
