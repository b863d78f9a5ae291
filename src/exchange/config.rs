use std::env;
use std::time::Duration;

use bon::Builder;
use secrecy::SecretString;
use url::Url;

use crate::Result;
use crate::auth::Credentials;
use crate::error::Error;
use crate::exchange::policy::TimePolicy;

/// Regional REST endpoint used when no base URL is configured.
pub const DEFAULT_HOST: &str = "https://api.india.delta.exchange";

/// Upper bound on a single request, connect through body.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const API_KEY_VAR: &str = "DELTA_API_KEY";
const API_SECRET_VAR: &str = "DELTA_API_SECRET";
const BASE_URL_VAR: &str = "DELTA_BASE_URL";

/// Exchange client configuration, resolved once at startup.
#[non_exhaustive]
#[derive(Clone, Debug, Builder)]
pub struct Config {
    pub credentials: Credentials,
    #[builder(into, default = DEFAULT_HOST.to_owned())]
    pub host: String,
    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,
    #[builder(default)]
    pub time: TimePolicy,
}

impl Config {
    /// Reads `DELTA_API_KEY`, `DELTA_API_SECRET` and the optional `DELTA_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let key = required_var(API_KEY_VAR)?;
        let secret = required_var(API_SECRET_VAR)?;
        let host = env::var(BASE_URL_VAR)
            .ok()
            .filter(|value| !value.trim().is_empty());

        Self::from_raw(&key, secret, host.as_deref())
    }

    pub fn from_raw(key: &str, secret: String, host: Option<&str>) -> Result<Self> {
        if key.trim().is_empty() {
            return Err(Error::validation("api key must not be empty"));
        }
        if secret.is_empty() {
            return Err(Error::validation("api secret must not be empty"));
        }

        let config = Config::builder()
            .credentials(Credentials::new(key.trim(), SecretString::from(secret)))
            .host(host.unwrap_or(DEFAULT_HOST).trim())
            .build();
        config.base_url()?;

        Ok(config)
    }

    /// Parsed base URL; only scheme and authority are used, request paths replace any path.
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.host)?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(Error::validation(format!(
                "base url must be an http(s) URL, got `{}`",
                self.host
            )));
        }
        Ok(url)
    }
}

fn required_var(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::validation(format!("{name} is not set"))),
    }
}

#[cfg(test)]
#[expect(clippy::missing_assert_message, reason = "each test name states the expectation")]
mod tests {
    use super::*;
    use crate::error::Kind;

    #[test]
    fn builder_defaults() {
        let config = Config::builder()
            .credentials(Credentials::new("key", SecretString::from("secret")))
            .build();

        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.time, TimePolicy::System);
        assert_eq!(
            config.base_url().expect("default host parses").as_str(),
            "https://api.india.delta.exchange/"
        );
    }

    #[test]
    fn from_raw_overrides_host() {
        let config = Config::from_raw("key", "secret".to_owned(), Some("http://127.0.0.1:8080"))
            .expect("valid config");

        assert_eq!(config.host, "http://127.0.0.1:8080");
        assert_eq!(config.credentials.key(), "key");
    }

    #[test]
    fn from_raw_rejects_empty_credentials() {
        let err = Config::from_raw(" ", "secret".to_owned(), None).expect_err("input is rejected");
        assert_eq!(err.kind(), Kind::Validation);

        let err = Config::from_raw("key", String::new(), None).expect_err("input is rejected");
        assert_eq!(err.kind(), Kind::Validation);
    }

    #[test]
    fn from_raw_rejects_non_http_host() {
        let err = Config::from_raw("key", "secret".to_owned(), Some("ftp://example.com")).expect_err("input is rejected");
        assert_eq!(err.kind(), Kind::Validation);

        let err = Config::from_raw("key", "secret".to_owned(), Some("not a url")).expect_err("input is rejected");
        assert_eq!(err.kind(), Kind::Validation);
    }
}
