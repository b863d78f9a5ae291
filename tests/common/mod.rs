#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::time::Duration;

use delta_mcp::Dispatcher;
use delta_mcp::auth::Credentials;
use delta_mcp::exchange::{Config, ExchangeClient, TimePolicy};
use httpmock::MockServer;
use secrecy::SecretString;
use serde_json::{Map, Value};

pub const API_KEY: &str = "test-key";
pub const SECRET: &str = "test-secret";
pub const TIMESTAMP: i64 = 1_700_000_000;

pub fn config(host: &str) -> Config {
    Config::builder()
        .credentials(Credentials::new(API_KEY, SecretString::from(SECRET)))
        .host(host)
        .time(TimePolicy::Fixed(TIMESTAMP))
        .build()
}

pub fn config_with_timeout(host: &str, timeout: Duration) -> Config {
    let mut config = config(host);
    config.timeout = timeout;
    config
}

pub fn client(server: &MockServer) -> anyhow::Result<ExchangeClient> {
    Ok(ExchangeClient::new(config(&server.base_url()))?)
}

pub fn dispatcher(server: &MockServer) -> anyhow::Result<Dispatcher> {
    Ok(Dispatcher::from_config(config(&server.base_url()))?)
}

pub fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}
