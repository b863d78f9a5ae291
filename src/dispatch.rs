//! Tool invocation: validate, call, normalize.
//!
//! [`Dispatcher::invoke`] is the single boundary that always yields a [`ToolResult`].
//! Validation failures never reach the network, exchange and transport failures are
//! rendered as error results, and a panic anywhere below is caught and reported the
//! same way.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt as _;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;
use crate::error::{Error, Kind};
use crate::exchange::{Config, Endpoint, ExchangeClient, RequestSpec};
use crate::tools::{self, ToolCall, ToolDefinition, ValidationError};

/// Product summaries beyond this count are elided from `get_products` output.
pub const MAX_LISTED_PRODUCTS: usize = 50;

/// One block of tool output.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    Text { text: String },
}

/// Outcome of exactly one tool invocation.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<Content>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolResult {
    #[must_use]
    pub fn success<S: Into<String>>(text: S) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: false,
        }
    }

    #[must_use]
    pub fn failure<S: Into<String>>(text: S) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: true,
        }
    }

    /// All text blocks joined by newlines.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|block| match block {
                Content::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The exchange wraps some payloads in `{"result": ...}` and returns others bare.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Wrapped(Value),
    Bare(Value),
}

impl Payload {
    #[must_use]
    pub fn from_body(body: Value) -> Self {
        match body {
            Value::Object(mut map) => match map.remove("result") {
                Some(inner) => Payload::Wrapped(inner),
                None => Payload::Bare(Value::Object(map)),
            },
            other => Payload::Bare(other),
        }
    }

    #[must_use]
    pub fn into_inner(self) -> Value {
        match self {
            Payload::Wrapped(value) | Payload::Bare(value) => value,
        }
    }
}

/// Maps tool invocations onto single exchange calls.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    client: ExchangeClient,
}

impl Dispatcher {
    #[must_use]
    pub fn new(client: ExchangeClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: Config) -> Result<Self> {
        Ok(Self::new(ExchangeClient::new(config)?))
    }

    #[must_use]
    pub fn definitions(&self) -> &'static [ToolDefinition] {
        tools::definitions()
    }

    #[must_use]
    pub fn client(&self) -> &ExchangeClient {
        &self.client
    }

    /// Runs one tool invocation to completion. Never panics and never returns a partial result.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "info", skip(self, arguments), fields(is_error))
    )]
    pub async fn invoke(&self, name: &str, arguments: &Map<String, Value>) -> ToolResult {
        let result = settle(name, self.run(name, arguments)).await;

        #[cfg(feature = "tracing")]
        {
            tracing::Span::current().record("is_error", result.is_error);
            if result.is_error {
                tracing::warn!(tool = name, reason = %result.text(), "tool call failed");
            } else {
                tracing::info!(tool = name, "tool call succeeded");
            }
        }

        result
    }

    async fn run(&self, name: &str, arguments: &Map<String, Value>) -> Result<String> {
        let call = tools::validate(name, arguments)?;

        let response = self.client.call(request_for(&call)?).await?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let error = response
                .error()
                .cloned()
                .unwrap_or_else(|| Value::String(status.to_string()));
            return Err(Error::exchange(Some(status), error));
        }
        if let Some(error) = response.error() {
            return Err(Error::exchange(None, error.clone()));
        }

        let payload = Payload::from_body(response.into_body());
        Ok(render(&call, payload.into_inner()))
    }
}

/// The single REST call behind each tool.
pub fn request_for(call: &ToolCall) -> Result<RequestSpec> {
    let spec = match call {
        ToolCall::GetAssets => RequestSpec::new(Endpoint::private(Method::GET, "/v2/assets")),
        ToolCall::GetProducts => RequestSpec::new(Endpoint::private(Method::GET, "/v2/products")),
        ToolCall::GetTicker { symbol } => {
            RequestSpec::new(Endpoint::private(Method::GET, "/v2/tickers/{symbol}"))
                .with_path_param(symbol.as_str())
        }
        ToolCall::PlaceOrder(order) => {
            RequestSpec::new(Endpoint::private(Method::POST, "/v2/orders")).with_json_body(order)?
        }
        ToolCall::GetWalletBalances => {
            RequestSpec::new(Endpoint::private(Method::GET, "/v2/wallet/balances"))
        }
        ToolCall::GetPositions { product_id } => {
            let mut spec = RequestSpec::new(Endpoint::private(Method::GET, "/v2/positions"));
            if let Some(product_id) = product_id {
                spec = spec.with_query("product_id", product_id);
            }
            spec
        }
        ToolCall::GetOpenOrders { product_id, state } => {
            let mut spec = RequestSpec::new(Endpoint::private(Method::GET, "/v2/orders"));
            if let Some(product_id) = product_id {
                spec = spec.with_query("product_ids", product_id);
            }
            if let Some(state) = state {
                spec = spec.with_query("states", state);
            }
            spec
        }
        ToolCall::CancelOrder(cancel) => {
            RequestSpec::new(Endpoint::private(Method::DELETE, "/v2/orders"))
                .with_json_body(cancel)?
        }
    };

    Ok(spec)
}

/// Drives `outcome` to completion, turning errors and panics into failure results.
async fn settle<F>(name: &str, outcome: F) -> ToolResult
where
    F: Future<Output = Result<String>>,
{
    match AssertUnwindSafe(outcome).catch_unwind().await {
        Ok(Ok(text)) => ToolResult::success(text),
        Ok(Err(err)) => ToolResult::failure(failure_text(name, &err)),
        Err(panic) => {
            let err = Error::internal(panic_message(panic.as_ref()));
            ToolResult::failure(failure_text(name, &err))
        }
    }
}

fn failure_text(name: &str, err: &Error) -> String {
    if err.kind() == Kind::Validation
        && let Some(validation) = err.downcast_ref::<ValidationError>()
    {
        return validation.to_string();
    }

    let context = tools::definition(name).map_or("Error", |definition| definition.failure_context);
    format!("{context}: {err}")
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_owned()
    }
}

fn render(call: &ToolCall, payload: Value) -> String {
    match call {
        ToolCall::GetAssets => titled("Available assets", &payload),
        ToolCall::GetProducts => render_products(&payload),
        ToolCall::GetTicker { symbol } => format!("Ticker data for {symbol}:\n{}", pretty(&payload)),
        ToolCall::PlaceOrder(_) => format!("Order placed successfully:\n{}", pretty(&payload)),
        ToolCall::GetWalletBalances => titled("Wallet balances", &payload),
        ToolCall::GetPositions { .. } => titled("Positions", &payload),
        ToolCall::GetOpenOrders { .. } => titled("Orders", &payload),
        ToolCall::CancelOrder(_) => format!("Order cancelled:\n{}", pretty(&payload)),
    }
}

fn titled(title: &str, payload: &Value) -> String {
    match payload {
        Value::Array(items) => format!("{title} ({} total):\n{}", items.len(), pretty(payload)),
        _ => format!("{title}:\n{}", pretty(payload)),
    }
}

fn render_products(payload: &Value) -> String {
    let Value::Array(products) = payload else {
        return titled("Available products", payload);
    };

    let mut lines = Vec::with_capacity(products.len().min(MAX_LISTED_PRODUCTS) + 2);
    lines.push(format!("Available products ({} total):", products.len()));
    lines.extend(
        products
            .iter()
            .take(MAX_LISTED_PRODUCTS)
            .map(product_summary),
    );
    if products.len() > MAX_LISTED_PRODUCTS {
        lines.push(format!(
            "... and {} more",
            products.len() - MAX_LISTED_PRODUCTS
        ));
    }

    lines.join("\n")
}

fn product_summary(product: &Value) -> String {
    let Value::Object(fields) = product else {
        return product.to_string();
    };

    let kind = fields.get("contract_type").or_else(|| fields.get("type"));
    format!(
        "id={} symbol={} type={}",
        scalar(fields.get("id")),
        scalar(fields.get("symbol")),
        scalar(kind)
    )
}

fn scalar(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "-".to_owned(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
