use std::fmt;

use serde::Serialize;

/// Order side.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub const VALUES: &'static [&'static str] = &["buy", "sell"];

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "buy" => Some(Side::Buy),
            "sell" => Some(Side::Sell),
            _ => None,
        }
    }
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderType {
    MarketOrder,
    #[default]
    LimitOrder,
}

impl OrderType {
    pub const VALUES: &'static [&'static str] = &["market_order", "limit_order"];

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "market_order" => Some(OrderType::MarketOrder),
            "limit_order" => Some(OrderType::LimitOrder),
            _ => None,
        }
    }
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimeInForce {
    #[default]
    Gtc,
    Ioc,
    Fok,
}

impl TimeInForce {
    pub const VALUES: &'static [&'static str] = &["gtc", "ioc", "fok"];

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "gtc" => Some(TimeInForce::Gtc),
            "ioc" => Some(TimeInForce::Ioc),
            "fok" => Some(TimeInForce::Fok),
            _ => None,
        }
    }
}

/// Order states accepted by the open-orders filter.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum OrderState {
    Open,
    Pending,
}

impl OrderState {
    pub const VALUES: &'static [&'static str] = &["open", "pending"];

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(OrderState::Open),
            "pending" => Some(OrderState::Pending),
            _ => None,
        }
    }
}

/// Body of `POST /v2/orders`.
///
/// Field order is the wire order. `size` and `limit_price` stay strings so no
/// precision is lost on the way to the exchange.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderRequest {
    pub product_id: i64,
    pub side: Side,
    pub size: String,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<String>,
}

impl OrderRequest {
    /// A good-till-cancelled limit order without a price; see [`Self::with_limit_price`].
    #[must_use]
    pub fn new<S: Into<String>>(product_id: i64, side: Side, size: S) -> Self {
        Self {
            product_id,
            side,
            size: size.into(),
            order_type: OrderType::default(),
            time_in_force: TimeInForce::default(),
            limit_price: None,
        }
    }

    #[must_use]
    pub fn with_limit_price<S: Into<String>>(mut self, limit_price: S) -> Self {
        self.limit_price = Some(limit_price.into());
        self
    }

    #[must_use]
    pub fn with_order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = order_type;
        self
    }

    #[must_use]
    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = time_in_force;
        self
    }
}

/// Body of `DELETE /v2/orders`.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CancelRequest {
    pub id: i64,
    pub product_id: i64,
}

/// A validated invocation, one variant per catalog entry.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolCall {
    GetAssets,
    GetProducts,
    GetTicker {
        symbol: String,
    },
    PlaceOrder(OrderRequest),
    GetWalletBalances,
    GetPositions {
        product_id: Option<i64>,
    },
    GetOpenOrders {
        product_id: Option<i64>,
        state: Option<OrderState>,
    },
    CancelOrder(CancelRequest),
}

impl ToolCall {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::GetAssets => "get_assets",
            ToolCall::GetProducts => "get_products",
            ToolCall::GetTicker { .. } => "get_ticker",
            ToolCall::PlaceOrder(_) => "place_order",
            ToolCall::GetWalletBalances => "get_wallet_balances",
            ToolCall::GetPositions { .. } => "get_positions",
            ToolCall::GetOpenOrders { .. } => "get_open_orders",
            ToolCall::CancelOrder(_) => "cancel_order",
        }
    }
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
}

impl ParamType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
        }
    }
}

/// One argument in a tool's input schema.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamType,
    pub required: bool,
    pub allowed: &'static [&'static str],
    pub default: Option<&'static str>,
    pub description: &'static str,
}

impl ParamSpec {
    pub(crate) const fn required(
        name: &'static str,
        kind: ParamType,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            kind,
            required: true,
            allowed: &[],
            default: None,
            description,
        }
    }

    pub(crate) const fn optional(
        name: &'static str,
        kind: ParamType,
        description: &'static str,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    pub(crate) const fn one_of(mut self, allowed: &'static [&'static str]) -> Self {
        self.allowed = allowed;
        self
    }

    pub(crate) const fn with_default(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }
}

/// A named operation and its argument schema.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
    /// Leading text of failure results, e.g. `Error getting assets`.
    pub failure_context: &'static str,
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationError {
    UnknownTool(String),
    MissingArgument {
        tool: &'static str,
        field: &'static str,
    },
    InvalidEnumValue {
        tool: &'static str,
        field: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },
    InvalidType {
        tool: &'static str,
        field: &'static str,
        expected: ParamType,
    },
}

impl ValidationError {
    /// The offending argument, or `None` for an unknown tool.
    #[must_use]
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ValidationError::UnknownTool(_) => None,
            ValidationError::MissingArgument { field, .. }
            | ValidationError::InvalidEnumValue { field, .. }
            | ValidationError::InvalidType { field, .. } => Some(field),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnknownTool(name) => write!(f, "Unknown tool: {name}"),
            ValidationError::MissingArgument { tool, field } => write!(
                f,
                "Invalid arguments for {tool}: missing required argument `{field}`"
            ),
            ValidationError::InvalidEnumValue {
                tool,
                field,
                value,
                allowed,
            } => write!(
                f,
                "Invalid arguments for {tool}: `{field}` must be one of {}, got `{value}`",
                allowed.join("|")
            ),
            ValidationError::InvalidType {
                tool,
                field,
                expected,
            } => write!(
                f,
                "Invalid arguments for {tool}: `{field}` must be {} {}",
                if matches!(expected, ParamType::Integer) { "an" } else { "a" },
                expected.as_str()
            ),
        }
    }
}

impl std::error::Error for ValidationError {}
