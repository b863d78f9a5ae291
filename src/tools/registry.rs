use std::collections::HashMap;

use serde_json::{Map, Value, json};

use crate::tools::types::{
    CancelRequest, OrderRequest, OrderState, OrderType, ParamSpec, ParamType, Side, TimeInForce,
    ToolCall, ToolDefinition, ValidationError,
};

const SYMBOL: ParamSpec = ParamSpec::required(
    "symbol",
    ParamType::String,
    "Trading symbol (e.g., BTCUSD, ETHUSD)",
);

const PLACE_ORDER_PARAMS: &[ParamSpec] = &[
    ParamSpec::required(
        "product_id",
        ParamType::Integer,
        "Product ID of the trading instrument",
    ),
    ParamSpec::required(
        "size",
        ParamType::String,
        "Order size/quantity (use string to avoid precision issues)",
    ),
    ParamSpec::required("side", ParamType::String, "Order side: 'buy' or 'sell'").one_of(Side::VALUES),
    ParamSpec::optional(
        "limit_price",
        ParamType::String,
        "Limit price for the order (optional for market orders)",
    ),
    ParamSpec::optional(
        "order_type",
        ParamType::String,
        "Order type: 'market_order' or 'limit_order'",
    )
    .one_of(OrderType::VALUES)
    .with_default("limit_order"),
    ParamSpec::optional(
        "time_in_force",
        ParamType::String,
        "Time in force: 'gtc', 'ioc', or 'fok'",
    )
    .one_of(TimeInForce::VALUES)
    .with_default("gtc"),
];

const DEFINITIONS: &[ToolDefinition] = &[
    ToolDefinition {
        name: "get_assets",
        description: "Get list of all available assets on Delta Exchange",
        params: &[],
        failure_context: "Error getting assets",
    },
    ToolDefinition {
        name: "get_products",
        description: "Get list of all available trading products on Delta Exchange",
        params: &[],
        failure_context: "Error getting products",
    },
    ToolDefinition {
        name: "get_ticker",
        description: "Get current market ticker data for a trading symbol",
        params: &[SYMBOL],
        failure_context: "Error getting ticker",
    },
    ToolDefinition {
        name: "place_order",
        description: "Place a buy or sell order on Delta Exchange",
        params: PLACE_ORDER_PARAMS,
        failure_context: "Failed to place order",
    },
    ToolDefinition {
        name: "get_wallet_balances",
        description: "Get wallet balances for every asset in the account",
        params: &[],
        failure_context: "Error getting wallet balances",
    },
    ToolDefinition {
        name: "get_positions",
        description: "Get open positions, optionally for a single product",
        params: &[ParamSpec::optional(
            "product_id",
            ParamType::Integer,
            "Only return the position for this product",
        )],
        failure_context: "Error getting positions",
    },
    ToolDefinition {
        name: "get_open_orders",
        description: "Get active orders, optionally filtered by product and state",
        params: &[
            ParamSpec::optional(
                "product_id",
                ParamType::Integer,
                "Only return orders for this product",
            ),
            ParamSpec::optional("states", ParamType::String, "Order state: 'open' or 'pending'")
                .one_of(OrderState::VALUES),
        ],
        failure_context: "Error getting orders",
    },
    ToolDefinition {
        name: "cancel_order",
        description: "Cancel an active order",
        params: &[
            ParamSpec::required("id", ParamType::Integer, "ID of the order to cancel"),
            ParamSpec::required(
                "product_id",
                ParamType::Integer,
                "Product ID the order was placed on",
            ),
        ],
        failure_context: "Failed to cancel order",
    },
];

/// Every supported tool, in listing order.
#[must_use]
pub fn definitions() -> &'static [ToolDefinition] {
    DEFINITIONS
}

#[must_use]
pub fn definition(name: &str) -> Option<&'static ToolDefinition> {
    DEFINITIONS.iter().find(|definition| definition.name == name)
}

impl ToolDefinition {
    /// JSON Schema object describing the arguments.
    #[must_use]
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in self.params {
            let mut property = Map::new();
            property.insert("type".to_owned(), json!(param.kind.as_str()));
            property.insert("description".to_owned(), json!(param.description));
            if !param.allowed.is_empty() {
                property.insert("enum".to_owned(), json!(param.allowed));
            }
            if let Some(default) = param.default {
                property.insert("default".to_owned(), json!(default));
            }
            properties.insert(param.name.to_owned(), Value::Object(property));
        }

        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|param| param.required)
            .map(|param| param.name)
            .collect();

        let mut schema = json!({
            "type": "object",
            "properties": properties,
        });
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }
}

/// Checks `arguments` against the named tool's schema and coerces them into a [`ToolCall`].
pub fn validate(name: &str, arguments: &Map<String, Value>) -> Result<ToolCall, ValidationError> {
    let definition =
        definition(name).ok_or_else(|| ValidationError::UnknownTool(name.to_owned()))?;
    let args = ValidatedArguments::check(definition, arguments)?;

    let call = match definition.name {
        "get_assets" => ToolCall::GetAssets,
        "get_products" => ToolCall::GetProducts,
        "get_ticker" => ToolCall::GetTicker {
            symbol: args.required_text("symbol")?,
        },
        "place_order" => ToolCall::PlaceOrder(OrderRequest {
            product_id: args.required_integer("product_id")?,
            side: args.choice("side", Side::parse)?.ok_or(args.missing("side"))?,
            size: args.required_text("size")?,
            order_type: args
                .choice("order_type", OrderType::parse)?
                .unwrap_or_default(),
            time_in_force: args
                .choice("time_in_force", TimeInForce::parse)?
                .unwrap_or_default(),
            limit_price: args.text("limit_price"),
        }),
        "get_wallet_balances" => ToolCall::GetWalletBalances,
        "get_positions" => ToolCall::GetPositions {
            product_id: args.integer("product_id"),
        },
        "get_open_orders" => ToolCall::GetOpenOrders {
            product_id: args.integer("product_id"),
            state: args.choice("states", OrderState::parse)?,
        },
        "cancel_order" => ToolCall::CancelOrder(CancelRequest {
            id: args.required_integer("id")?,
            product_id: args.required_integer("product_id")?,
        }),
        other => return Err(ValidationError::UnknownTool(other.to_owned())),
    };

    Ok(call)
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Coerced {
    Integer(i64),
    Text(String),
}

/// Arguments that passed schema checks, with defaults applied.
#[derive(Debug)]
struct ValidatedArguments {
    tool: &'static str,
    values: HashMap<&'static str, Coerced>,
}

impl ValidatedArguments {
    fn check(
        definition: &'static ToolDefinition,
        arguments: &Map<String, Value>,
    ) -> Result<Self, ValidationError> {
        let tool = definition.name;
        let mut values = HashMap::new();

        for param in definition.params {
            let provided = arguments.get(param.name).filter(|value| !is_empty(value));

            let Some(value) = provided else {
                if param.required {
                    return Err(ValidationError::MissingArgument {
                        tool,
                        field: param.name,
                    });
                }
                if let Some(default) = param.default {
                    values.insert(param.name, Coerced::Text(default.to_owned()));
                }
                continue;
            };

            let coerced = match param.kind {
                ParamType::Integer => coerce_integer(value).map(Coerced::Integer),
                ParamType::String => coerce_text(value).map(Coerced::Text),
            }
            .ok_or(ValidationError::InvalidType {
                tool,
                field: param.name,
                expected: param.kind,
            })?;

            if let Coerced::Text(text) = &coerced
                && !param.allowed.is_empty()
                && !param.allowed.contains(&text.as_str())
            {
                return Err(ValidationError::InvalidEnumValue {
                    tool,
                    field: param.name,
                    value: text.clone(),
                    allowed: param.allowed,
                });
            }

            values.insert(param.name, coerced);
        }

        Ok(Self { tool, values })
    }

    fn missing(&self, field: &'static str) -> ValidationError {
        ValidationError::MissingArgument {
            tool: self.tool,
            field,
        }
    }

    fn text(&self, field: &'static str) -> Option<String> {
        match self.values.get(field) {
            Some(Coerced::Text(text)) => Some(text.clone()),
            _ => None,
        }
    }

    fn integer(&self, field: &'static str) -> Option<i64> {
        match self.values.get(field) {
            Some(Coerced::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    fn required_text(&self, field: &'static str) -> Result<String, ValidationError> {
        self.text(field).ok_or_else(|| self.missing(field))
    }

    fn required_integer(&self, field: &'static str) -> Result<i64, ValidationError> {
        self.integer(field).ok_or_else(|| self.missing(field))
    }

    fn choice<T>(
        &self,
        field: &'static str,
        parse: fn(&str) -> Option<T>,
    ) -> Result<Option<T>, ValidationError> {
        let Some(text) = self.text(field) else {
            return Ok(None);
        };

        parse(&text)
            .map(Some)
            .ok_or(ValidationError::InvalidEnumValue {
                tool: self.tool,
                field,
                value: text,
                allowed: &[],
            })
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            // Integral floats print with a `.0` suffix.
            n.to_string()
                .strip_suffix(".0")
                .and_then(|whole| whole.parse().ok())
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
