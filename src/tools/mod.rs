//! Static tool catalog and argument validation.
//!
//! [`validate`] is the only way to obtain a [`ToolCall`]; it rejects unknown tools,
//! missing required arguments and out-of-range enum values before anything is sent,
//! and applies the numeric coercions the exchange expects (`product_id` as an
//! integer, `size` and `limit_price` as strings).

mod registry;
mod types;

pub use registry::{definition, definitions, validate};
pub use types::{
    CancelRequest, OrderRequest, OrderState, OrderType, ParamSpec, ParamType, Side, TimeInForce,
    ToolCall, ToolDefinition, ValidationError,
};
