//! Authenticated REST access to the exchange.
//!
//! This module only knows how to turn a [`RequestSpec`] into one signed HTTP call
//! and classify what came back:
//! - build the URL and the canonical string from the same bytes
//! - attach `api-key` / `signature` / `timestamp` headers
//! - map HTTP and transport outcomes onto [`NormalizedResponse`] or [`TransportFailure`]
//!
//! Unwrapping the exchange's `{"result": ...}` envelope is left to the dispatcher.

mod client;
mod config;
mod policy;
mod types;

pub use client::ExchangeClient;
pub use config::{Config, DEFAULT_HOST, DEFAULT_TIMEOUT};
pub use policy::TimePolicy;
pub use types::{Endpoint, NormalizedResponse, RequestSpec, TransportFailure, TransportKind};
