#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod auth;
pub mod dispatch;
pub mod error;
pub mod exchange;
#[cfg(feature = "server")]
pub mod server;
pub mod tools;

use std::result::Result as StdResult;

pub use dispatch::{Dispatcher, ToolResult};
pub use error::Error;

pub type Result<T> = StdResult<T, Error>;

/// Unix time in seconds.
pub type Timestamp = i64;
