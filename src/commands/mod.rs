//! CLI command implementations.

pub mod config;
mod convert;
mod request;

pub use convert::{ConvertOptions, convert};
pub use request::{Method, RequestOptions, request};
