// proxy/mod.rs
pub mod auth;
pub mod client;
pub mod config;
pub mod errors;

// Re-export main interfaces for easy access
pub use auth::{auth_handler_for, urlencode_params, AuthHandler, Params, SignedRequest};
pub use client::ApiProxy;
pub use config::{ExchangeConfig, ExchangeType};
pub use errors::ProxyError;
