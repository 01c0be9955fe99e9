//! Centralized authenticated API proxy for crypto exchanges.
//!
//! The [`proxy`] module turns a generic `(method, endpoint, params)` call
//! into a correctly signed, exchange-specific HTTP request, throttles
//! outbound calls, and classifies responses into a small typed error
//! family. The [`exchange`] and [`fees`] modules are the two consumers of
//! that proxy: a live trading client and the fee-collection utilities.

pub mod config;
pub mod exchange;
pub mod fees;
pub mod proxy;
