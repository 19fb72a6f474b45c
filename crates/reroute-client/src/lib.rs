//! HTTP client for the ledger service's REST API.

pub mod http;
mod wire;

pub use http::LedgerClient;
