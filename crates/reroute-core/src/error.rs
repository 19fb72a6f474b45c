use thiserror::Error;

/// Failure classes for one reconciliation pass.
///
/// `Config` and `Auth` abort the run before any mutation; `Transport` and
/// `Api` are fatal during the read phases but recoverable-by-skip inside the
/// per-counterparty creation loop; `Conflict` is handled at the call site by
/// re-fetching the existing entity.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("ledger service rejected credentials (HTTP {status})")]
    Auth { status: u16 },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("{what} {name:?} already exists")]
    Conflict { what: &'static str, name: String },

    #[error("ledger service error: {0}")]
    Api(String),
}
