//! Counterparty extraction from the catch-all account's transaction history.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::model::Transaction;
use crate::notes::NoteFormat;

/// Result of scanning the catch-all account's transactions.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Distinct counterparty names, lexicographically ordered.
    pub counterparties: BTreeSet<String>,
    /// Transactions whose note the format could not parse.
    pub unparseable: usize,
}

/// Collect the distinct counterparty names recorded in transaction notes.
///
/// Only transactions whose destination is the catch-all account and which
/// carry a non-empty note participate. Notes the format cannot parse are
/// skipped, counted, and logged; an empty stream yields an empty set.
pub fn extract_counterparties<I>(
    transactions: I,
    catch_all_id: &str,
    format: &NoteFormat,
) -> Extraction
where
    I: IntoIterator<Item = Transaction>,
{
    let mut out = Extraction::default();
    for tx in transactions {
        if tx.destination_id != catch_all_id {
            continue;
        }
        let Some(note) = tx.notes.as_deref() else {
            continue;
        };
        if note.trim().is_empty() {
            continue;
        }
        match format.extract(note) {
            Some(name) => {
                debug!(journal_id = %tx.journal_id, counterparty = name, "extracted counterparty");
                out.counterparties.insert(name.to_string());
            }
            None => {
                warn!(
                    journal_id = %tx.journal_id,
                    note,
                    "note does not match the counterparty format, skipping"
                );
                out.unparseable += 1;
            }
        }
    }
    out
}
