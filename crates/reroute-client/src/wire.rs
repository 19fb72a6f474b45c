//! Envelope and attribute types for the ledger service's JSON:API wire shape.
//!
//! Every resource arrives as `{"id": ..., "attributes": {...}}`; collections
//! are wrapped in `{"data": [...], "links": {"next": ...}}` and single
//! resources in `{"data": {...}}`. Transactions arrive grouped into splits,
//! which the client flattens.

use chrono::{DateTime, Utc};
use reroute_core::model::{Account, Rule, RuleAction, RuleGroup, RuleTrigger, Transaction};
use serde::Deserialize;

/// A resource wrapper: `{"id": ..., "attributes": {...}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct Resource<T> {
    pub id: String,
    pub attributes: T,
}

/// A collection page with an optional pointer to the next one.
#[derive(Debug, Deserialize)]
pub(crate) struct Page<T> {
    pub data: Vec<Resource<T>>,
    #[serde(default)]
    pub links: PageLinks,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageLinks {
    pub next: Option<String>,
}

/// A single-resource response: `{"data": {...}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct Single<T> {
    pub data: Resource<T>,
}

/// Service-reported error body.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: String,
    pub exception: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserAttributes {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountAttributes {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl From<Resource<AccountAttributes>> for Account {
    fn from(r: Resource<AccountAttributes>) -> Self {
        Account {
            id: r.id,
            name: r.attributes.name,
            kind: r.attributes.kind,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RuleGroupAttributes {
    pub title: String,
}

impl From<Resource<RuleGroupAttributes>> for RuleGroup {
    fn from(r: Resource<RuleGroupAttributes>) -> Self {
        RuleGroup {
            id: r.id,
            title: r.attributes.title,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RuleAttributes {
    pub title: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub triggers: Vec<RuleTrigger>,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
}

fn default_true() -> bool {
    true
}

impl From<Resource<RuleAttributes>> for Rule {
    fn from(r: Resource<RuleAttributes>) -> Self {
        Rule {
            id: r.id,
            title: r.attributes.title,
            triggers: r.attributes.triggers,
            actions: r.attributes.actions,
            active: r.attributes.active,
        }
    }
}

/// A transaction split group; the splits carry the interesting fields.
#[derive(Debug, Deserialize)]
pub(crate) struct TransactionGroupAttributes {
    pub transactions: Vec<TransactionSplit>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransactionSplit {
    pub transaction_journal_id: String,
    #[serde(default)]
    pub description: String,
    pub destination_id: String,
    #[serde(default)]
    pub destination_name: String,
    pub notes: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl From<TransactionSplit> for Transaction {
    fn from(split: TransactionSplit) -> Self {
        Transaction {
            journal_id: split.transaction_journal_id,
            description: split.description,
            destination_id: split.destination_id,
            destination_name: split.destination_name,
            notes: split.notes,
            date: split.date,
        }
    }
}
