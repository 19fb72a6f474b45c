//! Ledger entities shared between the HTTP client and the reconciliation logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trigger and action type identifiers understood by the ledger service.
pub const TRIGGER_TRANSACTION_TYPE: &str = "transaction_type";
pub const TRIGGER_TO_ACCOUNT_IS: &str = "to_account_is";
pub const TRIGGER_NOTES_CONTAINS: &str = "notes_contains";
pub const ACTION_SET_DESTINATION: &str = "set_destination_account";

/// Trigger moment for generated rules: evaluate whenever a journal is stored.
pub const TRIGGER_MOMENT_STORE: &str = "store-journal";

/// Account kinds this system creates.
///
/// The service knows more kinds than these; existing accounts of any kind
/// are carried as plain strings in [`Account::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Asset,
    Expense,
    Revenue,
    Liability,
    Cash,
}

impl AccountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountKind::Asset => "asset",
            AccountKind::Expense => "expense",
            AccountKind::Revenue => "revenue",
            AccountKind::Liability => "liability",
            AccountKind::Cash => "cash",
        }
    }
}

/// A ledger account: either the catch-all or a per-counterparty destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Service-assigned opaque identifier.
    pub id: String,
    pub name: String,
    pub kind: String,
}

/// One transaction split, flattened out of the service's split groups.
///
/// The date is carried for operator-facing logging; the reconciliation logic
/// reads only the destination and the note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub journal_id: String,
    pub description: String,
    pub destination_id: String,
    pub destination_name: String,
    pub notes: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// A named container of rules; operator-provisioned, never created here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub id: String,
    pub title: String,
}

/// One match condition of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTrigger {
    #[serde(rename = "type")]
    pub trigger_type: String,
    pub value: String,
}

impl RuleTrigger {
    pub fn new(trigger_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            trigger_type: trigger_type.into(),
            value: value.into(),
        }
    }
}

/// One action of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub action_type: String,
    pub value: String,
}

impl RuleAction {
    pub fn new(action_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            value: value.into(),
        }
    }
}

/// An automation rule as stored by the ledger service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub title: String,
    pub triggers: Vec<RuleTrigger>,
    pub actions: Vec<RuleAction>,
    pub active: bool,
}

/// The creation payload for a new rule, serialized verbatim as the POST body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub title: String,
    pub rule_group_title: String,
    pub strict: bool,
    /// Trigger moment, [`TRIGGER_MOMENT_STORE`] for generated rules.
    pub trigger: String,
    pub triggers: Vec<RuleTrigger>,
    pub actions: Vec<RuleAction>,
}

/// The user a token authenticates as, reported at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(AccountKind::Expense).unwrap(),
            serde_json::json!("expense")
        );
        assert_eq!(AccountKind::Expense.as_str(), "expense");
    }

    #[test]
    fn rule_spec_matches_service_payload() {
        let spec = RuleSpec {
            title: "Acme Corp".into(),
            rule_group_title: "Visa Splits".into(),
            strict: true,
            trigger: TRIGGER_MOMENT_STORE.into(),
            triggers: vec![
                RuleTrigger::new(TRIGGER_TRANSACTION_TYPE, "withdrawal"),
                RuleTrigger::new(TRIGGER_TO_ACCOUNT_IS, "Visa"),
                RuleTrigger::new(TRIGGER_NOTES_CONTAINS, "Original account name: Acme Corp"),
            ],
            actions: vec![RuleAction::new(ACTION_SET_DESTINATION, "Acme Corp")],
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["rule_group_title"], "Visa Splits");
        assert_eq!(value["trigger"], "store-journal");
        assert_eq!(value["triggers"][2]["type"], "notes_contains");
        assert_eq!(
            value["triggers"][2]["value"],
            "Original account name: Acme Corp"
        );
        assert_eq!(value["actions"][0]["type"], "set_destination_account");
    }
}
