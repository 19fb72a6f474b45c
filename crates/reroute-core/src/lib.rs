//! Core types and reconciliation logic for reroute.

pub mod error;
pub mod extract;
pub mod gate;
pub mod model;
pub mod notes;
pub mod reconcile;

pub use error::LedgerError;
pub use gate::{DryRunGate, PlannedAction};
pub use model::{
    Account, AccountKind, Rule, RuleAction, RuleGroup, RuleSpec, RuleTrigger, Transaction,
    UserInfo,
};
pub use notes::NoteFormat;
pub use reconcile::{Ledger, Outcome, ReconcilePlan};
