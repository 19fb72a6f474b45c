//! Dry-run interception for the mutating half of the [`Ledger`] seam.

use tracing::info;

use crate::error::LedgerError;
use crate::model::{Account, AccountKind, Rule, RuleSpec};
use crate::reconcile::Ledger;

/// A mutation reported instead of executed under dry-run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    CreateAccount { name: String },
    CreateRule(RuleSpec),
}

/// Wraps a [`Ledger`] so that mutations are reported, never sent.
///
/// Reads pass through to the inner ledger: coverage and account-reuse
/// reporting must stay truthful under dry-run, otherwise the report would
/// claim work is needed when it was already done. Mutations are logged,
/// recorded, and answered with synthetic placeholder results (empty service
/// ids) so the reconciler's control flow is unchanged.
pub struct DryRunGate<L> {
    inner: L,
    planned: Vec<PlannedAction>,
}

impl<L> DryRunGate<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            planned: Vec::new(),
        }
    }

    /// The mutations that would have been performed.
    pub fn planned(&self) -> &[PlannedAction] {
        &self.planned
    }

    pub fn into_inner(self) -> L {
        self.inner
    }
}

impl<L: Ledger> Ledger for DryRunGate<L> {
    async fn find_account(&mut self, name: &str) -> Result<Option<Account>, LedgerError> {
        self.inner.find_account(name).await
    }

    async fn create_account(
        &mut self,
        name: &str,
        kind: AccountKind,
    ) -> Result<Account, LedgerError> {
        info!(name, kind = kind.as_str(), "dry-run: would create account");
        self.planned.push(PlannedAction::CreateAccount {
            name: name.to_string(),
        });
        Ok(Account {
            id: String::new(),
            name: name.to_string(),
            kind: kind.as_str().to_string(),
        })
    }

    async fn create_rule(&mut self, spec: &RuleSpec) -> Result<Rule, LedgerError> {
        info!(title = %spec.title, group = %spec.rule_group_title, "dry-run: would create rule");
        self.planned.push(PlannedAction::CreateRule(spec.clone()));
        Ok(Rule {
            id: String::new(),
            title: spec.title.clone(),
            triggers: spec.triggers.clone(),
            actions: spec.actions.clone(),
            active: true,
        })
    }

    async fn trigger_rule(&mut self, _rule_id: &str) -> Result<(), LedgerError> {
        // The rule only exists on paper; there is nothing to fire.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use futures::executor::block_on;

    use crate::model::{Account, RuleGroup};
    use crate::notes::NoteFormat;
    use crate::reconcile::testing::MockLedger;
    use crate::reconcile::{Outcome, ReconcilePlan, execute};

    use super::*;

    fn visa() -> Account {
        Account {
            id: "7".into(),
            name: "Visa".into(),
            kind: "expense".into(),
        }
    }

    fn splits() -> RuleGroup {
        RuleGroup {
            id: "3".into(),
            title: "Visa Splits".into(),
        }
    }

    #[test]
    fn mutations_never_reach_the_inner_ledger() {
        let discovered: BTreeSet<String> = ["Acme Corp", "Bob's Diner"]
            .into_iter()
            .map(String::from)
            .collect();
        let plan = ReconcilePlan::build(&discovered, &BTreeSet::new());

        // "Acme Corp" already has an account, so only its rule is planned.
        let mut gate = DryRunGate::new(MockLedger::with_accounts(&["Acme Corp"]));
        let fmt = NoteFormat::default();
        let results = block_on(execute(&mut gate, &plan, &visa(), &splits(), &fmt));

        assert_eq!(results.len(), 2);
        assert!(
            results
                .iter()
                .all(|(_, outcome)| matches!(outcome, Outcome::Created { .. }))
        );

        let planned = gate.planned();
        let planned_rules: Vec<&str> = planned
            .iter()
            .filter_map(|action| match action {
                PlannedAction::CreateRule(spec) => Some(spec.title.as_str()),
                PlannedAction::CreateAccount { .. } => None,
            })
            .collect();
        let planned_accounts: Vec<&str> = planned
            .iter()
            .filter_map(|action| match action {
                PlannedAction::CreateAccount { name } => Some(name.as_str()),
                PlannedAction::CreateRule(_) => None,
            })
            .collect();

        // The would-create set equals the pending set; only the account
        // missing on the service side is planned for creation.
        assert_eq!(planned_rules, ["Acme Corp", "Bob's Diner"]);
        assert_eq!(planned_accounts, ["Bob's Diner"]);
    }

    #[test]
    fn inner_ledger_stays_untouched() {
        let discovered: BTreeSet<String> =
            ["Acme Corp"].into_iter().map(String::from).collect();
        let plan = ReconcilePlan::build(&discovered, &BTreeSet::new());

        let mut gate = DryRunGate::new(MockLedger::default());
        let fmt = NoteFormat::default();
        block_on(execute(&mut gate, &plan, &visa(), &splits(), &fmt));

        let ledger = gate.into_inner();
        assert!(ledger.created_accounts.is_empty());
        assert!(ledger.created_rules.is_empty());
        assert!(ledger.triggered.is_empty());
    }

    #[test]
    fn reads_pass_through() {
        let mut gate = DryRunGate::new(MockLedger::with_accounts(&["Acme Corp"]));
        let found = block_on(gate.find_account("Acme Corp")).unwrap();
        assert_eq!(found.map(|a| a.name), Some("Acme Corp".to_string()));
        assert!(gate.planned().is_empty());
    }
}
