//! The reconciliation core: coverage, pending delta, and rule creation.

use std::collections::BTreeSet;

use tracing::{error, info, warn};

use crate::error::LedgerError;
use crate::model::{
    ACTION_SET_DESTINATION, Account, AccountKind, Rule, RuleAction, RuleGroup, RuleSpec,
    RuleTrigger, TRIGGER_MOMENT_STORE, TRIGGER_NOTES_CONTAINS, TRIGGER_TO_ACCOUNT_IS,
    TRIGGER_TRANSACTION_TYPE,
};
use crate::notes::NoteFormat;

/// The seam between the reconciler and the ledger service.
///
/// Implemented by the HTTP client, by [`DryRunGate`](crate::gate::DryRunGate),
/// and by in-memory doubles in tests.
#[allow(async_fn_in_trait)]
pub trait Ledger {
    /// Exact-name account lookup. Reads always execute, even under dry-run.
    async fn find_account(&mut self, name: &str) -> Result<Option<Account>, LedgerError>;
    async fn create_account(
        &mut self,
        name: &str,
        kind: AccountKind,
    ) -> Result<Account, LedgerError>;
    async fn create_rule(&mut self, spec: &RuleSpec) -> Result<Rule, LedgerError>;
    /// Ask the service to apply a rule to the transactions it already stores.
    async fn trigger_rule(&mut self, rule_id: &str) -> Result<(), LedgerError>;
}

/// Derive the set of counterparties already covered by rules in the group.
///
/// A rule covers a counterparty when any of its triggers is a note-contains
/// condition carrying the fragment this system generates. Rules of any other
/// shape are ignored, never errors, so hand-written rules can share the group.
pub fn coverage(rules: &[Rule], format: &NoteFormat) -> BTreeSet<String> {
    let mut covered = BTreeSet::new();
    for rule in rules {
        for trigger in &rule.triggers {
            if trigger.trigger_type != TRIGGER_NOTES_CONTAINS {
                continue;
            }
            if let Some(name) = format.parse_fragment(&trigger.value) {
                covered.insert(name.to_string());
            }
        }
    }
    covered
}

/// The computed delta for one reconciliation pass.
#[derive(Debug)]
pub struct ReconcilePlan {
    pub discovered: usize,
    pub already_covered: usize,
    /// Uncovered counterparties, lexicographically ordered.
    pub pending: Vec<String>,
}

impl ReconcilePlan {
    /// `pending = discovered − covered`, in deterministic lexicographic order.
    pub fn build(discovered: &BTreeSet<String>, covered: &BTreeSet<String>) -> Self {
        let pending: Vec<String> = discovered.difference(covered).cloned().collect();
        Self {
            discovered: discovered.len(),
            already_covered: discovered.len() - pending.len(),
            pending,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Build the rewrite rule for one counterparty.
///
/// Triggers: withdrawal, destination is the catch-all account, note contains
/// the generated fragment. Action: set the destination to the counterparty's
/// own account.
pub fn rewrite_rule(
    counterparty: &str,
    destination: &Account,
    catch_all: &Account,
    group: &RuleGroup,
    format: &NoteFormat,
) -> RuleSpec {
    RuleSpec {
        title: counterparty.to_string(),
        rule_group_title: group.title.clone(),
        strict: true,
        trigger: TRIGGER_MOMENT_STORE.to_string(),
        triggers: vec![
            RuleTrigger::new(TRIGGER_TRANSACTION_TYPE, "withdrawal"),
            RuleTrigger::new(TRIGGER_TO_ACCOUNT_IS, &catch_all.name),
            RuleTrigger::new(TRIGGER_NOTES_CONTAINS, format.fragment(counterparty)),
        ],
        actions: vec![RuleAction::new(ACTION_SET_DESTINATION, &destination.name)],
    }
}

/// Per-counterparty result of the creation loop.
#[derive(Debug)]
pub enum Outcome {
    Created {
        rule_id: String,
        /// Set when the destination account already existed and was reused.
        reused_account: bool,
    },
    Failed(LedgerError),
}

/// Drive creation of the missing accounts and rules.
///
/// Counterparties are processed in the plan's deterministic order. A failure
/// for one never aborts the rest; each name gets its own [`Outcome`]. With an
/// empty plan no ledger call is made at all.
pub async fn execute<L: Ledger>(
    ledger: &mut L,
    plan: &ReconcilePlan,
    catch_all: &Account,
    group: &RuleGroup,
    format: &NoteFormat,
) -> Vec<(String, Outcome)> {
    let mut results = Vec::with_capacity(plan.pending.len());
    for name in &plan.pending {
        match reconcile_one(ledger, name, catch_all, group, format).await {
            Ok(outcome) => results.push((name.clone(), outcome)),
            Err(err) => {
                error!(counterparty = %name, error = %err, "failed to create rule");
                results.push((name.clone(), Outcome::Failed(err)));
            }
        }
    }
    results
}

async fn reconcile_one<L: Ledger>(
    ledger: &mut L,
    name: &str,
    catch_all: &Account,
    group: &RuleGroup,
    format: &NoteFormat,
) -> Result<Outcome, LedgerError> {
    // 1. Resolve or create the destination account.
    let (destination, reused_account) = match ledger.find_account(name).await? {
        Some(account) => (account, true),
        None => match ledger.create_account(name, AccountKind::Expense).await {
            Ok(account) => (account, false),
            // Another writer got there between lookup and create: use theirs.
            Err(LedgerError::Conflict { .. }) => {
                let account = ledger.find_account(name).await?.ok_or_else(|| {
                    LedgerError::Api(format!(
                        "account {name:?} reported as existing but cannot be fetched"
                    ))
                })?;
                (account, true)
            }
            Err(err) => return Err(err),
        },
    };

    // 2. Create the rewrite rule in the target group.
    let spec = rewrite_rule(name, &destination, catch_all, group, format);
    let rule = ledger.create_rule(&spec).await?;
    info!(counterparty = %name, rule_id = %rule.id, reused_account, "created rule");

    // 3. Fire it once so the already-imported transactions get rewritten.
    if let Err(err) = ledger.trigger_rule(&rule.id).await {
        warn!(rule_id = %rule.id, error = %err, "rule created but trigger failed");
    }

    Ok(Outcome::Created {
        rule_id: rule.id,
        reused_account,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeSet;

    use crate::error::LedgerError;
    use crate::model::{Account, AccountKind, Rule, RuleSpec};

    use super::Ledger;

    /// In-memory ledger double: preloaded accounts, recorded mutations, and
    /// configurable per-name failures.
    #[derive(Default)]
    pub(crate) struct MockLedger {
        pub accounts: Vec<Account>,
        pub created_accounts: Vec<String>,
        pub created_rules: Vec<RuleSpec>,
        pub triggered: Vec<String>,
        /// Account names whose creation fails with a transport error.
        pub fail_account_creates: BTreeSet<String>,
        /// Account names whose creation conflicts; the account then becomes
        /// visible to subsequent lookups, as if another writer created it.
        pub conflict_account_creates: BTreeSet<String>,
        /// Rule titles whose creation fails with a transport error.
        pub fail_rule_creates: BTreeSet<String>,
        pub fail_triggers: bool,
        pub(crate) next_id: u32,
    }

    impl MockLedger {
        pub fn with_accounts(names: &[&str]) -> Self {
            let accounts = names
                .iter()
                .enumerate()
                .map(|(i, name)| Account {
                    id: format!("pre-{i}"),
                    name: (*name).to_string(),
                    kind: "expense".to_string(),
                })
                .collect();
            Self {
                accounts,
                ..Self::default()
            }
        }

        fn fresh_account(&mut self, name: &str, kind: AccountKind) -> Account {
            self.next_id += 1;
            Account {
                id: format!("acct-{}", self.next_id),
                name: name.to_string(),
                kind: kind.as_str().to_string(),
            }
        }
    }

    impl Ledger for MockLedger {
        async fn find_account(&mut self, name: &str) -> Result<Option<Account>, LedgerError> {
            Ok(self.accounts.iter().find(|a| a.name == name).cloned())
        }

        async fn create_account(
            &mut self,
            name: &str,
            kind: AccountKind,
        ) -> Result<Account, LedgerError> {
            if self.fail_account_creates.contains(name) {
                return Err(LedgerError::Transport("connection reset".into()));
            }
            if self.conflict_account_creates.remove(name) {
                let account = self.fresh_account(name, kind);
                self.accounts.push(account);
                return Err(LedgerError::Conflict {
                    what: "account",
                    name: name.to_string(),
                });
            }
            let account = self.fresh_account(name, kind);
            self.created_accounts.push(name.to_string());
            self.accounts.push(account.clone());
            Ok(account)
        }

        async fn create_rule(&mut self, spec: &RuleSpec) -> Result<Rule, LedgerError> {
            if self.fail_rule_creates.contains(&spec.title) {
                return Err(LedgerError::Transport("connection reset".into()));
            }
            self.next_id += 1;
            self.created_rules.push(spec.clone());
            Ok(Rule {
                id: format!("rule-{}", self.next_id),
                title: spec.title.clone(),
                triggers: spec.triggers.clone(),
                actions: spec.actions.clone(),
                active: true,
            })
        }

        async fn trigger_rule(&mut self, rule_id: &str) -> Result<(), LedgerError> {
            if self.fail_triggers {
                return Err(LedgerError::Transport("connection reset".into()));
            }
            self.triggered.push(rule_id.to_string());
            Ok(())
        }
    }
}
