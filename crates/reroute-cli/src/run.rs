//! One reconciliation pass, from reading transactions to creating rules.

use anyhow::{Context, bail};
use futures::TryStreamExt;
use reroute_client::LedgerClient;
use reroute_core::extract::extract_counterparties;
use reroute_core::gate::DryRunGate;
use reroute_core::model::Transaction;
use reroute_core::notes::NoteFormat;
use reroute_core::reconcile::{self, Outcome, ReconcilePlan};
use reroute_core::LedgerError;
use tracing::{debug, info, warn};

use crate::Args;

/// Final per-pass counters, always reported before exit.
#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    discovered: usize,
    already_covered: usize,
    created: usize,
    failed: usize,
    skipped_dry_run: usize,
    unparseable_notes: usize,
}

impl Summary {
    fn tally(&mut self, results: &[(String, Outcome)], dry_run: bool) {
        for (name, outcome) in results {
            match outcome {
                Outcome::Created { reused_account, .. } if dry_run => {
                    info!(counterparty = %name, reused_account, "skipped (dry-run)");
                    self.skipped_dry_run += 1;
                }
                Outcome::Created { reused_account, .. } => {
                    info!(counterparty = %name, reused_account, "created");
                    self.created += 1;
                }
                Outcome::Failed(err) => {
                    warn!(counterparty = %name, error = %err, "failed");
                    self.failed += 1;
                }
            }
        }
    }
}

pub(crate) async fn run(args: Args) -> anyhow::Result<()> {
    let format = NoteFormat::new(&args.note_marker);
    let mut client = LedgerClient::new(&args.url, &args.access_token)?;

    // 1. Validate credentials before anything else.
    let user = client
        .current_user()
        .await
        .context("credential check failed")?;
    info!(email = %user.email, "authenticated");

    // 2. Resolve the operating context; absences here are operator errors.
    let catch_all = client
        .find_account_by_name(&args.account)
        .await?
        .ok_or_else(|| {
            LedgerError::Config(format!("catch-all account {:?} not found", args.account))
        })?;
    let group = client.find_rule_group_by_name(&args.group).await?;

    // 3. Coverage from the rules already in the group.
    let rules = client.list_rules(&group.id).await?;
    let covered = reconcile::coverage(&rules, &format);
    info!(
        rules = rules.len(),
        covered = covered.len(),
        group = %group.title,
        "computed coverage"
    );

    // 4. Counterparties recorded in the catch-all account's notes.
    let transactions: Vec<Transaction> = client.transactions(&catch_all.id).try_collect().await?;
    let extraction = extract_counterparties(transactions, &catch_all.id, &format);
    info!(
        discovered = extraction.counterparties.len(),
        unparseable = extraction.unparseable,
        account = %catch_all.name,
        "extracted counterparties"
    );
    for name in &extraction.counterparties {
        debug!(counterparty = %name, "discovered");
    }

    // 5. Delta, then creation of whatever is missing (gated when dry-run).
    let plan = ReconcilePlan::build(&extraction.counterparties, &covered);
    let mut summary = Summary {
        discovered: plan.discovered,
        already_covered: plan.already_covered,
        unparseable_notes: extraction.unparseable,
        ..Summary::default()
    };
    if plan.is_empty() {
        info!(account = %catch_all.name, "no uncovered counterparties, nothing to create");
    }

    if args.dry_run {
        let mut gate = DryRunGate::new(client);
        let results = reconcile::execute(&mut gate, &plan, &catch_all, &group, &format).await;
        summary.tally(&results, true);
    } else {
        let results = reconcile::execute(&mut client, &plan, &catch_all, &group, &format).await;
        summary.tally(&results, false);
    }

    info!(
        discovered = summary.discovered,
        already_covered = summary.already_covered,
        created = summary.created,
        failed = summary.failed,
        skipped_dry_run = summary.skipped_dry_run,
        unparseable_notes = summary.unparseable_notes,
        "reconciliation pass complete"
    );

    if summary.failed > 0 {
        bail!("{} counterparty operation(s) failed", summary.failed);
    }
    Ok(())
}
