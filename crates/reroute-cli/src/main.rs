//! CLI entry point: parse the invocation surface, run one reconciliation pass.

mod run;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Rewrite catch-all transactions to their true counterparty accounts.
///
/// Scans the catch-all account for counterparty names the import pipeline
/// recorded in transaction notes, and creates one rewrite rule (plus a
/// destination account, if missing) per counterparty not yet covered by the
/// target rule group. The ledger service itself applies the rules.
#[derive(Debug, Parser)]
#[command(name = "reroute", version)]
pub(crate) struct Args {
    /// Name of the catch-all account whose transactions need fixing.
    #[arg(env = "LEDGER_ACCOUNT")]
    pub account: String,

    /// Base URL of the ledger service, e.g. https://ledger.example.org.
    #[arg(short, long, env = "LEDGER_URL")]
    pub url: String,

    /// Personal access token for the ledger service API.
    #[arg(short = 't', long, env = "LEDGER_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    /// Title of the rule group that receives the generated rules.
    ///
    /// Must already exist; rule groups are operator-provisioned.
    #[arg(short, long, env = "LEDGER_RULE_GROUP")]
    pub group: String,

    /// Marker the import pipeline writes ahead of the counterparty name.
    #[arg(
        long,
        env = "LEDGER_NOTE_MARKER",
        default_value = reroute_core::notes::DEFAULT_MARKER
    )]
    pub note_marker: String,

    /// Report the accounts and rules that would be created, without creating
    /// them. Reads still execute.
    #[arg(long, env = "DRY_RUN")]
    pub dry_run: bool,

    /// Log filter directive; takes precedence over RUST_LOG when given.
    #[arg(long)]
    pub log_level: Option<String>,
}

fn init_logging(directive: Option<&str>) {
    let filter = match directive {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// One reconciliation pass per invocation; there is nothing to parallelise.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());
    run::run(args).await
}
