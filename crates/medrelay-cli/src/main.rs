//! Operator CLI for MedRelay
//!
//! Creates, decides and inspects consent records against the configured
//! record store, re-drives incomplete ledger anchors, and exports the
//! derived audit trail.

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use medrelay_audit::AuditEventKind;
use medrelay_core::{ConsentId, MedRelayConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod actor;
mod context;
mod handlers;

use actor::ActorSpec;
use context::AppContext;

#[derive(Parser)]
#[command(name = "medrelay")]
#[command(about = "MedRelay - consent records with ledger anchoring", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (.toml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    identity: IdentityArgs,
}

/// How the acting user is established
#[derive(Args, Debug, Clone, Default)]
pub struct IdentityArgs {
    /// Act as `id:role:name` without contacting the identity backend
    #[arg(long, global = true, value_name = "ID:ROLE:NAME")]
    actor: Option<ActorSpec>,

    /// Sign in with this email; the password is read from `--password-env`
    #[arg(long, global = true)]
    email: Option<String>,

    /// Environment variable holding the sign-in password
    #[arg(long, global = true, default_value = "MEDRELAY_PASSWORD")]
    password_env: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a new consent request
    Create {
        /// Patient reference
        #[arg(long)]
        patient: String,

        /// Procedure category (e.g. MRI)
        #[arg(long)]
        procedure: String,

        /// Procedure description shown to the signer
        #[arg(long)]
        description: String,

        /// Title; defaults to "<procedure> consent"
        #[arg(long)]
        title: Option<String>,
    },

    /// Sign a pending consent
    Sign { id: ConsentId },

    /// Reject a pending consent
    Reject { id: ConsentId },

    /// Show one consent record
    Show { id: ConsentId },

    /// List consent records, newest first
    List {
        /// Only records issued by this clinician
        #[arg(long, conflicts_with = "patient")]
        issuer: Option<String>,

        /// Only records concerning this patient
        #[arg(long)]
        patient: Option<String>,
    },

    /// Derive and export the audit trail
    Audit(AuditArgs),

    /// Re-drive pending and failed ledger anchors
    Reconcile {
        /// Only this record
        #[arg(long)]
        id: Option<ConsentId>,
    },

    /// Ask the ledger whether a transaction exists
    VerifyTx { tx_hash: String },
}

#[derive(Args, Debug, Clone, Default)]
pub struct AuditArgs {
    /// Case-insensitive search over description, actor and patient
    #[arg(long)]
    search: Option<String>,

    /// Event kinds to keep (created, signed, rejected); repeatable
    #[arg(long = "kind")]
    kinds: Vec<AuditEventKind>,

    /// Write CSV to this path ("-" for stdout)
    #[arg(long, value_name = "PATH", conflicts_with = "json")]
    csv: Option<PathBuf>,

    /// Write JSON lines to stdout
    #[arg(long)]
    json: bool,

    /// Check each event's transaction against the ledger
    #[arg(long)]
    verify: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = MedRelayConfig::load(cli.config.as_deref()).context("loading configuration")?;
    init_logging(&config.logging.filter, cli.verbose);

    let ctx = AppContext::from_config(config).context("initialising MedRelay")?;

    match cli.command {
        Commands::Create {
            patient,
            procedure,
            description,
            title,
        } => {
            let actor = ctx.resolve_actor(&cli.identity).await?;
            handlers::consent::create(&ctx, &actor, patient, procedure, description, title)
                .await?;
        }
        Commands::Sign { id } => {
            let actor = ctx.resolve_actor(&cli.identity).await?;
            handlers::consent::sign(&ctx, &actor, id).await?;
        }
        Commands::Reject { id } => {
            let actor = ctx.resolve_actor(&cli.identity).await?;
            handlers::consent::reject(&ctx, &actor, id).await?;
        }
        Commands::Show { id } => {
            handlers::consent::show(&ctx, id).await?;
        }
        Commands::List { issuer, patient } => {
            handlers::consent::list(&ctx, issuer, patient).await?;
        }
        Commands::Audit(args) => {
            let viewer = cli.identity.actor.clone().map(ActorSpec::into_profile);
            handlers::audit::run(&ctx, viewer, args).await?;
        }
        Commands::Reconcile { id } => {
            handlers::ledger::reconcile(&ctx, id).await?;
        }
        Commands::VerifyTx { tx_hash } => {
            handlers::ledger::verify_tx(&ctx, &tx_hash).await?;
        }
    }

    Ok(())
}

/// `--verbose` forces debug; otherwise `RUST_LOG`, then the configured filter
fn init_logging(configured: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_line_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn audit_flags_parse() {
        let cli = Cli::try_parse_from([
            "medrelay",
            "audit",
            "--search",
            "jane",
            "--kind",
            "signed",
            "--kind",
            "rejected",
            "--verify",
        ])
        .unwrap();
        let Commands::Audit(args) = cli.command else {
            panic!("expected audit");
        };
        assert_eq!(args.kinds, vec![AuditEventKind::Signed, AuditEventKind::Rejected]);
        assert!(args.verify);
        assert_eq!(args.search.as_deref(), Some("jane"));
    }

    #[test]
    fn actor_flag_is_global() {
        let cli = Cli::try_parse_from([
            "medrelay",
            "sign",
            "6f1c1f8e-3d4b-4c61-9a55-1b2f3f8f9d10",
            "--actor",
            "poa-morgan:poa:Morgan Doe",
        ])
        .unwrap();
        let actor = cli.identity.actor.unwrap().into_profile();
        assert_eq!(actor.name, "Morgan Doe");
    }
}
