//! CLI argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use padron_core::ServiceKind;

/// Query the taxpayer registry services with a signed authorization ticket.
#[derive(Parser, Debug)]
#[command(name = "padron")]
#[command(version)]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options available to all commands.
#[derive(Args, Debug, Clone)]
pub struct GlobalOptions {
    /// Configuration file.
    #[arg(long, env = "PADRON_CONFIG", default_value = "padron.toml", global = true)]
    pub config: PathBuf,

    /// Registry service: `constancia_inscripcion` (A5) or `padron_a13`.
    /// The remote service names are accepted too.
    #[arg(long, default_value = "constancia_inscripcion", global = true)]
    pub service: ServiceKind,

    /// Reuse and persist the authorization ticket in this file.
    ///
    /// The login service refuses to issue a second ticket while one is
    /// still valid, so keeping it between runs avoids that error.
    #[arg(long, env = "PADRON_TICKET_FILE", global = true)]
    pub ticket_file: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Print Prometheus metrics to stderr before exiting.
    #[arg(long, global = true)]
    pub metrics: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the registry service health (no ticket needed).
    Status,

    /// Obtain an authorization ticket and print it.
    Ticket {
        /// Authenticate even if the stored ticket is still valid.
        #[arg(long)]
        force: bool,

        /// Print the full ticket as JSON, including token and sign.
        #[arg(long)]
        json: bool,
    },

    /// Look up taxpayer records.
    Lookup {
        /// Tax identifiers (CUIT/CUIL), digits only.
        #[arg(required = true)]
        ids: Vec<String>,

        /// Per-call timeout in seconds, overriding the configured one.
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Print the effective configuration with secrets redacted.
    Config,
}
