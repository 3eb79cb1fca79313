mod cli;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use padron_core::{
    encode_metrics, load_config, validate_config, AuthorizationTicket, LookupOptions,
    LookupOrchestrator, Metrics, SanitizedConfig, ServerStatus,
};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.json_logs);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let fmt = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry().with(filter).with(fmt).init();
}

async fn run(cli: Cli) -> Result<()> {
    let global = cli.global;

    info!("Loading configuration from {:?}", global.config);
    let config = load_config(&global.config)
        .with_context(|| format!("Failed to load config from {:?}", global.config))?;
    validate_config(&config).context("Configuration validation failed")?;

    if let Commands::Config = cli.command {
        return print_json(&SanitizedConfig::from(&config));
    }

    let registry = prometheus::Registry::new();
    let metrics = Metrics::new().context("Failed to create metrics")?;
    metrics
        .register(&registry)
        .context("Failed to register metrics")?;

    let span = info_span!(
        "padron",
        service = global.service.as_str(),
        environment = config.environment().as_str()
    );
    let orchestrator = LookupOrchestrator::from_config(&config, global.service, metrics, span)
        .context("Failed to initialize client")?;

    if let Some(path) = &global.ticket_file {
        if let Some(ticket) = read_ticket(path)? {
            info!(path = %path.display(), expiration = %ticket.expiration, "Loaded stored ticket");
            orchestrator.seed_ticket(ticket).await;
        }
    }

    let outcome = match cli.command {
        Commands::Status => status(&orchestrator).await,
        Commands::Ticket { force, json } => ticket(&orchestrator, force, json).await,
        Commands::Lookup { ids, timeout } => lookup(&orchestrator, &ids, timeout).await,
        Commands::Config => Ok(()),
    };

    // Keep a renewed ticket even when the lookup itself failed.
    if let Some(path) = &global.ticket_file {
        if let Some(ticket) = orchestrator.current_ticket().await {
            write_ticket(path, &ticket)?;
        }
    }

    if global.metrics {
        eprintln!("{}", encode_metrics(&registry).context("Failed to encode metrics")?);
    }

    outcome
}

#[derive(Serialize)]
struct StatusReport<'a> {
    service: &'a str,
    operational: bool,
    #[serde(flatten)]
    status: &'a ServerStatus,
}

async fn status(orchestrator: &LookupOrchestrator) -> Result<()> {
    let status = orchestrator
        .server_status()
        .await
        .context("Health check failed")?;
    print_json(&StatusReport {
        service: orchestrator.service().service_name,
        operational: status.is_operational(),
        status: &status,
    })
}

async fn ticket(orchestrator: &LookupOrchestrator, force: bool, json: bool) -> Result<()> {
    let ticket = if force {
        orchestrator.refresh_ticket().await
    } else {
        orchestrator.ticket().await
    }
    .context("Failed to obtain authorization ticket")?;

    if json {
        print_json(ticket.as_ref())
    } else {
        println!("{}", ticket);
        Ok(())
    }
}

async fn lookup(
    orchestrator: &LookupOrchestrator,
    ids: &[String],
    timeout: Option<u64>,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, returning partial results");
            on_signal.cancel();
        }
    });

    let mut options = LookupOptions::default().with_cancel(cancel);
    if let Some(secs) = timeout {
        options = options.with_timeout(Duration::from_secs(secs));
    }

    let result = orchestrator
        .lookup_with(ids, options)
        .await
        .context("Lookup failed")?;

    info!(
        found = result.found().count(),
        failed = result.failed().count(),
        complete = result.is_complete(),
        "Lookup finished"
    );
    print_json(&result)
}

fn read_ticket(path: &Path) -> Result<Option<AuthorizationTicket>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ticket from {:?}", path))?;
    match serde_json::from_str(&contents) {
        Ok(ticket) => Ok(Some(ticket)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable ticket file");
            Ok(None)
        }
    }
}

fn write_ticket(path: &Path, ticket: &AuthorizationTicket) -> Result<()> {
    let json = serde_json::to_string_pretty(ticket).context("Failed to serialize ticket")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write ticket to {:?}", path))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
