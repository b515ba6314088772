//! mssql-schema-export CLI - export SQL Server schema objects as scripts.

use clap::Parser;
use mssql_schema_export::{Config, ExportError, ExportSummary, Exporter, MssqlServer, ServerConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "mssql-schema-export")]
#[command(about = "Export SQL Server schema objects into rule-renamed SQL script trees")]
#[command(version)]
struct Cli {
    /// SQL Server host, optionally `host,port`
    #[arg(short, long)]
    server: String,

    /// SQL login name
    #[arg(short, long)]
    username: String,

    /// SQL login password
    #[arg(short, long)]
    password: String,

    /// Output directory; each database is written to <output>/<database>
    #[arg(short, long)]
    output: PathBuf,

    /// Database to export (repeatable or comma-separated)
    #[arg(short, long = "database", required = true, value_delimiter = ',')]
    databases: Vec<String>,

    /// Omit the `USE [database]` header from every script
    #[arg(long)]
    skip_use: bool,

    /// Split tables into structure, index and constraint scripts
    #[arg(long)]
    split_tables: bool,

    /// Override number of workers per database
    #[arg(long)]
    workers: Option<usize>,

    /// Path to YAML configuration file with rename rules
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server port (overrides a port given in --server)
    #[arg(long)]
    port: Option<u16>,

    /// Encrypt the connection: true or false
    #[arg(long, default_value = "true")]
    encrypt: String,

    /// Trust the server certificate without validation
    #[arg(long)]
    trust_server_cert: bool,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), ExportError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);
    info!("mssql-schema-export v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::default(),
    };

    // Flags only ever switch options on; the file may already have set them.
    config.export.skip_use_statement |= cli.skip_use;
    config.export.split_table_files |= cli.split_tables;
    if let Some(w) = cli.workers {
        config.export.workers = Some(w);
    }
    config.validate()?;
    let config = config.with_auto_tuning();
    let rules = config.rule_table()?;
    info!("Compiled {} rename rules", rules.len());

    let mut server = ServerConfig::new("", cli.username, cli.password).with_server_address(&cli.server);
    if let Some(port) = cli.port {
        server.port = port;
    }
    server.encrypt = cli.encrypt;
    server.trust_server_cert = cli.trust_server_cert;
    server.validate()?;

    // Setup signal handling for graceful shutdown (SIGINT and SIGTERM)
    let cancel_token = setup_signal_handler()?;

    let exporter = Exporter::new(config.export.clone(), rules, &cli.output);
    info!(
        "Exporting {} database(s) to {}",
        cli.databases.len(),
        exporter.output_root().display()
    );

    let summary = exporter
        .run(&MssqlServer::new(server), &cli.databases, cancel_token)
        .await?;

    if cli.output_json {
        println!("{}", summary.to_json()?);
    } else {
        print_summary(&summary);
    }

    match summary.error() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn print_summary(summary: &ExportSummary) {
    println!("\nExport {}!", summary.status);
    println!("  Duration: {:.2}s", summary.duration_seconds);
    for db in &summary.databases {
        println!(
            "  {}: {} objects, {} triggers, {} written, {} duplicates, {} skipped, {} failed",
            db.database,
            db.objects_total,
            db.triggers_total,
            db.written,
            db.duplicates,
            db.skipped,
            db.failed
        );
    }
    if !summary.missing_databases.is_empty() {
        println!("  Missing databases: {:?}", summary.missing_databases);
    }
    for (database, reason) in &summary.failed_databases {
        println!("  Failed {}: {}", database, reason);
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
fn setup_signal_handler() -> Result<CancellationToken, ExportError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token_int = cancel_token.clone();
    tokio::spawn(async move {
        sigint.recv().await;
        eprintln!("\nReceived SIGINT. Finishing in-flight objects...");
        token_int.cancel();
    });

    let token_term = cancel_token.clone();
    tokio::spawn(async move {
        sigterm.recv().await;
        eprintln!("\nReceived SIGTERM. Finishing in-flight objects...");
        token_term.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> Result<CancellationToken, ExportError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Finishing in-flight objects...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
