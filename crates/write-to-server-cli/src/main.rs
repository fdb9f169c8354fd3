//! write-to-server CLI - bulk loads and connection checks against SQL Server.

mod demo;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use write_to_server::{
    ddl, BufferSchema, BulkOperationProvider, Connector, Error, Settings, TiberiusConnector,
};

use demo::{DemoRow, SeedContext};

#[derive(Parser)]
#[command(name = "write-to-server")]
#[command(about = "Bulk insert into SQL Server over the TDS bulk-load channel")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Test the connection registered under a context name
    HealthCheck {
        /// Connection string name in the config file
        #[arg(long)]
        context: String,
    },

    /// Bulk insert generated rows into the demo table
    Seed {
        /// Connection string name in the config file
        #[arg(long)]
        context: String,

        /// Number of rows to generate
        #[arg(long)]
        rows: usize,

        /// Rows per bulk load [default: bulk.batch_size from config]
        #[arg(long)]
        batch_size: Option<usize>,

        /// Keep batches written before a failure
        #[arg(long)]
        no_transaction: bool,

        /// Create the demo table if it does not exist
        #[arg(long)]
        create_table: bool,
    },

    /// Print the demo table's buffer schema
    Describe {
        /// Print the CREATE TABLE statement instead
        #[arg(long)]
        ddl: bool,
    },
}

#[derive(Debug, Serialize)]
struct HealthCheckResult {
    context: String,
    connected: bool,
    latency_ms: u64,
    error: Option<String>,
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

async fn run() -> Result<(), Error> {
    let cli = Cli::parse();

    // Describe needs no config or logging
    if let Commands::Describe { ddl } = cli.command {
        return describe(ddl);
    }

    setup_logging(&cli.verbosity, &cli.log_format).map_err(Error::Config)?;

    let settings = Settings::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Describe { .. } => unreachable!(), // Handled above
        Commands::HealthCheck { context } => {
            let connection_string = settings.connection_string(&context)?;
            let start = Instant::now();
            let outcome = match TiberiusConnector.connect(connection_string).await {
                Ok(mut conn) => conn.execute("SELECT 1").await,
                Err(e) => Err(e),
            };

            let result = HealthCheckResult {
                context: context.clone(),
                connected: outcome.is_ok(),
                latency_ms: start.elapsed().as_millis() as u64,
                error: outcome.as_ref().err().map(|e| e.to_string()),
            };

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  {}: {} ({}ms)",
                    result.context,
                    if result.connected { "OK" } else { "FAILED" },
                    result.latency_ms
                );
                if let Some(ref err) = result.error {
                    println!("    Error: {}", err);
                }
            }

            outcome?;
        }

        Commands::Seed {
            context,
            rows,
            batch_size,
            no_transaction,
            create_table,
        } => {
            let batch_size = batch_size.unwrap_or(settings.bulk.batch_size);
            let ctx = SeedContext::new(context, settings);
            let provider = BulkOperationProvider::new(&ctx)?;

            if create_table {
                provider.ensure_table::<DemoRow>().await?;
            }

            let data = demo::generate_rows(rows, chrono::Utc::now().naive_utc());
            let insert = async {
                if no_transaction {
                    provider.insert_no_transaction(&data, batch_size).await
                } else {
                    provider.insert(&data, batch_size).await
                }
            };

            // Dropping the insert closes the connection; the server rolls back
            // an open transaction.
            let summary = tokio::select! {
                result = insert => result?,
                _ = tokio::signal::ctrl_c() => {
                    return Err(Error::transfer(
                        ddl::qualify_table(demo::DEMO_SCHEMA, demo::DEMO_TABLE),
                        "interrupted",
                    ));
                }
            };

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "Inserted {} rows into {} in {} batches",
                    summary.rows, summary.table, summary.batches
                );
            }
        }
    }

    Ok(())
}

fn describe(show_ddl: bool) -> Result<(), Error> {
    let mapping = demo::demo_mapping().resolve::<DemoRow>()?;
    if show_ddl {
        println!("{}", ddl::create_table_sql(&mapping)?);
    } else {
        let schema = BufferSchema::from_mapping(&mapping)?;
        println!("{}", serde_json::to_string_pretty(&schema)?);
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("unknown verbosity '{}'", other)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format '{}'", other)),
    }

    Ok(())
}
