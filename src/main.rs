//! psqueelie - a small web console for ad-hoc SQL against PostgreSQL.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use psqueelie::cli::{Cli, Command, OutputFormat};
use psqueelie::config::{Config, ConnectionConfig, EnvConfig};
use psqueelie::connection::ConnectionProbe;
use psqueelie::db::{Connector, MockConnector, PostgresConnector};
use psqueelie::error::ConsoleError;
use psqueelie::history::HistoryLog;
use psqueelie::logging;
use psqueelie::persistence::{BlobStorage, MemoryStorage, StateDb};
use psqueelie::query::QueryExecutor;
use psqueelie::server::{self, AppState};
use psqueelie::view;

#[tokio::main]
async fn main() {
    // A missing .env file is the normal case.
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    logging::init_logging(cli.log_path().as_deref());

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<ConsoleError>() {
            Some(console_err) if console_err.is_config() => {
                error!("{}: {}", console_err.category(), console_err);
                eprintln!("{}", view::setup_guide(console_err));
            }
            _ => {
                error!("{e:#}");
                eprintln!("Error: {e:#}");
            }
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    match cli.command() {
        Command::Serve { bind, mock_db } => serve(&cli, &config, bind, mock_db).await,
        Command::Check => check(&cli, &config).await,
        Command::Run {
            sql,
            format,
            no_history,
        } => run_query(&cli, &config, &sql, format, no_history).await,
        Command::History { clear, limit } => history(&config, clear, limit).await,
    }
}

fn postgres_connector(config: &Config) -> Arc<dyn Connector> {
    Arc::new(PostgresConnector::new(config.server.connect_timeout()))
}

fn resolve_connection(cli: &Cli, config: &Config) -> anyhow::Result<ConnectionConfig> {
    let env = cli.resolve_env(EnvConfig::from_env())?;
    let connection = env.resolve()?;
    Ok(connection.with_label(config.connection.label.clone()))
}

async fn serve(
    cli: &Cli,
    config: &Config,
    bind: Option<std::net::SocketAddr>,
    mock_db: bool,
) -> anyhow::Result<()> {
    let (connector, storage, env): (Arc<dyn Connector>, Arc<dyn BlobStorage>, EnvConfig) =
        if mock_db {
            info!("Using in-memory mock database");
            let mock_env = EnvConfig {
                database: Some("mock".to_string()),
                user: Some("mock".to_string()),
                password: Some("mock".to_string()),
                ..Default::default()
            };
            (
                Arc::new(MockConnector::new()) as Arc<dyn Connector>,
                Arc::new(MemoryStorage::new()) as Arc<dyn BlobStorage>,
                cli.resolve_env(mock_env)?,
            )
        } else {
            let state_path = config.history.state_path();
            let db = StateDb::open(&state_path)
                .await
                .with_context(|| format!("opening history at {}", state_path.display()))?;
            (
                postgres_connector(config),
                Arc::new(db) as Arc<dyn BlobStorage>,
                cli.resolve_env(EnvConfig::from_env())?,
            )
        };

    // Configuration problems are reported per request so the UI can show the
    // setup guide; here they are only logged.
    if let Err(e) = env.resolve() {
        error!("{}", e);
    }

    let history = HistoryLog::load(storage).await;
    info!("Loaded {} history entries", history.len());

    let state = AppState::new(connector, env, config.connection.label.clone(), history);
    server::serve(state, bind.unwrap_or(config.server.bind)).await?;
    Ok(())
}

async fn check(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let connection = resolve_connection(cli, config)?;
    let probe = ConnectionProbe::new(postgres_connector(config));

    let report = probe.probe(&connection).await?;
    println!("Connection successful: {}", report.target);
    println!("{}", report.version);
    Ok(())
}

async fn run_query(
    cli: &Cli,
    config: &Config,
    sql: &str,
    format: OutputFormat,
    no_history: bool,
) -> anyhow::Result<()> {
    let connection = resolve_connection(cli, config)?;
    let executor = QueryExecutor::new(postgres_connector(config));

    let result = executor.execute(&connection, sql).await?;

    match format {
        OutputFormat::Table => println!("{}", view::format_table(&result)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Csv => print!("{}", view::to_csv(result.rows())?.unwrap_or_default()),
    }

    if !no_history {
        let db = StateDb::open(&config.history.state_path()).await?;
        let mut history = HistoryLog::load(Arc::new(db)).await;
        history.record(result).await;
    }

    Ok(())
}

async fn history(config: &Config, clear: bool, limit: usize) -> anyhow::Result<()> {
    let db = StateDb::open(&config.history.state_path()).await?;
    let mut history = HistoryLog::load(Arc::new(db)).await;

    if clear {
        history.clear().await?;
        println!("History cleared.");
        return Ok(());
    }

    if history.is_empty() {
        println!("No queries in history.");
        return Ok(());
    }

    for summary in history.summaries().into_iter().take(limit) {
        println!(
            "{}  {:>10}  {:>6}ms  {}",
            summary.timestamp.format("%Y-%m-%d %H:%M:%S"),
            view::row_badge(summary.row_count),
            summary.execution_time,
            summary.query_preview.replace('\n', " ")
        );
    }

    Ok(())
}
