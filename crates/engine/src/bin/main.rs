// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlscout_engine::{
    ColumnSpec, EngineConfig, ImportStrategy, ScanEvent, ScanRequest, SearchEngine, SearchMode,
    SqlRow,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Search, browse and bulk-load MySQL schemas
#[derive(Parser, Debug)]
#[command(name = "sqlscout")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Logical datasource; empty means the default
    #[arg(long, short = 'd', global = true, default_value = "")]
    datasource: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List tables with row estimates
    Tables,

    /// List the columns of a table
    Columns { table: String },

    /// List non-system databases
    Databases,

    /// Count matches of a value in one table
    Search {
        table: String,
        value: String,
        #[arg(long, default_value = "auto")]
        mode: SearchMode,
    },

    /// Search every table of the datasource
    Scan {
        value: String,
        #[arg(long, default_value = "auto")]
        mode: SearchMode,
        /// Overall deadline in seconds
        #[arg(long)]
        deadline: Option<u64>,
        /// Print one JSON event per line while scanning
        #[arg(long)]
        progressive: bool,
    },

    /// Print one page of matching rows
    Page {
        table: String,
        value: String,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 50)]
        size: i64,
        #[arg(long)]
        mode: Option<SearchMode>,
    },

    /// Print one page of a table
    Browse {
        table: String,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 50)]
        size: i64,
    },

    /// Load a JSON array of row objects into a table
    Import {
        table: String,
        file: PathBuf,
        #[arg(long, default_value = "append")]
        strategy: ImportStrategy,
        /// Run every batch inside one transaction
        #[arg(long)]
        transactional: bool,
        /// Create the table from the file's columns first
        #[arg(long)]
        create: bool,
    },

    /// Create a table from a YAML (or JSON) list of column definitions
    CreateTable {
        table: String,
        file: PathBuf,
        #[arg(long)]
        database: Option<String>,
        #[arg(long)]
        comment: Option<String>,
    },

    /// List configured datasources
    Datasources,

    /// Print search cache statistics
    CacheStats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let engine = SearchEngine::connect(config).context("Failed to connect")?;
    engine.start().await;

    let result = run(&engine, &cli.datasource, cli.command).await;
    engine.shutdown().await;
    result
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => EngineConfig::default(),
    };
    Ok(config.with_env_fallback())
}

async fn run(engine: &SearchEngine, ds: &str, command: Command) -> Result<()> {
    match command {
        Command::Tables => print_json(&engine.list_tables(ds).await?),
        Command::Columns { table } => print_json(&engine.list_columns(ds, &table).await?),
        Command::Databases => print_json(&engine.list_databases().await?),
        Command::Search { table, value, mode } => {
            print_json(&engine.search(ds, &table, &value, mode).await?)
        }
        Command::Scan {
            value,
            mode,
            deadline,
            progressive,
        } => {
            let mut request = ScanRequest::new(ds, value, mode);
            if let Some(secs) = deadline {
                request = request.with_deadline(std::time::Duration::from_secs(secs));
            }
            if progressive {
                let mut stream = engine.scan_all_tables_progressive(request);
                while let Some(event) = stream.recv().await {
                    println!("{}", serde_json::to_string(&event)?);
                    if let ScanEvent::Error { message } = &event {
                        anyhow::bail!("scan failed: {}", message);
                    }
                }
                Ok(())
            } else {
                print_json(&engine.scan_all_tables(request).await?)
            }
        }
        Command::Page {
            table,
            value,
            page,
            size,
            mode,
        } => print_json(&engine.paginate(ds, &table, &value, page, size, mode).await?),
        Command::Browse { table, page, size } => {
            print_json(&engine.browse(ds, &table, page, size).await?)
        }
        Command::Import {
            table,
            file,
            strategy,
            transactional,
            create,
        } => {
            let rows: Vec<SqlRow> = read_json(&file)?;
            if create {
                let headers: Vec<String> = rows
                    .first()
                    .map(|r| r.column_names().map(str::to_string).collect())
                    .unwrap_or_default();
                let (plan, report) = engine
                    .import_into_new_table(ds, &table, &headers, &rows)
                    .await?;
                print_json(&serde_json::json!({ "plan": plan, "report": report }))
            } else {
                print_json(
                    &engine
                        .bulk_import(ds, &table, &rows, strategy, transactional)
                        .await?,
                )
            }
        }
        Command::CreateTable {
            table,
            file,
            database,
            comment,
        } => {
            let columns: Vec<ColumnSpec> = read_yaml(&file)?;
            let sql = engine
                .create_table(ds, database.as_deref(), &table, &columns, comment.as_deref())
                .await?;
            println!("{}", sql);
            Ok(())
        }
        Command::Datasources => print_json(&engine.datasources()),
        Command::CacheStats => print_json(&engine.cache_stats()),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
