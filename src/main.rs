mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};

use comicshelf::{convert, library, pipeline, review, watch};
use comicshelf_archive::Cbz;
use comicshelf_core::config::Config;
use comicshelf_core::metadata::ComicMetadata;
use comicshelf_core::ChapterNumber;
use comicshelf_db::{get_conn, init_pool, DbPool};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "comicshelf=trace,comicshelf_archive=debug,comicshelf_db=debug,comicshelf_parser=debug"
                .to_string()
        } else {
            "comicshelf=debug,comicshelf_db=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_daemon(cli.config.as_deref()))
        }
        Commands::Run { input } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_file(&input, cli.config.as_deref()))
        }
        Commands::Parse { filename, json } => parse_filename(&filename, json),
        Commands::Inspect { file, json } => inspect_file(&file, json),
        Commands::Pending => list_pending(cli.config.as_deref()),
        Commands::Filed { json } => list_filed(cli.config.as_deref(), json),
        Commands::Resolve {
            hash,
            series,
            volume,
            chapter,
            title,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(resolve_record(
                cli.config.as_deref(),
                &hash,
                series,
                volume,
                chapter,
                title,
            ))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("comicshelf {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(config_path: Option<&Path>) -> Config {
    let config = Config::load_or_default(config_path);
    for warning in config.validate() {
        tracing::warn!("Config: {warning}");
    }
    config
}

fn open_pool(config: &Config) -> Result<DbPool> {
    if let Some(parent) = config.paths.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    // One connection per worker, plus headroom for the watcher pre-check
    // and CLI queries.
    let pool_size = config.processing.workers.max(1) as u32 + 2;
    init_pool(&config.paths.db_path.to_string_lossy(), pool_size)
        .context("Failed to open database")
}

async fn start_daemon(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);

    tracing::info!("Starting comicshelf daemon");
    tracing::info!("Watching: {}", config.paths.downloads.display());
    tracing::info!("Library: {}", config.paths.library.display());

    for dir in [
        &config.paths.downloads,
        &config.paths.processing,
        &config.paths.library,
        &config.paths.covers,
    ] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let pool = open_pool(&config)?;

    // Recover records for archives filed before a crash took the daemon
    // down between the library move and the history append.
    {
        let config = config.clone();
        let pool = pool.clone();
        let orphans = tokio::task::spawn_blocking(move || {
            library::reconcile_orphans(&config, &pool)
        })
        .await??;
        if orphans > 0 {
            tracing::info!("Re-derived history for {orphans} library archives");
        }
    }

    let (discovery_tx, discovery_rx) =
        tokio::sync::mpsc::channel(config.processing.queue_capacity.max(1));

    let shared = Arc::new(pipeline::Shared::new(config.clone(), pool.clone()));
    let orchestrator = pipeline::Orchestrator::new(Arc::clone(&shared), discovery_rx);
    let orchestrator_handle = tokio::spawn(orchestrator.run());

    let mut watcher = watch::DirWatcher::new(config, pool, discovery_tx);
    watcher.start()?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    // Dropping the watcher closes the discovery queue; the worker pool
    // drains whatever is in flight and exits.
    watcher.stop();
    drop(watcher);
    orchestrator_handle.await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn run_file(input: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);

    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }

    for dir in [
        &config.paths.processing,
        &config.paths.library,
        &config.paths.covers,
    ] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let pool = open_pool(&config)?;
    let shared = Arc::new(pipeline::Shared::new(config, pool));

    match pipeline::process(&shared, input.to_path_buf()).await? {
        Some(record) => {
            println!("Outcome: {}", record.outcome);
            if let Some(detail) = &record.detail {
                println!("Detail: {detail}");
            }
            if let Some(path) = &record.library_path {
                println!("Filed at: {path}");
            }
        }
        None => println!("File was unreadable; nothing recorded."),
    }
    Ok(())
}

fn parse_filename(filename: &str, json: bool) -> Result<()> {
    let components = comicshelf_parser::parse(filename);

    if json {
        println!("{}", serde_json::to_string_pretty(&components)?);
        return Ok(());
    }

    println!("Filename: {filename}");
    println!("  Series: {}", components.series.as_deref().unwrap_or("-"));
    println!(
        "  Volume: {}",
        components
            .volume
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".into())
    );
    println!(
        "  Chapter: {}",
        components
            .chapter
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".into())
    );
    println!("  Title: {}", components.title.as_deref().unwrap_or("-"));
    Ok(())
}

fn inspect_file(file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let cbz = Cbz::open(file)?;

    if json {
        #[derive(serde::Serialize)]
        struct Inspection<'a> {
            entries: &'a [String],
            images: &'a [String],
            cover: Option<&'a str>,
            metadata: Option<&'a comicshelf_archive::ComicInfo>,
        }
        let report = Inspection {
            entries: cbz.entries(),
            images: cbz.images(),
            cover: cbz.cover_entry(),
            metadata: cbz.metadata(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Archive: {}", file.display());
    println!("Entries: {}", cbz.entries().len());
    println!("Page images: {}", cbz.images().len());
    println!("Cover candidate: {}", cbz.cover_entry().unwrap_or("-"));
    match cbz.metadata() {
        Some(info) => {
            println!("Embedded metadata:");
            println!("  Series: {}", info.series.as_deref().unwrap_or("-"));
            println!("  Volume: {}", info.volume.as_deref().unwrap_or("-"));
            println!("  Number: {}", info.number.as_deref().unwrap_or("-"));
            println!("  Title: {}", info.title.as_deref().unwrap_or("-"));
            println!("  Writer: {}", info.writer.as_deref().unwrap_or("-"));
        }
        None => println!("No embedded metadata"),
    }
    Ok(())
}

fn list_pending(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);
    let pool = open_pool(&config)?;
    let conn = get_conn(&pool)?;

    let pending = review::pending(&conn)?;
    if pending.is_empty() {
        println!("No records waiting for review.");
        return Ok(());
    }

    for record in pending {
        println!("{}  {}", record.content_hash, record.original_filename);
        if let Some(detail) = &record.detail {
            println!("    {detail}");
        }
        if let Some(path) = &record.archive_path {
            println!("    at {path}");
        }
    }
    Ok(())
}

fn list_filed(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config_path);
    let pool = open_pool(&config)?;
    let conn = get_conn(&pool)?;

    let entries = convert::filed_entries(&conn)?;

    if json {
        #[derive(serde::Serialize)]
        struct Entry<'a> {
            id: String,
            library_path: &'a str,
            metadata: &'a ComicMetadata,
            converted_path: Option<&'a str>,
        }
        let report: Vec<Entry> = entries
            .iter()
            .map(|e| Entry {
                id: e.id.to_string(),
                library_path: &e.library_path,
                metadata: &e.metadata,
                converted_path: e.converted_path.as_deref(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No filed archives.");
        return Ok(());
    }
    for entry in entries {
        let status = if entry.is_converted() { "converted" } else { "pending" };
        println!("{}  [{status}]  {}", entry.id, entry.library_path);
    }
    Ok(())
}

async fn resolve_record(
    config_path: Option<&Path>,
    hash: &str,
    series: String,
    volume: Option<u32>,
    chapter: Option<f64>,
    title: Option<String>,
) -> Result<()> {
    let config = load_config(config_path);
    let pool = open_pool(&config)?;
    let shared = Arc::new(pipeline::Shared::new(config, pool));

    let chapter = match chapter {
        Some(c) => Some(
            ChapterNumber::from_f64(c)
                .with_context(|| format!("Invalid chapter number: {c}"))?,
        ),
        None => None,
    };

    let metadata = ComicMetadata {
        volume,
        chapter,
        title,
        ..ComicMetadata::for_series(series)
    };

    let record = review::resolve(&shared, hash, metadata).await?;
    println!("Resolved as: {}", record.outcome);
    if let Some(path) = &record.library_path {
        println!("Filed at: {path}");
    }
    if let Some(detail) = &record.detail {
        println!("Detail: {detail}");
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let contents = std::fs::read_to_string(p)
                .with_context(|| format!("Failed to read {}", p.display()))?;
            Config::from_json(&contents)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("✓ Configuration is valid");
    } else {
        println!("Configuration parsed with {} warning(s):", warnings.len());
        for w in &warnings {
            println!("  - {w}");
        }
    }
    println!("  Downloads: {}", config.paths.downloads.display());
    println!("  Library: {}", config.paths.library.display());
    println!("  Workers: {}", config.processing.workers);
    println!("  Settle interval: {}s", config.watch.settle_secs);
    Ok(())
}
