//! CLI surface for operating the engine directly (SPEC_FULL.md §7): a
//! runnable, testable front end so the engine doesn't need a graphical
//! shell to exercise end to end.

use crate::cas::ContentStore;
use crate::engine::WorkspaceEngine;
use crate::fileops::LocalFileOperations;
use crate::strategy::base::ProgressUpdate;
use crate::workspace::WorkspaceConfiguration;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "workspace-composer")]
#[command(author, version, about = "Content-addressed workspace composition engine")]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Materialize a workspace from a configuration file (JSON or TOML).
    Prepare {
        /// Path to a serialized `WorkspaceConfiguration`.
        config: PathBuf,
        /// Optional content-addressable store root.
        #[arg(long)]
        cas_root: Option<PathBuf>,
    },

    /// Report the saturating byte estimate for a configuration's strategy.
    Estimate {
        config: PathBuf,
    },

    /// Check whether this host satisfies a configuration's strategy
    /// requirements, with no filesystem side effects.
    Supports {
        config: PathBuf,
    },

    /// Populate the content-addressable store with a file, for test
    /// fixtures and local tooling (CAS population is otherwise external to
    /// this engine per spec.md §4.2).
    CasPut {
        /// File whose content should be stored.
        source: PathBuf,
        /// Store root to write into.
        #[arg(long)]
        cas_root: PathBuf,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::logging::init(cli.verbose);

    match cli.command {
        Commands::Prepare { config, cas_root } => prepare(config, cas_root).await,
        Commands::Estimate { config } => estimate(config).await,
        Commands::Supports { config } => supports(config).await,
        Commands::CasPut { source, cas_root } => cas_put(source, cas_root).await,
    }
}

async fn load_config(path: PathBuf) -> Result<WorkspaceConfiguration> {
    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read workspace configuration at {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        serde_json::from_str(&content).context("failed to parse workspace configuration as JSON")
    } else {
        toml::from_str(&content).context("failed to parse workspace configuration as TOML")
    }
}

fn build_engine(cas_root: Option<PathBuf>) -> WorkspaceEngine {
    let cas = cas_root.map(|root| Arc::new(ContentStore::new(root)));
    WorkspaceEngine::new(Arc::new(LocalFileOperations::new(cas)))
}

async fn prepare(config_path: PathBuf, cas_root: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path).await?;
    let engine = build_engine(cas_root);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    let progress_task = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            render_progress(&bar, &update);
        }
        bar.finish_and_clear();
    });

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("cancellation requested, tearing down workspace");
            ctrl_c_cancel.cancel();
        }
    });

    let result = engine.prepare(&config, Some(tx), cancel).await;
    let _ = progress_task.await;

    match result {
        Ok(info) => {
            println!("{}", serde_json::to_string_pretty(&info)?);
            if !info.is_prepared {
                anyhow::bail!("workspace preparation did not complete successfully");
            }
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(e).context("workspace preparation cancelled")),
    }
}

fn render_progress(bar: &ProgressBar, update: &ProgressUpdate) {
    bar.set_message(format!(
        "{}/{} {} {}",
        update.files_processed,
        update.total_files,
        update.current_operation,
        update.current_file.display()
    ));
    bar.tick();
}

async fn estimate(config_path: PathBuf) -> Result<()> {
    let config = load_config(config_path).await?;
    let engine = build_engine(None);
    println!("{}", engine.estimate(&config));
    Ok(())
}

async fn supports(config_path: PathBuf) -> Result<()> {
    let config = load_config(config_path).await?;
    let engine = build_engine(None);
    let outcome = engine.supports(&config);
    println!("{outcome:?}");
    if !outcome.is_ok() {
        anyhow::bail!("host does not satisfy strategy requirements: {outcome:?}");
    }
    Ok(())
}

async fn cas_put(source: PathBuf, cas_root: PathBuf) -> Result<()> {
    let store = ContentStore::new(cas_root);
    let hash = store
        .put(&source)
        .await
        .context("failed to store file in content-addressable store")?;
    println!("{hash}");
    Ok(())
}
