//! nsdriver - command-line access to a NetStorage driver
//!
//! Reads config.json, builds the driver (with an optional local backend)
//! and runs one storage operation per invocation.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use netstorage_driver::config::{self, AppConfig};
use netstorage_driver::drivers::netstorage::{NetStorageDriver, NetStorageDriverFactory, Placement};
use netstorage_driver::storage::{StorageDriver, StorageError, StorageManager, UrlOptions};
use netstorage_driver::utils::{fix_and_clean_path, get_actual_path, is_sub_path};

/// nsdriver - Akamai NetStorage storage driver CLI
#[derive(Parser)]
#[command(name = "nsdriver")]
#[command(author, about = "Access Akamai NetStorage through the hybrid storage driver", long_about = None)]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_TIME"), ")"))]
struct Cli {
    /// Configuration file (default: ./config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the direct children of a directory
    Ls { path: String },

    /// Show size, modification time and kind
    Stat { path: String },

    /// Download an object
    Get {
        path: String,

        /// Start reading at this byte offset
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload a local file
    Put { file: PathBuf, path: String },

    /// Move or rename an object
    Mv { src: String, dst: String },

    /// Delete an object or a whole directory tree
    Rm { path: String },

    /// Print the URL of an object
    Url { path: String },

    /// Show file count and bytes below a directory
    Du { path: String },

    /// Create a directory
    Mkdir { path: String },

    /// Remove an empty directory
    Rmdir { path: String },

    /// Create a symlink at `link` pointing to `target`
    Symlink { target: String, link: String },

    /// Set the modification time (default: now)
    Touch {
        path: String,

        /// Seconds since epoch
        #[arg(long)]
        mtime: Option<i64>,
    },
}

/// Paths under `prefix` go to the local backend, relative to the prefix
fn prefix_classifier(prefix: String) -> impl Fn(&str) -> Placement + Send + Sync + 'static {
    move |path: &str| {
        if is_sub_path(&prefix, path) {
            Placement::Local(get_actual_path(&prefix, path))
        } else {
            // A trailing separator marks a directory and must reach the client
            let mut name = fix_and_clean_path(path);
            if path.ends_with('/') && name != "/" {
                name.push('/');
            }
            Placement::Remote(name)
        }
    }
}

fn build_driver(app_config: &AppConfig) -> Result<NetStorageDriver> {
    if app_config.driver.driver_type != "netstorage" {
        return Err(StorageError::Config(format!("unsupported driver type: {}", app_config.driver.driver_type)).into());
    }

    let manager = StorageManager::new();
    netstorage_driver::register_storage_drivers(&manager);

    let mut factory = NetStorageDriverFactory::new();
    if let Some(prefix) = app_config.local_prefix.clone() {
        factory = factory.with_customizer(move |b| b.classifier(prefix_classifier(prefix.clone())));
    }
    if let Some(base) = app_config.public_base_url.clone() {
        factory = factory.with_customizer(move |b| {
            let base = base.trim_end_matches('/').to_string();
            b.url_mapper(move |driver: &NetStorageDriver, path: &str, _options: &UrlOptions| {
                match driver.classify(path) {
                    Placement::Remote(name) => Ok(format!("{}{}", base, name)),
                    Placement::Local(_) => Err(StorageError::Unsupported(format!("public URL of local path {}", path)).into()),
                }
            })
        });
    }

    factory.build_driver(app_config.driver.config.clone(), &manager)
}

async fn run(driver: &NetStorageDriver, command: Commands) -> Result<()> {
    match command {
        Commands::Ls { path } => {
            for entry in driver.list(&path).await? {
                println!("{}", entry);
            }
        }
        Commands::Stat { path } => {
            let info = driver.stat(&path).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::Get { path, offset, output } => {
            let mut reader = driver.reader(&path, offset).await?;
            let copied = match output {
                Some(file) => {
                    let mut out = tokio::fs::File::create(&file).await?;
                    let n = tokio::io::copy(&mut reader, &mut out).await?;
                    out.flush().await?;
                    n
                }
                None => {
                    let mut out = tokio::io::stdout();
                    let n = tokio::io::copy(&mut reader, &mut out).await?;
                    out.flush().await?;
                    n
                }
            };
            tracing::info!("Downloaded {} bytes from {}", copied, path);
        }
        Commands::Put { file, path } => {
            let mut source = tokio::fs::File::open(&file).await?;
            let mut writer = driver.writer(&path, false).await?;
            match tokio::io::copy(&mut source, &mut writer).await {
                Ok(n) => {
                    writer.commit().await?;
                    tracing::info!("Uploaded {} bytes to {}", n, path);
                }
                Err(e) => {
                    writer.cancel().await?;
                    return Err(e.into());
                }
            }
        }
        Commands::Mv { src, dst } => driver.move_item(&src, &dst).await?,
        Commands::Rm { path } => driver.delete(&path).await?,
        Commands::Url { path } => println!("{}", driver.url_for(&path, &UrlOptions::new()).await?),
        Commands::Du { path } => {
            let du = driver.du(&path).await?;
            println!("{}\t{}\t{}", du.info.files, du.info.bytes, du.directory);
        }
        Commands::Mkdir { path } => driver.mkdir(&path).await?,
        Commands::Rmdir { path } => driver.rmdir(&path).await?,
        Commands::Symlink { target, link } => driver.symlink(&target, &link).await?,
        Commands::Touch { path, mtime } => {
            let mtime = mtime.unwrap_or_else(|| chrono::Utc::now().timestamp());
            driver.set_mtime(&path, mtime).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let app_config = config::load_config(&config_path).map_err(|e| anyhow!(e))?;

    let level = if cli.verbose { "debug".to_string() } else { app_config.log_level.clone() };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let driver = build_driver(&app_config)?;
    if let Err(e) = run(&driver, cli.command).await {
        tracing::error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}
