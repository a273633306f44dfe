use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use servicex::config::{load_config, load_default_config};
use servicex::{ConfigError, Configuration, QueryCache, ServiceXClient};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "servicex",
    version,
    about = "Inspect ServiceX transforms and the local result cache"
)]
struct Cli {
    /// Configuration file. Defaults to servicex.yaml found from the current directory.
    #[arg(long, global = true, env = "SERVICEX_CONFIG")]
    config: Option<PathBuf>,

    /// Name of the configured endpoint to use.
    #[arg(long, short, global = true)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transforms known to the ServiceX deployment.
    Transforms {
        #[command(subcommand)]
        command: TransformsCommand,
    },
    /// List the code generators the deployment offers.
    Codegens {
        /// ServiceX URL, overriding the configured endpoint.
        #[arg(long)]
        url: Option<String>,
    },
    /// The local transform cache.
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

#[derive(Subcommand)]
enum TransformsCommand {
    List {
        /// ServiceX URL, overriding the configured endpoint.
        #[arg(long)]
        url: Option<String>,
        /// Only show complete transforms.
        #[arg(long)]
        complete: bool,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    List,
    /// Remove all cached transforms and their downloaded files.
    Clear,
}

fn init_tracing() {
    // Route `log` records from the library into tracing.
    let _ = tracing_log::LogTracer::init();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn load_configuration(path: Option<&Path>) -> anyhow::Result<Configuration> {
    match path {
        Some(path) => load_config(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => match load_default_config() {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound { .. }) => {
                log::debug!("No configuration file found, using defaults");
                Ok(Configuration::default())
            }
            Err(e) => Err(e.into()),
        },
    }
}

fn connect(
    config: &Configuration,
    url: Option<&str>,
    backend: Option<&str>,
) -> anyhow::Result<ServiceXClient> {
    let client = match url {
        Some(url) => ServiceXClient::from_url(config, url)?,
        None => ServiceXClient::from_config(config, backend)
            .context("no usable endpoint; pass --url or configure api_endpoints")?,
    };
    Ok(client)
}

async fn list_transforms(client: &ServiceXClient, complete_only: bool) -> anyhow::Result<()> {
    let transforms = client.get_transforms().await?;
    for status in transforms
        .iter()
        .filter(|s| !complete_only || s.status.is_complete())
    {
        let total = status
            .total_files()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "{}\t{}\t{}/{}\t{} failed\t{}",
            status.request_id,
            status.status,
            status.files_completed,
            total,
            status.files_failed,
            status.title.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

async fn list_codegens(client: &ServiceXClient) -> anyhow::Result<()> {
    for (name, url) in client.get_code_generators().await? {
        println!("{}\t{}", name, url);
    }
    Ok(())
}

fn open_cache(config: &Configuration) -> anyhow::Result<QueryCache> {
    let path = config.resolved_cache_path();
    QueryCache::open(&path).with_context(|| format!("opening cache at {}", path.display()))
}

fn list_cache(cache: &QueryCache) -> anyhow::Result<()> {
    for record in cache.list_transforms()? {
        println!(
            "{}\t{}\t{}\t{} files\t{}\t{}",
            record.request_id,
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.codegen,
            record.file_uris.len(),
            record.title.as_deref().unwrap_or(""),
            record.data_dir.display()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_configuration(cli.config.as_deref())?;
    let backend = cli.backend.as_deref();

    match cli.command {
        Command::Transforms {
            command: TransformsCommand::List { url, complete },
        } => {
            let client = connect(&config, url.as_deref(), backend)?;
            list_transforms(&client, complete).await?;
        }
        Command::Codegens { url } => {
            let client = connect(&config, url.as_deref(), backend)?;
            list_codegens(&client).await?;
        }
        Command::Cache { command } => {
            let cache = open_cache(&config)?;
            match command {
                CacheCommand::List => list_cache(&cache)?,
                CacheCommand::Clear => {
                    let removed = cache.clear()?;
                    println!("Removed {} cached transforms", removed);
                }
            }
        }
    }

    Ok(())
}
