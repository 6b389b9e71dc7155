mod cli;

use crate::cli::{Command, StorageBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use std::time::Duration;
use tinylink_core::UrlShortener;
use tinylink_storage::redis::DEFAULT_MAPPING_TTL;
use tinylink_storage::{InMemoryBackend, RedisBackend, RedisConfig};
use tinylink_store::UrlStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if config.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(storage_backend = %config.storage, "starting tinylink");

    let ttl = config.ttl_secs.map(Duration::from_secs);
    let shortener: Box<dyn UrlShortener> = match config.storage {
        StorageBackendArg::InMemory => {
            let backend = match ttl {
                Some(ttl) => InMemoryBackend::with_ttl(ttl),
                None => InMemoryBackend::new(),
            };
            Box::new(UrlStore::new(backend))
        }
        StorageBackendArg::Redis => {
            let redis_config = RedisConfig::builder()
                .url(config.redis_url.as_str())
                .namespace(config.redis_namespace.as_str())
                .ttl(ttl.unwrap_or(DEFAULT_MAPPING_TTL))
                .build();
            let backend = RedisBackend::connect(redis_config)
                .await
                .context("could not connect to Redis")?;
            Box::new(UrlStore::new(backend))
        }
    };

    run(shortener.as_ref(), config.command, &config.base_url).await
}

async fn run(shortener: &dyn UrlShortener, command: Command, base_url: &str) -> anyhow::Result<()> {
    match command {
        Command::Shorten { urls } => {
            for url in urls {
                let code = shortener
                    .generate_short_url(&url)
                    .await
                    .with_context(|| format!("failed to shorten {url}"))?;
                println!("{}", code.to_url(base_url));
            }
        }
        Command::Resolve { code } => {
            match shortener
                .get_long_url(&code)
                .await
                .with_context(|| format!("failed to resolve {code}"))?
            {
                Some(long_url) => println!("{long_url}"),
                None => anyhow::bail!("short code not found: {code}"),
            }
        }
    }
    Ok(())
}
