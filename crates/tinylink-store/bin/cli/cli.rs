use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::{Display, Formatter};

pub const STORAGE_BACKEND_ENV: &str = "TINYLINK_STORAGE_BACKEND";
pub const REDIS_URL_ENV: &str = "TINYLINK_REDIS_URL";
pub const REDIS_NAMESPACE_ENV: &str = "TINYLINK_REDIS_NAMESPACE";
pub const TTL_SECS_ENV: &str = "TINYLINK_TTL_SECS";
pub const BASE_URL_ENV: &str = "TINYLINK_BASE_URL";
pub const LOG_JSON_ENV: &str = "TINYLINK_LOG_JSON";

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_BASE_URL: &str = "http://short.url";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "redis")]
    Redis,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "tinylink", about = "Shorten URLs and resolve short codes")]
pub struct CLI {
    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::Redis
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = REDIS_URL_ENV, default_value = DEFAULT_REDIS_URL)]
    pub redis_url: String,

    #[arg(long, env = REDIS_NAMESPACE_ENV, default_value = "")]
    pub redis_namespace: String,

    /// Expiry of new mappings in seconds. Redis defaults to 30 days,
    /// in-memory mappings never expire unless this is set.
    #[arg(long, env = TTL_SECS_ENV)]
    pub ttl_secs: Option<u64>,

    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, env = LOG_JSON_ENV)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the short URL for each long URL, creating mappings as needed.
    Shorten {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Print the long URL stored under a short code.
    Resolve { code: String },
}
