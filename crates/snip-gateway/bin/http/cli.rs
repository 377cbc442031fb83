use clap::Parser;
use snip_telemetry::LogFormat;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const SERVER_ADDRESS_ENV: &str = "SERVER_ADDRESS";
pub const BASE_URL_ENV: &str = "BASE_URL";
pub const FILE_STORAGE_PATH_ENV: &str = "FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "DATABASE_DSN";
pub const TIMEOUT_ENV: &str = "CTX_TIMEOUT";
pub const SECRET_KEY_ENV: &str = "SECRET_KEY";
pub const DELETE_WORKERS_ENV: &str = "DELETE_WORKERS";
pub const DELETE_QUEUE_CAPACITY_ENV: &str = "DELETE_QUEUE_CAPACITY";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_FILE_STORAGE_PATH: &str = "./storage.txt";

#[derive(Debug, Parser)]
#[command(name = "snip", about = "URL shortener HTTP server")]
pub struct CLI {
    /// Address the HTTP server listens on.
    #[arg(short = 'a', long, env = SERVER_ADDRESS_ENV, default_value = DEFAULT_SERVER_ADDRESS)]
    pub server_address: SocketAddr,

    /// Prefix of every short URL handed out.
    #[arg(short = 'b', long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Append-only log used when no database is configured.
    #[arg(
        short = 'f',
        long,
        env = FILE_STORAGE_PATH_ENV,
        default_value = DEFAULT_FILE_STORAGE_PATH
    )]
    pub file_storage_path: PathBuf,

    /// SQLite DSN, e.g. `sqlite://snip.db`. Selects the relational backend.
    #[arg(short = 'd', long, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    /// Deadline for each storage operation, in milliseconds.
    #[arg(short = 't', long, env = TIMEOUT_ENV, default_value_t = 500)]
    pub timeout_ms: u64,

    /// Key signing identity cookies. A random one is used when absent.
    #[arg(long, env = SECRET_KEY_ENV, hide_env_values = true)]
    pub secret_key: Option<String>,

    #[arg(long, env = DELETE_WORKERS_ENV, default_value_t = 4)]
    pub delete_workers: usize,

    #[arg(long, env = DELETE_QUEUE_CAPACITY_ENV, default_value_t = 1000)]
    pub delete_queue_capacity: usize,

    #[arg(long, env = LOG_FORMAT_ENV, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}
