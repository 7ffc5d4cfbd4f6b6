use clap::Parser;

/// Command-line flags for the proxy. Every flag can also be set through its
/// matching environment variable, which lets the binary run the same way
/// under a process manager as it does from a shell.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "keyfront",
    about = "A read-through caching proxy in front of a Redis-compatible store",
    version
)]
pub struct Cli {
    /// Enables debug-level logging.
    #[arg(long, env = "KEYFRONT_DEBUG")]
    pub debug: bool,

    /// How long a cached value stays fresh before it's treated as a miss.
    #[arg(short = 'k', long = "key-expiry", env = "KEYFRONT_KEY_EXPIRY", default_value = "5s")]
    pub key_expiry: String,

    /// Maximum number of entries the cache holds before evicting the least
    /// recently used one.
    #[arg(
        short = 'c',
        long = "cache-capacity",
        env = "KEYFRONT_CACHE_CAPACITY",
        default_value_t = 15_000
    )]
    pub cache_capacity: usize,

    /// Hostname of the upstream Redis-compatible store.
    #[arg(long = "redis-host", env = "REDIS_HOST", default_value = "localhost")]
    pub redis_host: String,

    /// Port of the upstream Redis-compatible store.
    #[arg(long = "redis-port", env = "REDIS_PORT", default_value = "6379")]
    pub redis_port: String,

    /// Number of workers serving jobs concurrently.
    #[arg(short = 'w', long = "workers", env = "KEYFRONT_WORKERS", default_value_t = 1)]
    pub workers: u32,

    /// Maximum number of jobs admitted but not yet dispatched to a worker.
    #[arg(
        short = 'C',
        long = "concurrency",
        env = "KEYFRONT_CONCURRENCY",
        default_value_t = 30
    )]
    pub concurrency: u32,

    /// Port the HTTP front-end listens on.
    #[arg(short = 'P', long = "port", env = "KEYFRONT_PORT", default_value = "3000")]
    pub port: String,

    /// Port the RESP front-end listens on.
    #[arg(long = "resp-port", env = "KEYFRONT_RESP_PORT", default_value = "6380")]
    pub resp_port: String,

    /// How long shutdown waits for in-flight jobs to drain before killing
    /// the worker pool outright.
    #[arg(
        long = "shutdown-timeout",
        env = "KEYFRONT_SHUTDOWN_TIMEOUT",
        default_value = "2s"
    )]
    pub shutdown_timeout: String,
}
