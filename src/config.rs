//! Turns the raw CLI/env flags in [`crate::cli::Cli`] into a validated
//! [`Config`] the rest of the proxy can use directly: durations parsed,
//! ports parsed, the upstream host and port joined into one address.

use std::net::SocketAddr;
use std::time::Duration;

use crate::cli::Cli;
use crate::error::StartupError;

/// Validated, ready-to-use configuration. Unlike [`Cli`], every field here
/// is already the type the rest of the proxy wants: `Duration`, `u16`,
/// resolved addresses.
#[derive(Debug, Clone)]
pub struct Config {
    pub debug: bool,
    pub key_expiry: Duration,
    pub cache_capacity: usize,
    pub redis_host: String,
    pub redis_port: u16,
    pub workers: u32,
    pub concurrency: u32,
    pub http_port: u16,
    pub resp_port: u16,
    pub shutdown_timeout: Duration,
}

impl Config {
    /// The upstream's `host:port`, as handed to `redis::Client::open`.
    pub fn upstream_addr(&self) -> String {
        format!("{}:{}", self.redis_host, self.redis_port)
    }

    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.http_port))
    }

    pub fn resp_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.resp_port))
    }
}

impl TryFrom<Cli> for Config {
    type Error = StartupError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let key_expiry = parse_duration("key-expiry", &cli.key_expiry)?;
        let shutdown_timeout = parse_duration("shutdown-timeout", &cli.shutdown_timeout)?;
        let redis_port = parse_port("redis-port", &cli.redis_port)?;
        let http_port = parse_port("port", &cli.port)?;
        let resp_port = parse_port("resp-port", &cli.resp_port)?;

        Ok(Self {
            debug: cli.debug,
            key_expiry,
            cache_capacity: cli.cache_capacity,
            redis_host: cli.redis_host,
            redis_port,
            workers: cli.workers,
            concurrency: cli.concurrency,
            http_port,
            resp_port,
            shutdown_timeout,
        })
    }
}

fn parse_duration(flag: &str, raw: &str) -> Result<Duration, StartupError> {
    humantime::parse_duration(raw)
        .map_err(|e| StartupError::InvalidConfig(format!("--{flag} {raw:?}: {e}")))
}

fn parse_port(flag: &str, raw: &str) -> Result<u16, StartupError> {
    raw.parse()
        .map_err(|_| StartupError::InvalidConfig(format!("--{flag} {raw:?} is not a valid port")))
}
