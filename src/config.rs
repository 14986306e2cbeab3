//! Process configuration, read from command-line flags, `LOG_LEVEL` and `LOG_REQUESTS`.

use anyhow::{Context, bail};
use std::net::SocketAddr;
use std::time::Duration;

use crate::pool::types::{DEFAULT_DIAL_TIMEOUT, DEFAULT_REPLICAS};

pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_RPC_ADDR: &str = "127.0.0.1:9090";
pub const DEFAULT_CACHE_ENTRIES: usize = 100_000;

pub const USAGE: &str = "Usage: distributed-cache [--http <addr:port>] [--rpc <addr:port>] \
[--self <addr>] [--peer <addr>]... [--replicas N] [--dial-timeout-ms N] [--cache-entries N]";

#[derive(Debug, Clone)]
pub struct Config {
    /// Client-facing HTTP API.
    pub http_addr: SocketAddr,
    /// Peer gRPC endpoint.
    pub rpc_addr: SocketAddr,
    /// Address other peers use to reach this node; defaults to `rpc_addr`.
    pub self_addr: String,
    pub peers: Vec<String>,
    pub replicas: usize,
    pub dial_timeout: Duration,
    /// Entry bound of each cache tier.
    pub cache_entries: usize,
    pub log_level: tracing::Level,
    /// Log every client HTTP request.
    pub log_requests: bool,
}

impl Config {
    /// Reads the process arguments and environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::from_args(std::env::args().skip(1))?;
        config.log_level = parse_log_level(std::env::var("LOG_LEVEL").ok().as_deref())?;
        config.log_requests = parse_flag(std::env::var("LOG_REQUESTS").ok().as_deref());
        Ok(config)
    }

    /// Parses flags, excluding the program name.
    pub fn from_args<I, S>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();

        let mut http_addr: SocketAddr = DEFAULT_HTTP_ADDR.parse()?;
        let mut rpc_addr: SocketAddr = DEFAULT_RPC_ADDR.parse()?;
        let mut self_addr: Option<String> = None;
        let mut peers = Vec::new();
        let mut replicas = DEFAULT_REPLICAS;
        let mut dial_timeout = DEFAULT_DIAL_TIMEOUT;
        let mut cache_entries = DEFAULT_CACHE_ENTRIES;

        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            let value = || flag_value(&args, i, flag);

            match flag {
                "--http" => http_addr = value()?.parse().context("invalid --http address")?,
                "--rpc" => rpc_addr = value()?.parse().context("invalid --rpc address")?,
                "--self" => self_addr = Some(value()?.to_string()),
                "--peer" => peers.push(value()?.to_string()),
                "--replicas" => replicas = value()?.parse().context("invalid --replicas")?,
                "--dial-timeout-ms" => {
                    let ms: u64 = value()?.parse().context("invalid --dial-timeout-ms")?;
                    dial_timeout = Duration::from_millis(ms);
                }
                "--cache-entries" => {
                    cache_entries = value()?.parse().context("invalid --cache-entries")?
                }
                other => bail!("unknown argument '{}'\n{}", other, USAGE),
            }
            i += 2;
        }

        if replicas == 0 {
            bail!("--replicas must be greater than zero");
        }
        if cache_entries == 0 {
            bail!("--cache-entries must be greater than zero");
        }

        Ok(Self {
            http_addr,
            rpc_addr,
            self_addr: self_addr.unwrap_or_else(|| rpc_addr.to_string()),
            peers,
            replicas,
            dial_timeout,
            cache_entries,
            log_level: tracing::Level::INFO,
            log_requests: false,
        })
    }
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> anyhow::Result<&'a str> {
    args.get(i + 1)
        .map(String::as_str)
        .with_context(|| format!("{} requires a value\n{}", flag, USAGE))
}

/// Maps `LOG_LEVEL` to a tracing level; unset means `INFO`.
pub fn parse_log_level(value: Option<&str>) -> anyhow::Result<tracing::Level> {
    match value.map(str::trim) {
        None | Some("") => Ok(tracing::Level::INFO),
        Some(level) => level
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid LOG_LEVEL '{}'", level)),
    }
}

/// Boolean switch from the environment. Anything but a recognized true value is false.
pub fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(str::trim),
        Some("1" | "t" | "T" | "true" | "TRUE" | "True")
    )
}
