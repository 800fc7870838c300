use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use trickle::{DEFAULT_SERVER_NAME, StreamLimits};

/// Runtime configuration for the `trickle-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is honored), with defaults matching the classic behavior: one chunk
/// per second, 60 seconds to write any chunk.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "trickle-server",
    version,
    about = "An HTTP server that streams paced, chunked synthetic payloads"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "127.0.0.1:8080" or "/tmp/trickle.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("127.0.0.1:8080"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Minimum time between two chunks of the same response, in milliseconds.
    ///
    /// A chunk whose production and delivery already took longer than this is
    /// followed by the next one immediately.
    ///
    /// Environment variable: `PACING_INTERVAL_MS`
    #[arg(long, env = "PACING_INTERVAL_MS", default_value_t = 1000)]
    pub pacing_interval_ms: u64,

    /// Time allowed for the transport to accept a single chunk, in seconds.
    ///
    /// A response that stalls longer than this is abandoned.
    ///
    /// Environment variable: `WRITE_TIMEOUT_SECS`
    #[arg(long, env = "WRITE_TIMEOUT_SECS", default_value_t = 60)]
    pub write_timeout_secs: u64,

    /// Largest chunk size, in bytes, a client may request.
    ///
    /// Environment variable: `MAX_CHUNK_SIZE`
    #[arg(long, env = "MAX_CHUNK_SIZE", default_value_t = 64 * 1024 * 1024)]
    pub max_chunk_size: usize,

    /// Largest chunk count a client may request.
    ///
    /// Environment variable: `MAX_CHUNK_COUNT`
    #[arg(long, env = "MAX_CHUNK_COUNT", default_value_t = 1_000_000)]
    pub max_chunk_count: usize,

    /// Time allowed for in-flight streams to finish on shutdown before they
    /// are cancelled, in seconds.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,

    /// Value of the `Server` response header.
    ///
    /// Environment variable: `SERVER_NAME`
    #[arg(long, env = "SERVER_NAME", default_value_t = String::from(DEFAULT_SERVER_NAME))]
    pub server_name: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub pacing_interval: Duration,
    pub write_timeout: Duration,
    pub limits: StreamLimits,
    pub shutdown_timeout: Duration,
    pub server_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_addr: String::from("127.0.0.1:8080"),
            uds: false,
            pacing_interval: trickle::DEFAULT_PACING_INTERVAL,
            write_timeout: Duration::from_secs(60),
            limits: StreamLimits::default(),
            shutdown_timeout: Duration::from_secs(5),
            server_name: String::from(DEFAULT_SERVER_NAME),
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.pacing_interval_ms == 0 {
            bail!("PACING_INTERVAL_MS must be greater than 0");
        }

        if args.write_timeout_secs == 0 {
            bail!("WRITE_TIMEOUT_SECS must be greater than 0");
        }

        if args.max_chunk_size == 0 || args.max_chunk_count == 0 {
            bail!("MAX_CHUNK_SIZE and MAX_CHUNK_COUNT must be greater than 0");
        }

        if args.server_name.trim().is_empty() {
            bail!("SERVER_NAME must not be empty");
        }

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            pacing_interval: Duration::from_millis(args.pacing_interval_ms),
            write_timeout: Duration::from_secs(args.write_timeout_secs),
            limits: StreamLimits {
                max_chunk_size: args.max_chunk_size,
                max_chunk_count: args.max_chunk_count,
            },
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
            server_name: args.server_name,
        })
    }
}
