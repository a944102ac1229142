//! peercache node
//!
//! Runs one member of a peercache cluster: a single demo group backed by a
//! JSON file, the peer protocol server, and an admin server exposing health
//! and Prometheus endpoints.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      peercache node                        │
//! ├───────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌─────────────┐  │
//! │  │  Peer Server │───▶│    Group     │───▶│ JSON loader │  │
//! │  │  (--listen)  │    │  (--group)   │    │  (--data)   │  │
//! │  └──────────────┘    └──────┬───────┘    └─────────────┘  │
//! │                             │ remote owner                │
//! │                             ▼                             │
//! │                      ┌──────────────┐                     │
//! │                      │   HttpPool   │──▶ other nodes      │
//! │                      └──────────────┘                     │
//! │  ┌──────────────┐                                         │
//! │  │ Admin Server │  /healthz /readyz /metrics              │
//! │  └──────────────┘                                         │
//! └───────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use peercache::error::{Error, Result};
use peercache::{GetterFn, GroupRegistry, HttpPool, PoolConfig};

// =============================================================================
// CLI Arguments
// =============================================================================

/// peercache - Distributed read-through cache node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL other nodes use to reach this node
    #[arg(long, env = "PEERCACHE_SELF_URL", default_value = "http://127.0.0.1:8001")]
    self_url: String,

    /// Peer protocol bind address
    #[arg(long, env = "PEERCACHE_LISTEN", default_value = "127.0.0.1:8001")]
    listen: String,

    /// All node URLs in the cluster, including this one (comma separated)
    #[arg(long, env = "PEERCACHE_PEERS", value_delimiter = ',')]
    peers: Vec<String>,

    /// URL prefix of the peer protocol
    #[arg(long, env = "PEERCACHE_BASE_PATH", default_value = peercache::peer::DEFAULT_BASE_PATH)]
    base_path: String,

    /// Virtual nodes per peer
    #[arg(long, env = "PEERCACHE_REPLICAS", default_value_t = peercache::peer::DEFAULT_REPLICAS)]
    replicas: usize,

    /// Name of the served group
    #[arg(long, env = "PEERCACHE_GROUP", default_value = "scores")]
    group: String,

    /// Byte budget of the group's local cache
    #[arg(long, env = "PEERCACHE_CACHE_BYTES", default_value = "2048")]
    cache_bytes: u64,

    /// JSON object file used as the source of truth
    #[arg(long, env = "PEERCACHE_DATA")]
    data: Option<PathBuf>,

    /// Peer request timeout in seconds
    #[arg(long, env = "PEERCACHE_PEER_TIMEOUT_SECS", default_value = "30")]
    peer_timeout_secs: u64,

    /// Admin server bind address (health and metrics)
    #[arg(long, env = "PEERCACHE_ADMIN_ADDR", default_value = "127.0.0.1:9090")]
    admin_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    info!("Starting peercache node");
    info!("  Self URL: {}", args.self_url);
    info!("  Group: {} ({} bytes)", args.group, args.cache_bytes);
    info!("  Peers: {:?}", args.peers);

    let data = load_data(args.data.as_deref())?;
    info!("Loaded {} records", data.len());

    let registry = GroupRegistry::global();
    let group = registry.new_group(
        args.group.clone(),
        args.cache_bytes,
        GetterFn(move |key: &str| -> anyhow::Result<Vec<u8>> {
            debug!(key, "slow source lookup");
            data.get(key)
                .map(|value| value.clone().into_bytes())
                .ok_or_else(|| anyhow::anyhow!("{} not exist", key))
        }),
    )?;

    let pool_config = PoolConfig {
        base_path: args.base_path.clone(),
        replicas: args.replicas,
        request_timeout: Duration::from_secs(args.peer_timeout_secs),
    };
    let pool = Arc::new(HttpPool::with_config(
        args.self_url.clone(),
        pool_config,
        Arc::clone(&registry),
    )?);

    if args.peers.is_empty() {
        pool.set([args.self_url.clone()]);
    } else {
        pool.set(args.peers.iter().cloned());
    }
    group.register_peers(pool.clone())?;

    // Start admin server
    let admin_addr = args.admin_addr.clone();
    let admin_registry = Arc::clone(&registry);
    tokio::spawn(async move {
        if let Err(e) = run_admin_server(&admin_addr, admin_registry).await {
            error!("Admin server error: {}", e);
        }
    });

    // Run the peer server
    let listener = tokio::net::TcpListener::bind(&args.listen).await.map_err(|e| {
        error!("Failed to bind peer server on {}: {}", args.listen, e);
        Error::Io(e)
    })?;

    tokio::select! {
        result = pool.serve(listener) => result?,
        _ = tokio::signal::ctrl_c() => info!("Received shutdown signal"),
    }

    info!("Node shutdown complete");
    Ok(())
}

// =============================================================================
// Source of Truth
// =============================================================================

fn load_data(path: Option<&std::path::Path>) -> Result<HashMap<String, String>> {
    let Some(path) = path else {
        return Ok(HashMap::from([
            ("Tom".to_string(), "630".to_string()),
            ("Jack".to_string(), "589".to_string()),
            ("Sam".to_string(), "567".to_string()),
        ]));
    };

    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::Config(format!("Invalid data file {}: {}", path.display(), e)))
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Admin Server
// =============================================================================

async fn run_admin_server(addr: &str, registry: Arc<GroupRegistry>) -> Result<()> {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::header::{HeaderValue, CONTENT_TYPE};
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    fn plain(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
        *response.status_mut() = status;
        response
    }

    async fn admin_handler(
        req: Request<hyper::body::Incoming>,
        registry: Arc<GroupRegistry>,
    ) -> std::result::Result<Response<Full<Bytes>>, std::convert::Infallible> {
        let response = match req.uri().path() {
            "/healthz" | "/livez" | "/readyz" => plain(StatusCode::OK, "ok"),
            "/metrics" => match peercache::monitoring::encode_metrics(&registry) {
                Ok((content_type, buffer)) => {
                    let mut response = Response::new(Full::new(Bytes::from(buffer)));
                    if let Ok(value) = HeaderValue::from_str(&content_type) {
                        response.headers_mut().insert(CONTENT_TYPE, value);
                    }
                    response
                }
                Err(e) => {
                    error!("Failed to encode metrics: {}", e);
                    plain(StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable")
                }
            },
            _ => plain(StatusCode::NOT_FOUND, "not found"),
        };
        Ok(response)
    }

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("Invalid admin server address: {}", e)))?;

    let listener = TcpListener::bind(addr).await?;

    info!("Admin server listening on {}", addr);

    loop {
        let (stream, _) = listener.accept().await?;

        let io = TokioIo::new(stream);
        let registry = Arc::clone(&registry);

        tokio::spawn(async move {
            let service = service_fn(move |req| admin_handler(req, Arc::clone(&registry)));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::error!("Admin server connection error: {}", e);
            }
        });
    }
}
