//! MCP server for a knowledge-capsule collection.
//!
//! Run with `capsule-mcp --db /path/to/capsules.db` or `capsule-mcp --cache` for in-memory mode.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use capsule_mcp::{McpServer, McpSession, StoreConfig};

/// MCP server for a knowledge-capsule collection.
///
/// Exposes capsule search, capture and statistics as MCP tools for AI agents.
/// Communicates via JSON-RPC 2.0 over stdin/stdout, or over HTTP with --http.
#[derive(Parser)]
#[command(name = "capsule-mcp")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the SQLite capsule database.
    /// Mutually exclusive with --cache.
    #[arg(long, value_name = "PATH", env = "CAPSULE_DB")]
    db: Option<PathBuf>,

    /// Use an in-memory capsule store.
    /// Data is not persisted. Mutually exclusive with --db.
    #[arg(long)]
    cache: bool,

    /// Open the database in read-only mode.
    /// Write operations will be rejected.
    #[arg(long)]
    read_only: bool,

    /// Serve JSON-RPC over HTTP on this address instead of stdio.
    #[arg(long, value_name = "ADDR", env = "CAPSULE_HTTP_ADDR")]
    http: Option<SocketAddr>,

    /// Enable debug logging to stderr.
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Set up logging; stdout is reserved for JSON-RPC
    let default_filter = if args.verbose {
        "capsule_mcp=debug,tower_http=debug"
    } else {
        "capsule_mcp=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Validate arguments
    if args.db.is_some() && args.cache {
        eprintln!("Error: --db and --cache are mutually exclusive");
        std::process::exit(1);
    }

    if args.cache && args.read_only {
        eprintln!("Error: --read-only cannot be used with --cache");
        std::process::exit(1);
    }

    let config = match (args.db, args.cache) {
        (Some(path), false) => StoreConfig::Sqlite {
            path,
            read_only: args.read_only,
        },
        (None, true) => StoreConfig::Memory,
        _ => {
            eprintln!("Error: Must specify either --db <PATH> or --cache");
            std::process::exit(1);
        }
    };
    tracing::debug!(?config, "store configured; opened on first tool call");

    // Create session and server
    let server = McpServer::new(McpSession::new(config));

    // Run the server
    let outcome = match args.http {
        Some(addr) => serve_http(server, addr).await,
        None => server.run().await,
    };

    if let Err(e) = outcome {
        eprintln!("Error: Server error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "http")]
async fn serve_http(server: McpServer, addr: SocketAddr) -> capsule_mcp::Result<()> {
    capsule_mcp::http::serve(std::sync::Arc::new(server), addr).await
}

#[cfg(not(feature = "http"))]
async fn serve_http(_server: McpServer, _addr: SocketAddr) -> capsule_mcp::Result<()> {
    Err(capsule_mcp::McpError::Internal(
        "HTTP transport not enabled; rebuild with --features http".to_string(),
    ))
}
