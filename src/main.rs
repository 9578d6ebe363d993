use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dirserve::config::parse_flag;
use dirserve::{app, AppState, Config, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "dirserve")]
#[command(about = "Directory-backed file server with handler dispatch and catalogs")]
#[command(version)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "DIRSERVE_PORT", default_value = "8001")]
    port: u16,

    /// Address to bind to
    #[arg(short, long, env = "DIRSERVE_BIND", default_value = "0.0.0.0")]
    bind: String,

    /// Root directory to serve files from (overrides the config file)
    #[arg(short, long, env = "DIRSERVE_ROOT")]
    root: Option<PathBuf>,

    /// Directory with index.html / catalog.xml layout overrides
    #[arg(short, long, env = "DIRSERVE_TEMPLATES")]
    templates: Option<PathBuf>,

    /// Name that triggers the catalog document
    #[arg(long, env = "DIRSERVE_CATALOG")]
    catalog: Option<String>,

    /// Regex for names (or path segments) to hide
    #[arg(long, env = "DIRSERVE_FILTER")]
    filter: Option<String>,

    /// Enforce the filter ("False", "false" and "0" disable it)
    #[arg(long, env = "DIRSERVE_RESTRICT")]
    restrict: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, env = "DIRSERVE_VERBOSE")]
    verbose: bool,

    /// Config file path (optional)
    #[arg(short, long, env = "DIRSERVE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "dirserve=debug,tower_http=debug"
    } else {
        "dirserve=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load config from file if provided, otherwise use defaults
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    if let Some(root) = cli.root {
        config.root = Some(root);
    }
    if let Some(templates) = cli.templates {
        config.templates = Some(templates);
    }
    if let Some(catalog) = cli.catalog {
        config.catalog = catalog;
    }
    if let Some(filter) = cli.filter {
        config.file_filter_regex = Some(filter);
    }
    if let Some(restrict) = cli.restrict {
        config.restrict_with_filter = parse_flag(&restrict);
    }
    if config.root.is_none() {
        config.root = Some(PathBuf::from("."));
    }

    // Fails on a missing or non-directory root: never accept traffic in that state.
    let config = ServerConfig::from_config(config)?;

    info!("Serving files from: {}", config.root.display());
    if config.restrict {
        match &config.filter {
            Some(filter) => info!("Hiding entries matching: {}", filter.as_str()),
            None => info!("Restriction enabled but no filter configured"),
        }
    }

    let state = AppState::new(config);
    if state.handlers.is_empty() {
        info!("No content handlers installed");
    } else {
        info!("{} handled extensions", state.handlers.len());
    }

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = app(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port).parse()?;
    info!("Starting dirserve on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
