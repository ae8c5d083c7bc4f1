//! relay — template server, web view and client in one binary.
//!
//! - `relay serve`: line-delimited JSON template server
//! - `relay web`: HTML button page
//! - `relay list | get | render`: send one request and print the reply

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use template_relay::{
    format_response, parse_field_pairs, send_request, ButtonPage, RelayConfig, Request,
    TemplateFormat, TemplateStore, DEFAULT_PORT,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const CONFIG_FILE: &str = "relay.toml";

/// relay — serve, browse and query named text templates.
#[derive(Parser)]
#[command(name = "relay", version, about = "Serve, browse and query named text templates")]
struct Cli {
    /// Path to relay.toml [default: ./relay.toml or ~/.config/template-relay/relay.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Address to listen on (serve, web) or connect to (list, get, render)
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on or connect to
    #[arg(long)]
    port: Option<u16>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the template server
    Serve {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Run the HTML button page
    Web {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// List template titles
    List {
        #[command(flatten)]
        client: ClientArgs,
    },
    /// Get the raw body of a template
    Get {
        /// Template title, e.g. "Eval Scheduled"
        title: String,
        #[command(flatten)]
        client: ClientArgs,
    },
    /// Render a template with fields
    Render {
        /// Template title, e.g. "Eval Scheduled"
        title: String,
        /// Fields like DAY=MON DATE=1/26/26 TIME="4:00 PM"
        fields: Vec<String>,
        #[command(flatten)]
        client: ClientArgs,
    },
}

#[derive(clap::Args)]
struct SourceArgs {
    /// Template source file (overrides config)
    #[arg(short, long)]
    templates: Option<PathBuf>,
    /// Header format of the template source (overrides config)
    #[arg(long, value_enum)]
    format: Option<FormatArg>,
}

#[derive(clap::Args)]
struct ClientArgs {
    /// Connect and read timeout in seconds
    #[arg(long, default_value = "5")]
    timeout_secs: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Plain,
    Marker,
}

impl From<FormatArg> for TemplateFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Plain => TemplateFormat::Plain,
            FormatArg::Marker => TemplateFormat::Marker,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with env filter (RUST_LOG controls verbosity)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { source } => {
            let config = load_config(cli.config, &source)?;
            let host = cli.host.unwrap_or_else(|| config.server.host.clone());
            let port = cli.port.unwrap_or(config.server.port);
            run_serve(config, host, port, shutdown_token()).await?;
        }
        Commands::Web { source } => {
            let config = load_config(cli.config, &source)?;
            let host = cli.host.unwrap_or_else(|| config.web.host.clone());
            let port = cli.port.unwrap_or(config.web.port);
            run_web(config, host, port, shutdown_token()).await?;
        }
        Commands::List { client } => {
            run_request(cli.host, cli.port, Request::ListButtons, client).await?;
        }
        Commands::Get { title, client } => {
            run_request(cli.host, cli.port, Request::GetTemplate { title }, client).await?;
        }
        Commands::Render {
            title,
            fields,
            client,
        } => {
            // Malformed KEY=VALUE fails here, before any connection is made.
            let fields = parse_field_pairs(fields.as_slice())?;
            let request = Request::RenderTemplate { title, fields };
            run_request(cli.host, cli.port, request, client).await?;
        }
    }

    Ok(())
}

/// Root token cancelled by Ctrl-C for graceful shutdown.
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutting down relay...");
        cancel_for_signal.cancel();
    });
    cancel
}

/// Load templates once, then serve requests until cancelled.
///
/// An unreadable template source stops start-up here.
async fn run_serve(
    config: RelayConfig,
    host: String,
    port: u16,
    cancel: CancellationToken,
) -> Result<()> {
    let store = load_store(&config)?;
    let listener = template_relay::bind(&host, port).await?;
    template_relay::serve(listener, Arc::new(store), config.server.limits(), cancel).await?;
    Ok(())
}

/// Serve the HTML button page via axum.
async fn run_web(
    config: RelayConfig,
    host: String,
    port: u16,
    cancel: CancellationToken,
) -> Result<()> {
    let store = load_store(&config)?;
    let page = ButtonPage::from_store(&store, &config.web.fallback_buttons);
    let app = template_relay::web::router(page);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    tracing::info!(host = %host, port = %port, "web view listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| anyhow::anyhow!("web view error: {}", e))?;

    tracing::info!("web view stopped");
    Ok(())
}

/// Send one request and print the reply to stdout.
async fn run_request(
    host: Option<String>,
    port: Option<u16>,
    request: Request,
    client: ClientArgs,
) -> Result<()> {
    let addr = format!(
        "{}:{}",
        host.as_deref().unwrap_or("127.0.0.1"),
        port.unwrap_or(DEFAULT_PORT)
    );
    let response = send_request(&addr, &request, Duration::from_secs(client.timeout_secs)).await?;
    println!("{}", format_response(&response));
    Ok(())
}

fn load_store(config: &RelayConfig) -> Result<TemplateStore> {
    let format = config.templates.header_format()?;
    let store = TemplateStore::load_path(&config.templates.path, &format)?;
    Ok(store)
}

/// Resolve, parse, override and validate the config.
fn load_config(explicit: Option<PathBuf>, source: &SourceArgs) -> Result<RelayConfig> {
    let mut config = match resolve_config(explicit) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "using config file");
            RelayConfig::from_path(&path)?
        }
        None => RelayConfig::default(),
    };

    if let Some(path) = &source.templates {
        config.templates.path = path.clone();
    }
    if let Some(format) = source.format {
        config.templates.format = format.into();
    }

    config.validate()?;
    Ok(config)
}

/// Resolve config file path: explicit flag → ./relay.toml → ~/.config/template-relay/relay.toml.
///
/// No file anywhere means built-in defaults.
fn resolve_config(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if explicit.is_some() {
        return explicit;
    }

    let local = Path::new(CONFIG_FILE);
    if local.exists() {
        return Some(local.to_path_buf());
    }

    dirs::config_dir()
        .map(|dir| dir.join("template-relay").join(CONFIG_FILE))
        .filter(|path| path.exists())
}
