//! crosstalk — mirrors conversation and presence from an origin chat
//! platform into a relay platform.
//!
//! Session management lives outside this process: the host session decodes
//! origin push events and pipes them in as one JSON object per stdin line.
//! SIGHUP resets the webhook registry (credential rotation); ctrl-c exits.

use {
    anyhow::{Context, Result},
    clap::Parser,
    secrecy::Secret,
    std::{
        path::{Path, PathBuf},
        sync::Arc,
    },
    tokio::{io::AsyncBufReadExt, signal, sync::mpsc},
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    crosstalk_gateway::{Bridge, ControlCommand},
    crosstalk_mirror::MessageMirror,
    crosstalk_origin::{HttpOriginClient, OriginApi, OriginEvent},
    crosstalk_presence::PresenceTracker,
    crosstalk_reactions::ReactionSync,
    crosstalk_relay::{HttpRelayClient, RelayTransport},
    crosstalk_routing::{IdentityLinker, RouteStore, StaticRouteTable, UnlinkedIdentity},
};

#[derive(Parser)]
#[command(name = "crosstalk", about = "crosstalk — chat platform mirror bridge")]
struct Cli {
    /// Origin platform bot token.
    #[arg(long, env = "CROSSTALK_ORIGIN_TOKEN", hide_env_values = true)]
    origin_token: String,

    /// Relay platform bot token.
    #[arg(long, env = "CROSSTALK_RELAY_TOKEN", hide_env_values = true)]
    relay_token: String,

    /// Origin platform REST API base URL.
    #[arg(long, env = "CROSSTALK_ORIGIN_API")]
    origin_api: String,

    /// Relay platform REST API base URL.
    #[arg(long, env = "CROSSTALK_RELAY_API")]
    relay_api: String,

    /// The bridge's own origin user id; its events are ignored.
    #[arg(long, env = "CROSSTALK_BOT_USER_ID")]
    bot_user_id: String,

    /// Channel route table (JSON array).
    #[arg(long, env = "CROSSTALK_ROUTES", default_value = "routes.json")]
    routes: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let routes = load_routes(&cli.routes)?;

    let origin: Arc<dyn OriginApi> = Arc::new(HttpOriginClient::new(
        cli.origin_api.clone(),
        Secret::new(cli.origin_token.clone()),
    )?);
    let relay_client = Arc::new(HttpRelayClient::new(
        cli.relay_api.clone(),
        Secret::new(cli.relay_token.clone()),
    )?);
    let webhooks = relay_client.webhooks();
    let relay: Arc<dyn RelayTransport> = relay_client;

    // Identity linking is owned by an external collaborator; without one,
    // display names fall back to origin ids and rewrites stay unauthorized.
    let identity: Arc<dyn IdentityLinker> = Arc::new(UnlinkedIdentity);
    let routes: Arc<dyn RouteStore> = routes;

    let mirror = Arc::new(MessageMirror::new(
        Arc::clone(&origin),
        Arc::clone(&relay),
        Arc::clone(&routes),
        identity,
        &cli.bot_user_id,
    ));
    let presence = Arc::new(PresenceTracker::new(
        Arc::clone(&origin),
        Arc::clone(&relay),
        Arc::clone(&routes),
        &cli.bot_user_id,
    ));
    let reactions = Arc::new(ReactionSync::new(origin, relay, routes));
    let bridge = Bridge::new(mirror, presence, reactions, webhooks);

    let (event_tx, event_rx) = mpsc::channel::<OriginEvent>(256);
    let (control_tx, control_rx) = mpsc::channel::<ControlCommand>(8);

    tokio::spawn(pump_stdin_events(event_tx));
    #[cfg(unix)]
    tokio::spawn(pump_reset_signal(control_tx));
    #[cfg(not(unix))]
    drop(control_tx);

    info!("crosstalk bridge running");
    tokio::select! {
        () = bridge.run(event_rx, control_rx) => info!("event feed closed"),
        result = signal::ctrl_c() => {
            result.context("waiting for ctrl-c")?;
            info!("shutting down");
        },
    }
    Ok(())
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("parsing log filter")?;
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
    Ok(())
}

fn load_routes(path: &Path) -> Result<Arc<StaticRouteTable>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading route table {}", path.display()))?;
    let table = StaticRouteTable::from_json(&json)
        .with_context(|| format!("parsing route table {}", path.display()))?;
    Ok(Arc::new(table))
}

/// Decode origin events from stdin, one JSON object per line.
async fn pump_stdin_events(events: mpsc::Sender<OriginEvent>) {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<OriginEvent>(line) {
                    Ok(event) => {
                        if events.send(event).await.is_err() {
                            break;
                        }
                    },
                    Err(parse_error) => {
                        warn!(error = %parse_error, "undecodable origin event line");
                    },
                }
            },
            Ok(None) => break,
            Err(io_error) => {
                error!(error = %io_error, "reading origin event feed failed");
                break;
            },
        }
    }
    info!("origin event feed ended");
}

/// SIGHUP clears the webhook registry, for relay credential rotation.
#[cfg(unix)]
async fn pump_reset_signal(control: mpsc::Sender<ControlCommand>) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(install_error) => {
            warn!(error = %install_error, "SIGHUP handler unavailable, webhook reset disabled");
            return;
        },
    };
    while hangup.recv().await.is_some() {
        info!("SIGHUP received, resetting webhook cache");
        if control.send(ControlCommand::ResetWebhooks).await.is_err() {
            break;
        }
    }
}
