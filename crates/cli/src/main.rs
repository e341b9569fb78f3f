use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use loxsi_api::{parse_freeze_time, Action, ActionDispatcher, HttpControl, SourceScope};
use loxsi_core::Feed;
use loxsi_feed::{parse_base_url, spawn_dashboard, FeedConfig};
use tokio::signal;
use tracing::{error, info, warn};

mod render;

#[derive(Parser, Debug)]
#[command(
    name = "loxsictl",
    version,
    about = "Loxsi dashboard client",
    after_help = "Admin actions (use, message, freeze, refresh) are sent without credentials; \
                  a server that guards its admin routes answers 401."
)]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Server base URL
    #[arg(long = "url", global = true, env = "LOXSI_URL")]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Scope { Generic, Lap, Position }

impl From<Scope> for SourceScope {
    fn from(s: Scope) -> Self {
        match s {
            Scope::Generic => SourceScope::Generic,
            Scope::Lap => SourceScope::Lap,
            Scope::Position => SourceScope::Position,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Follow the public dashboard (counts, message, frozen)
    Watch,
    /// Follow the admin panel (health, sources, connections, freeze)
    Admin,
    /// Follow both feeds
    Both,
    /// Make a source active
    Use {
        #[arg(allow_negative_numbers = true)]
        id: i64,
        #[arg(long = "scope", value_enum, default_value_t = Scope::Generic)]
        scope: Scope,
    },
    /// Set or clear the status message
    Message {
        #[command(subcommand)]
        op: MessageOp,
    },
    /// Set or clear the freeze time
    Freeze {
        #[command(subcommand)]
        op: FreezeOp,
    },
    /// Ask every connected dashboard to refresh
    Refresh,
}

#[derive(Subcommand, Debug)]
enum MessageOp {
    Set { text: String },
    Clear,
}

#[derive(Subcommand, Debug)]
enum FreezeOp {
    /// Epoch milliseconds or local YYYY-MM-DDTHH:MM
    Set { time: String },
    Clear,
}

fn init_tracing() {
    let env = std::env::var("LOXSI_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("LOXSI_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid LOXSI_METRICS_ADDR; expected host:port");
        }
    }
}

async fn follow(cfg: FeedConfig, feeds: &[Feed], output: Output) -> Result<()> {
    info!(url = %cfg.base_url, feeds = ?feeds, "following feeds");
    let dash = spawn_dashboard(&cfg, feeds)?;
    let mut epoch = dash.view.subscribe_epoch();
    loop {
        tokio::select! {
            changed = epoch.changed() => {
                if changed.is_err() {
                    warn!("all feeds closed; exiting");
                    break;
                }
                let snap = dash.view.current();
                match output {
                    Output::Human => println!("{}", render::human(&snap, feeds)),
                    Output::Json => println!("{}", serde_json::to_string(&*snap)?),
                }
            }
            _ = signal::ctrl_c() => {
                info!("Ctrl-C received; shutting down");
                break;
            }
        }
    }
    dash.cancel();
    Ok(())
}

async fn act(cfg: &FeedConfig, action: Action, output: Output) -> Result<()> {
    let http = HttpControl::from_env(cfg.base_url.clone())?;
    let dispatcher = ActionDispatcher::new(Arc::new(http));
    match dispatcher.send(&action).await {
        Ok(status) => {
            match output {
                Output::Human => println!("{} ok ({status})", action.name()),
                Output::Json => println!("{}", serde_json::json!({ "action": action, "status": status })),
            }
            Ok(())
        }
        Err(e) => {
            error!(action = action.name(), error = %e, "action failed");
            Err(e).with_context(|| format!("{} failed", action.name()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    let mut cfg = FeedConfig::from_env()?;
    if let Some(url) = cli.url.as_deref() {
        cfg.base_url = parse_base_url(url)?;
    }

    match cli.command {
        Commands::Watch => follow(cfg, &[Feed::Public], cli.output).await,
        Commands::Admin => follow(cfg, &[Feed::Admin], cli.output).await,
        Commands::Both => follow(cfg, &[Feed::Public, Feed::Admin], cli.output).await,
        Commands::Use { id, scope } => act(&cfg, Action::UseSource { scope: scope.into(), id }, cli.output).await,
        Commands::Message { op } => {
            let action = match op {
                MessageOp::Set { text } => Action::SetMessage { message: text },
                MessageOp::Clear => Action::ClearMessage,
            };
            act(&cfg, action, cli.output).await
        }
        Commands::Freeze { op } => {
            let action = match op {
                FreezeOp::Set { time } => Action::SetFreeze { time: parse_freeze_time(&time)? },
                FreezeOp::Clear => Action::ClearFreeze,
            };
            act(&cfg, action, cli.output).await
        }
        Commands::Refresh => act(&cfg, Action::ForceRefresh, cli.output).await,
    }
}
