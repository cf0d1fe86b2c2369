//! Presence server - Main entry point
//!
//! Serves the secret provisioning and code verification API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use presence_core::{Clock, CodeEngine, Role, ScopeId, SystemClock};
use presence_server::auth::{Identity, SignedTokenVerifier};
use presence_server::http::{self, AppState};
use presence_server::{AttendanceVerifier, FileSecretStore, SecretProvisioner, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "presence-server")]
#[command(about = "Attendance code provisioning and verification server")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $PRESENCE_SERVER_CONFIG or the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to bind to, overriding the config file
        #[arg(long)]
        bind: Option<String>,
    },

    /// Mint a signed identity token
    IssueToken {
        /// Stable user identifier
        #[arg(long)]
        subject: String,

        /// Organization the user belongs to
        #[arg(long)]
        scope: ScopeId,

        /// employee or admin
        #[arg(long, default_value = "employee")]
        role: Role,

        /// Token lifetime in seconds, overriding the config file
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "presence_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(ServerConfig::default_path);
    let config = ServerConfig::load_or_create(&config_path)?;
    config.ensure_directories()?;

    let tokens = Arc::new(SignedTokenVerifier::new(config.load_or_create_token_key()?));

    match cli.command {
        Commands::Serve { bind } => serve(config, bind, tokens).await,
        Commands::IssueToken {
            subject,
            scope,
            role,
            ttl_secs,
        } => {
            let ttl = ttl_secs.unwrap_or(config.token_ttl_secs);
            let identity = Identity {
                subject,
                scope,
                role,
                expires_at: SystemClock.now_unix().saturating_add(ttl),
            };
            println!("{}", tokens.issue(&identity)?);
            Ok(())
        }
    }
}

async fn serve(
    config: ServerConfig,
    bind: Option<String>,
    tokens: Arc<SignedTokenVerifier>,
) -> anyhow::Result<()> {
    info!("Starting Presence server v{}", env!("CARGO_PKG_VERSION"));

    let engine = CodeEngine::new(config.engine.clone())?;
    info!(
        digits = config.engine.digits,
        step_seconds = config.engine.step_seconds,
        drift_steps = config.engine.drift_steps,
        algorithm = %config.engine.algorithm,
        "Code engine configured"
    );

    let store = Arc::new(FileSecretStore::new(config.secret_store_path.clone())?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let state = AppState {
        provisioner: Arc::new(SecretProvisioner::new(
            tokens.clone(),
            store.clone(),
            Arc::clone(&clock),
        )),
        verifier: Arc::new(AttendanceVerifier::new(
            tokens,
            store,
            engine,
            clock,
            config.lockout.clone(),
        )),
    };

    let addr = bind.unwrap_or(config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server = tokio::spawn(http::serve(listener, state));

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server => {
            match result {
                Ok(Err(e)) => error!("HTTP server error: {}", e),
                Err(e) => error!("HTTP server task failed: {}", e),
                Ok(Ok(())) => error!("HTTP server exited unexpectedly"),
            }
        }
    }

    info!("Server shutting down");

    Ok(())
}
