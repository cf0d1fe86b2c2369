//! Presence terminal - Main entry point

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use presence_core::{Clock, CodeEngine, Secret, SystemClock, VerificationResult};
use presence_terminal::display::{code_line, qr_code_unicode};
use presence_terminal::{RefreshTicker, SecretClient, TerminalConfig, TerminalSession};

/// Environment variable holding the administrator's identity token
const TOKEN_ENV: &str = "PRESENCE_TOKEN";

#[derive(Parser, Debug)]
#[command(name = "presence-terminal")]
#[command(about = "Show rotating attendance codes at the entrance")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $PRESENCE_TERMINAL_CONFIG or the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch the scope secret and keep the current code on screen
    Show {
        /// Identity token (defaults to $PRESENCE_TOKEN)
        #[arg(long)]
        token: Option<String>,

        /// Server base URL, overriding the config file
        #[arg(long)]
        server: Option<String>,

        /// Print only the digits, without the QR code
        #[arg(long)]
        no_qr: bool,
    },

    /// Print the current code for a base32 secret
    Code {
        #[arg(long)]
        secret: String,
    },

    /// Check a code against a base32 secret
    Verify {
        #[arg(long)]
        secret: String,

        #[arg(long)]
        code: String,

        /// Steps of clock drift tolerated on either side
        #[arg(long)]
        drift: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "presence_terminal=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(TerminalConfig::default_path);
    let config = TerminalConfig::load_or_create(&config_path)?;
    let engine = CodeEngine::new(config.engine.clone())?;

    match cli.command {
        Commands::Show {
            token,
            server,
            no_qr,
        } => {
            let token = match token {
                Some(token) => token,
                None => std::env::var(TOKEN_ENV)
                    .with_context(|| format!("no --token given and ${} is not set", TOKEN_ENV))?,
            };
            show(config, engine, token, server, no_qr).await
        }
        Commands::Code { secret } => {
            let secret = Secret::from_base32(&secret)?;
            let now = SystemClock.now_unix();
            println!("{}", code_line(&engine.generate(&secret, now), now));
            Ok(())
        }
        Commands::Verify {
            secret,
            code,
            drift,
        } => {
            let secret = Secret::from_base32(&secret)?;
            let drift = drift.unwrap_or(engine.config().drift_steps);
            match engine.verify(&secret, &code, SystemClock.now_unix(), drift)? {
                VerificationResult::Accepted { step_offset } => {
                    println!("accepted (step offset {})", step_offset);
                }
                VerificationResult::Rejected => {
                    println!("rejected");
                    std::process::exit(1);
                }
            }
            Ok(())
        }
    }
}

async fn show(
    config: TerminalConfig,
    engine: CodeEngine,
    token: String,
    server: Option<String>,
    no_qr: bool,
) -> anyhow::Result<()> {
    let server_url = server.unwrap_or_else(|| config.server_url.clone());
    let client = SecretClient::with_settings(
        &server_url,
        config.request_timeout(),
        config.retry_backoff(),
    )?;
    info!("Using server {}", client.base_url());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ticker = RefreshTicker::new(engine, Arc::clone(&clock), config.refresh_policy());
    let mut session = TerminalSession::new(Arc::new(client), token, ticker);

    let mut codes = session.show_codes().await?;

    loop {
        let current = codes.borrow_and_update().clone();
        println!("{}", code_line(&current, clock.now_unix()));
        if !no_qr {
            println!("{}", qr_code_unicode(&current));
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            changed = codes.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    session.sign_out();
    Ok(())
}
