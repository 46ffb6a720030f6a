// ABOUTME: Entry point for the configserver binary.
// ABOUTME: Loads .env and config, materializes the keystore, then starts the HTTP(S) server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use configserver_core::{MaterializeOutcome, SecretSource};
use configserver_server::{
    AppState, Credentials, ServerConfig, create_router, load_keystore, resolve_keystore, serve,
};

#[derive(Parser)]
#[command(
    name = "configserver",
    version,
    about = "Configuration server with an environment-provisioned TLS keystore"
)]
struct Cli {
    /// Read environment variables from this file instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Materialize the keystore and serve configuration (default)
    Serve,
    /// Materialize the keystore and exit
    Materialize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("failed to load env file {}", path.display()))?;
        }
        None => match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e).context("failed to load .env"),
        },
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "configserver=info,tower_http=info".into()),
        )
        .init();

    match cli.command.unwrap_or(Command::Serve) {
        // Only the keystore variables matter to an init container.
        Command::Materialize => {
            materialize(SecretSource::from_env())?;
            Ok(())
        }
        Command::Serve => {
            let config = ServerConfig::from_env().context("invalid configuration")?;
            run(config).await
        }
    }
}

fn materialize(source: SecretSource) -> anyhow::Result<MaterializeOutcome> {
    source
        .materialize()
        .context("keystore materialization failed; refusing to start")
}

async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let ServerConfig {
        bind,
        username,
        password,
        password_generated,
        config_dir,
        app_name,
        tls_keystore,
        keystore,
    } = config;

    tracing::info!("configserver starting up");

    // Must complete before anything reads the keystore.
    let outcome = materialize(keystore)?;

    let tls = resolve_keystore(&outcome, tls_keystore.as_deref())
        .map(|path| load_keystore(&path))
        .transpose()
        .context("TLS initialization failed; refusing to start")?;

    if password_generated {
        tracing::warn!("using generated security password: {}", password);
    }
    tracing::info!(dir = %config_dir.display(), "serving property sources");

    let state = Arc::new(AppState::new(config_dir, app_name, tls.is_some()));
    let router = create_router(state, Credentials::new(username, password));

    serve(bind, router, tls).await.context("server failed")?;

    tracing::info!("configserver stopped");
    Ok(())
}
