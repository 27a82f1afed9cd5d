//! text2data command-line entry point.

use std::sync::Arc;

use text2data::cli::{Cli, Command, InvokeArgs};
use text2data::config::Config;
use text2data::db::DriverConnector;
use text2data::error::{BridgeError, Result};
use text2data::logging;
use text2data::remote::{HttpRemoteClient, RemoteConfig, RemoteService};
use text2data::secrets::{mask_secret, TokenStore};
use text2data::tool::Text2DataTool;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse_args();

    let logs_to_stderr = match &cli.log_file {
        Some(path) => {
            let path = path.clone().unwrap_or_else(logging::default_log_path);
            logging::init_file_logging(&path);
            false
        }
        None => {
            logging::init_stderr_logging();
            true
        }
    };

    if let Err(e) = run(cli) {
        if !logs_to_stderr {
            error!("{}: {}", e.category(), e);
        }
        eprintln!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let store = TokenStore::new();
    let remote = config.resolve_remote(
        &cli.remote_overrides(),
        |key| std::env::var(key).ok(),
        |base_url| store.retrieve(base_url),
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| BridgeError::internal(format!("Failed to start async runtime: {e}")))?;

    match cli.command {
        Command::Verify { save } => runtime.block_on(verify(remote, save, &store)),
        Command::Invoke(args) => runtime.block_on(invoke(remote, &config, &args)),
        Command::Logout => logout(&remote, &store),
    }
}

async fn verify(remote: RemoteConfig, save: bool, store: &TokenStore) -> Result<()> {
    let client = HttpRemoteClient::new(remote)?;
    client.verify().await?;

    let config = client.config();
    info!("Access token verified against {}", config.base_url);
    println!("Access token is valid.");

    if save {
        store.store(&config.base_url, &config.access_token)?;
        info!(
            "Stored access token {} for {}",
            mask_secret(config.access_token.expose()),
            config.base_url
        );
    }
    Ok(())
}

async fn invoke(remote: RemoteConfig, config: &Config, args: &InvokeArgs) -> Result<()> {
    if remote.base_url.is_empty() {
        return Err(BridgeError::config(
            "Remote base URL is not configured. Use --base-url or TEXT2DATA_BASE_URL.",
        ));
    }
    if remote.access_token.is_empty() {
        return Err(BridgeError::config(
            "Remote access token is not configured. Use --access-token, TEXT2DATA_ACCESS_TOKEN, or `verify --save`.",
        ));
    }

    let request = args.to_request()?;
    let tool = Text2DataTool::new(
        Arc::new(HttpRemoteClient::new(remote)?),
        Arc::new(DriverConnector::new(config.timeouts.connect())),
        config.timeouts.query(),
    );

    for message in tool.invoke(request).await? {
        let line = serde_json::to_string(&message)
            .map_err(|e| BridgeError::internal(format!("Failed to encode message: {e}")))?;
        println!("{line}");
    }
    Ok(())
}

fn logout(remote: &RemoteConfig, store: &TokenStore) -> Result<()> {
    if remote.base_url.is_empty() {
        return Err(BridgeError::config(
            "Remote base URL is not configured. Use --base-url or TEXT2DATA_BASE_URL.",
        ));
    }
    store.delete(&remote.base_url)?;
    println!("Removed stored access token for {}.", remote.base_url);
    Ok(())
}
