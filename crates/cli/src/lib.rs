pub mod args;
mod show;
mod simulate;

use std::time::Duration;

use args::{Cli, Commands};
use dera_session::{SessionConfig, store::JsonFileStore};
use tokio_util::sync::CancellationToken;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let store = JsonFileStore::new(&cli.session_file);

    let mut config = SessionConfig::default();
    if let Some(secs) = cli.pairing_timeout_secs {
        if secs == 0 {
            return Err(anyhow::anyhow!("pairing timeout must be at least one second"));
        }
        config = config.with_pairing_timeout(Duration::from_secs(secs));
    }

    let cancellation_signal = CancellationToken::new();
    let cancellation_token = cancellation_signal.child_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancellation_signal.cancel();
        }
    });

    match &cli.command {
        Commands::Show { json } => show::render(&store, *json)?,
        Commands::Simulate { script } => {
            simulate::run(config, store, cli.user.clone(), script, cancellation_token).await?
        },
    }

    Ok(())
}
