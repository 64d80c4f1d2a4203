use std::{path::Path, str::FromStr, sync::Arc};

use anyhow::Context;
use colored::Colorize;
use dera_session::{
    Reconciler, ReconcilerBuilder, SessionConfig,
    adapter::{AdapterEvent, PairingResponse},
    error::AdapterError,
    store::JsonFileStore,
    testing::{MemoryDataSource, MemoryDirectory, ScriptedAdapter},
    types::{Address, ConnectOutcome, DisplaySkin, UserId, WalletFamily, WalletId},
};
use fastnum::UD128;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// One line of a simulation script.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum Step {
    /// Accounts the extension reports as paired at startup.
    Paired { family: WalletFamily, addresses: Vec<Address> },
    /// Resolves the session. Implied before the first other step that needs it.
    Start,
    /// Next pairing prompt is approved with `addresses`.
    Approve { addresses: Vec<Address> },
    /// Next pairing prompt is dismissed.
    Dismiss,
    /// Next pairing prompt fails.
    Reject { reason: String },
    Connect {
        family: WalletFamily,
        #[serde(default)]
        skin: Option<DisplaySkin>,
    },
    Reconnect { wallet: String },
    Disconnect { wallet: String },
    Switch { wallet: String },
    Default { wallet: String },
    Skin { wallet: String, skin: DisplaySkin },
    /// Unsolicited pairing notification.
    Pair { family: WalletFamily, address: Address },
    /// Unsolicited unpairing notification.
    Unpair { family: WalletFamily, address: Address },
    /// Balance the data source reports for `address`.
    Balance { address: Address, amount: String },
    Directory { available: bool },
}

impl Step {
    fn needs_session(&self) -> bool {
        !matches!(
            self,
            Step::Paired { .. }
                | Step::Approve { .. }
                | Step::Dismiss
                | Step::Reject { .. }
                | Step::Balance { .. }
                | Step::Directory { .. }
        )
    }
}

/// Parses a JSON-lines script. Blank lines and lines starting with `#` are
/// skipped.
pub(crate) fn parse_script(script: &str) -> anyhow::Result<Vec<Step>> {
    script
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| format!("parsing script line {}", n + 1))
        })
        .collect()
}

struct Simulation {
    reconciler: Reconciler,
    adapter: Arc<ScriptedAdapter>,
    directory: Arc<MemoryDirectory>,
    source: Arc<MemoryDataSource>,
    user: Option<UserId>,
    started: bool,
}

pub(crate) async fn run(
    config: SessionConfig,
    store: JsonFileStore,
    user: Option<UserId>,
    script: &Path,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(script)
        .with_context(|| format!("reading script {}", script.display()))?;
    let steps = parse_script(&text)?;

    let adapter = Arc::new(ScriptedAdapter::default());
    let directory = Arc::new(MemoryDirectory::default());
    let source = Arc::new(MemoryDataSource::default());
    let mut builder =
        ReconcilerBuilder::new(config, Arc::new(store), directory.clone(), source.clone());
    for family in WalletFamily::ALL {
        builder = builder.with_adapter(family, adapter.clone());
    }
    let (reconciler, background) = builder.build();
    let background = tokio::spawn(background.run());

    let mut sim = Simulation { reconciler, adapter, directory, source, user, started: false };
    for (n, step) in steps.into_iter().enumerate() {
        if cancellation_token.is_cancelled() {
            println!("{}", "Interrupted".yellow());
            break;
        }
        let label = format!("{:>3}", n + 1).dimmed();
        let result = tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => {
                println!("{} {}", label, "Interrupted".yellow());
                break;
            },
            result = sim.apply(step.clone()) => result,
        };
        match result {
            Ok(message) => println!("{} {:<10} {}", label, op_name(&step), message),
            Err(err) => println!("{} {:<10} {}", label, op_name(&step), format!("{:#}", err).red()),
        }
    }

    let session = sim.reconciler.snapshot();
    let cache = sim.reconciler.cache().clone();
    drop(sim.reconciler);
    background.await.context("waiting for background workers")?;

    println!("\n{}\n", format!("{:#^96}", " Wallet Session ").bold().purple());
    print!("{}", session);
    for wallet in session.wallets() {
        if let Some(data) = cache.data(wallet.address()) {
            println!("\n{} {}", "Wallet".bold(), wallet.address());
            print!("{}", data);
        }
    }
    Ok(())
}

impl Simulation {
    async fn apply(&mut self, step: Step) -> anyhow::Result<String> {
        if step.needs_session() && !self.started {
            self.start().await;
        }

        let message = match step {
            Step::Paired { family, addresses } => {
                let count = addresses.len();
                self.adapter.set_paired(family, addresses);
                format!("{} reports {} paired account(s)", family, count)
            },
            Step::Start => {
                if self.started {
                    "already started".to_string()
                } else {
                    let session = self.start().await;
                    format!("resolved {} wallet(s)", session.wallets().len())
                }
            },
            Step::Approve { addresses } => {
                self.adapter.push_pairing(Ok(PairingResponse::Paired(addresses)));
                "next prompt will be approved".to_string()
            },
            Step::Dismiss => {
                self.adapter.push_pairing(Ok(PairingResponse::Cancelled));
                "next prompt will be dismissed".to_string()
            },
            Step::Reject { reason } => {
                self.adapter.push_pairing(Err(AdapterError::Rejected(reason)));
                "next prompt will fail".to_string()
            },
            Step::Connect { family, skin } => describe(self.reconciler.connect(family, skin).await?),
            Step::Reconnect { wallet } => {
                let id = self.wallet_id(&wallet)?;
                describe(self.reconciler.reconnect(&id).await?)
            },
            Step::Disconnect { wallet } => {
                let id = self.wallet_id(&wallet)?;
                self.reconciler.disconnect(&id).await?;
                format!("{:#} removed", id)
            },
            Step::Switch { wallet } => {
                let id = self.wallet_id(&wallet)?;
                self.reconciler.switch_active(&id).await?;
                format!("{:#} is active", id)
            },
            Step::Default { wallet } => {
                let id = self.wallet_id(&wallet)?;
                self.reconciler.set_default(&id).await?;
                format!("{:#} is default", id)
            },
            Step::Skin { wallet, skin } => {
                let id = self.wallet_id(&wallet)?;
                self.reconciler.update_skin(&id, skin).await?;
                format!("{:#} uses {}", id, skin)
            },
            Step::Pair { family, address } => {
                self.reconciler.handle_event(AdapterEvent::Paired { family, address: address.clone() }).await;
                format!("{} paired {}", family, address)
            },
            Step::Unpair { family, address } => {
                self.reconciler
                    .handle_event(AdapterEvent::Unpaired { family, address: address.clone() })
                    .await;
                format!("{} unpaired {}", family, address)
            },
            Step::Balance { address, amount } => {
                let balance = <UD128 as FromStr>::from_str(&amount)
                    .map_err(|err| anyhow::anyhow!("invalid amount {:?}: {}", amount, err))?;
                self.source.set_balance(&address, balance);
                format!("{} holds {}", address, balance)
            },
            Step::Directory { available } => {
                self.directory.set_available(available);
                let state = if available { "online" } else { "offline" };
                format!("directory {}", state)
            },
        };
        Ok(message)
    }

    async fn start(&mut self) -> dera_session::SessionState {
        self.started = true;
        self.reconciler.start(self.user.clone()).await
    }

    /// Resolves a wallet given by address or by ID.
    fn wallet_id(&self, wallet: &str) -> anyhow::Result<WalletId> {
        let session = self.reconciler.snapshot();
        let address = Address::from_str(wallet)?;
        if let Some(record) = session.wallet_by_address(&address) {
            return Ok(record.id().clone());
        }
        match WalletId::from_str(wallet) {
            Ok(id) if session.wallet(&id).is_some() => Ok(id),
            _ => Err(anyhow::anyhow!("no wallet {} in session", wallet)),
        }
    }
}

fn describe(outcome: ConnectOutcome) -> String {
    let text = outcome.to_string();
    match outcome {
        ConnectOutcome::Connected(_) => text.green().to_string(),
        ConnectOutcome::AlreadyConnected(_) | ConnectOutcome::Cancelled | ConnectOutcome::Superseded => {
            text.yellow().to_string()
        },
        ConnectOutcome::Failed(_) => text.red().to_string(),
    }
}

fn op_name(step: &Step) -> &'static str {
    match step {
        Step::Paired { .. } => "paired",
        Step::Start => "start",
        Step::Approve { .. } => "approve",
        Step::Dismiss => "dismiss",
        Step::Reject { .. } => "reject",
        Step::Connect { .. } => "connect",
        Step::Reconnect { .. } => "reconnect",
        Step::Disconnect { .. } => "disconnect",
        Step::Switch { .. } => "switch",
        Step::Default { .. } => "default",
        Step::Skin { .. } => "skin",
        Step::Pair { .. } => "pair",
        Step::Unpair { .. } => "unpair",
        Step::Balance { .. } => "balance",
        Step::Directory { .. } => "directory",
    }
}
