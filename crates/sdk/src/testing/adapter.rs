use std::{
    collections::{BTreeMap, VecDeque},
    sync::Mutex,
};

use async_trait::async_trait;
use futures::{
    StreamExt,
    channel::{
        mpsc::{self, UnboundedReceiver, UnboundedSender},
        oneshot,
    },
    stream::BoxStream,
};

use crate::{
    adapter::{AdapterEvent, PairingResponse, WalletAdapter},
    error::AdapterError,
    types::{Address, WalletFamily},
};

type PairingResult = Result<PairingResponse, AdapterError>;

enum Script {
    Ready(PairingResult),
    Deferred(oneshot::Receiver<PairingResult>),
}

/// Wallet extension whose answers are scripted by the test.
///
/// Pairing prompts are answered from a queue in request order. A prompt
/// with nothing queued stays open forever, as if the user walked away.
pub struct ScriptedAdapter {
    pairings: Mutex<VecDeque<Script>>,
    paired: Mutex<BTreeMap<WalletFamily, Result<Vec<Address>, AdapterError>>>,
    disconnected: Mutex<Vec<(WalletFamily, Address)>>,
    events_tx: UnboundedSender<AdapterEvent>,
    events_rx: Mutex<Option<UnboundedReceiver<AdapterEvent>>>,
}

impl Default for ScriptedAdapter {
    fn default() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded();
        Self {
            pairings: Mutex::default(),
            paired: Mutex::default(),
            disconnected: Mutex::default(),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }
}

impl ScriptedAdapter {
    /// Answers the next pairing prompt with `result`.
    pub fn push_pairing(&self, result: PairingResult) {
        self.pairings.lock().unwrap().push_back(Script::Ready(result));
    }

    /// Shorthand for approving the next prompt with one account.
    pub fn approve_next(&self, address: impl Into<Address>) {
        self.push_pairing(Ok(PairingResponse::Paired(vec![address.into()])));
    }

    /// Answers the next pairing prompt with whatever is later sent through
    /// the returned handle. Dropping the handle leaves the prompt open.
    pub fn defer_pairing(&self) -> oneshot::Sender<PairingResult> {
        let (tx, rx) = oneshot::channel();
        self.pairings.lock().unwrap().push_back(Script::Deferred(rx));
        tx
    }

    /// Sets the accounts reported as paired for `family`.
    pub fn set_paired(&self, family: WalletFamily, addresses: Vec<Address>) {
        self.paired.lock().unwrap().insert(family, Ok(addresses));
    }

    /// Makes paired-account queries for `family` fail.
    pub fn fail_paired(&self, family: WalletFamily, err: AdapterError) {
        self.paired.lock().unwrap().insert(family, Err(err));
    }

    /// Sends an unsolicited notification to the subscriber.
    pub fn emit(&self, event: AdapterEvent) { let _ = self.events_tx.unbounded_send(event); }

    /// Accounts unpaired through [`WalletAdapter::disconnect`], in call order.
    pub fn disconnected(&self) -> Vec<(WalletFamily, Address)> { self.disconnected.lock().unwrap().clone() }
}

#[async_trait]
impl WalletAdapter for ScriptedAdapter {
    async fn paired_addresses(&self, family: WalletFamily) -> Result<Vec<Address>, AdapterError> {
        self.paired
            .lock()
            .unwrap()
            .get(&family)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn request_pairing(&self, _family: WalletFamily) -> PairingResult {
        let script = self.pairings.lock().unwrap().pop_front();
        match script {
            Some(Script::Ready(result)) => result,
            Some(Script::Deferred(rx)) => match rx.await {
                Ok(result) => result,
                Err(_) => futures::future::pending().await,
            },
            None => futures::future::pending().await,
        }
    }

    async fn disconnect(&self, family: WalletFamily, address: &Address) -> Result<(), AdapterError> {
        if let Some(Ok(addresses)) = self.paired.lock().unwrap().get_mut(&family) {
            addresses.retain(|a| a != address);
        }
        self.disconnected.lock().unwrap().push((family, address.clone()));
        Ok(())
    }

    /// The notification stream can be taken once; later calls get an empty
    /// stream.
    fn events(&self) -> BoxStream<'static, AdapterEvent> {
        match self.events_rx.lock().unwrap().take() {
            Some(rx) => rx.boxed(),
            None => futures::stream::empty().boxed(),
        }
    }
}
