//! Observable wallet state.
//!
//! Every piece of public state lives in a `watch` channel (current value) and
//! each change is also pushed to a `broadcast` channel so subscribers see the
//! transitions in the order they were committed.
//!
//! The broadcast side is bounded: a subscriber more than [`EVENT_CAPACITY`]
//! events behind is told it lagged and loses the oldest ones. The watch side
//! never loses the latest value.

use tokio::sync::{broadcast, watch};

pub const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum WalletEvent {
    AccountsChanged(Vec<String>),
    AddressChanged(Option<String>),
    /// `Some(0.0)` when a KDF starts, `Some(1.0)` when it completes, `None` when idle.
    EncryptingProgress(Option<f32>),
    SigningKeyChanged(bool),
}

pub(crate) struct StateChannels {
    accounts: watch::Sender<Vec<String>>,
    address: watch::Sender<Option<String>>,
    encrypting_progress: watch::Sender<Option<f32>>,
    has_signing_key: watch::Sender<bool>,
    events: broadcast::Sender<WalletEvent>,
}

impl StateChannels {
    pub(crate) fn new(accounts: Vec<String>, address: Option<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            accounts: watch::channel(accounts).0,
            address: watch::channel(address).0,
            encrypting_progress: watch::channel(None).0,
            has_signing_key: watch::channel(false).0,
            events,
        }
    }

    fn emit(&self, event: WalletEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    pub(crate) fn accounts(&self) -> Vec<String> {
        self.accounts.borrow().clone()
    }

    pub(crate) fn address(&self) -> Option<String> {
        self.address.borrow().clone()
    }

    pub(crate) fn encrypting_progress(&self) -> Option<f32> {
        *self.encrypting_progress.borrow()
    }

    pub(crate) fn has_signing_key(&self) -> bool {
        *self.has_signing_key.borrow()
    }

    pub(crate) fn set_accounts(&self, accounts: Vec<String>) {
        self.accounts.send_replace(accounts.clone());
        self.emit(WalletEvent::AccountsChanged(accounts));
    }

    pub(crate) fn set_address(&self, address: Option<String>) {
        if *self.address.borrow() == address {
            return;
        }
        self.address.send_replace(address.clone());
        self.emit(WalletEvent::AddressChanged(address));
    }

    pub(crate) fn set_progress(&self, progress: Option<f32>) {
        self.encrypting_progress.send_replace(progress);
        self.emit(WalletEvent::EncryptingProgress(progress));
    }

    pub(crate) fn set_has_signing_key(&self, value: bool) {
        self.has_signing_key.send_replace(value);
        self.emit(WalletEvent::SigningKeyChanged(value));
    }

    pub(crate) fn watch_accounts(&self) -> watch::Receiver<Vec<String>> {
        self.accounts.subscribe()
    }

    pub(crate) fn watch_address(&self) -> watch::Receiver<Option<String>> {
        self.address.subscribe()
    }

    pub(crate) fn watch_encrypting_progress(&self) -> watch::Receiver<Option<f32>> {
        self.encrypting_progress.subscribe()
    }

    pub(crate) fn watch_has_signing_key(&self) -> watch::Receiver<bool> {
        self.has_signing_key.subscribe()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}
