//! Multi-wallet session reconciler for browser-extension wallets.
//!
//! # Overview
//!
//! Keeps one canonical view of which wallets a user has connected, which
//! one is active and which one is default, while several sources disagree
//! about it: the local profile store, the remote session directory, the
//! wallet extensions themselves and the user.
//!
//! Use [`reconciler::ReconcilerBuilder`] to assemble a
//! [`reconciler::Reconciler`] from its collaborators, run the returned
//! [`reconciler::Background`] workers on the runtime, then call
//! [`reconciler::Reconciler::start`] once and feed user intents and
//! [`adapter::AdapterEvent`]s to it.
//!
//! Every transition is applied to [`state::SessionState`] under one lock,
//! persisted locally, then mirrored into the directory and followed by a
//! refresh of per-wallet data in [`cache::WalletDataCache`]. Neither the
//! directory nor the data source can block or fail a transition.
//!
//! See `./tests` for examples.
//!
//! # Features
//!
//! | Feature | Default | Description |
//! | --- | --- | --- |
//! | `display` | yes | Enables [`std::fmt::Display`] implementation for state types. |
//! | `testing` | yes | Enables [`testing`] module. |
//!
//! # Testing
//!
//! [`testing`] module provides scripted in-memory collaborators: a wallet
//! extension whose pairing prompts are answered on demand, a directory
//! that can be switched off or made to reject addresses, a store whose
//! writes can fail or stall, and a data source with per-address balances.

pub mod adapter;
pub mod cache;
pub mod config;
pub mod directory;
pub mod error;
pub mod reconciler;
pub mod state;
pub mod store;
#[cfg(feature = "testing")]
pub mod testing;
pub mod types;

pub use config::SessionConfig;
pub use reconciler::{Background, Reconciler, ReconcilerBuilder};
pub use state::{SessionState, WalletRecord};
