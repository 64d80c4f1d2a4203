use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dera_session::types::UserId;

pub(crate) const DEFAULT_SESSION_FILE: &str = "session.json";

#[derive(Parser, Debug)]
#[command(name = "dera-cli", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Session file to read and write
    #[arg(long, global = true, default_value = DEFAULT_SESSION_FILE)]
    pub session_file: PathBuf,

    /// Known user identity, used to recover wallets from the directory when
    /// the session file is empty
    #[arg(long, global = true)]
    pub user: Option<UserId>,

    /// Ceiling for a single connect/reconnect attempt [default: 120]
    #[arg(long, global = true)]
    pub pairing_timeout_secs: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the stored session
    Show {
        /// Print the raw JSON document instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Replay a JSON-lines script of wallet signals and user intents against
    /// the stored session
    Simulate {
        /// Script file, one step per line (`#` starts a comment line)
        script: PathBuf,
    },
}
