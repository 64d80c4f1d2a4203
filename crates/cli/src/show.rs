use anyhow::Context;
use colored::Colorize;
use dera_session::{
    SessionState,
    store::{JsonFileStore, SessionStore},
};

pub(crate) fn render(store: &JsonFileStore, json: bool) -> anyhow::Result<()> {
    let Some(persisted) = store.load() else {
        println!("{}", format!("No session stored at {}", store.path().display()).dimmed());
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&persisted).context("encoding session")?);
        return Ok(());
    }

    let session = SessionState::from_persisted(persisted);
    println!("{}\n", format!("{:#^96}", " Wallet Session ").bold().purple());
    if let Some(user_id) = session.user_id() {
        println!("User: {}", user_id);
    }
    print!("{}", session);
    Ok(())
}
