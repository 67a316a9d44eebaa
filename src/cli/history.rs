use std::io::Write;

use anyhow::Result;

use crate::store::{index::SessionIndex, SessionStore};

use super::output::render_history;

/// Command to process `history`. Prints the total of every recorded day once and exits.
pub async fn print_history(store: impl SessionStore, mut out: impl Write) -> Result<()> {
    let sessions = SessionIndex::from_listing(store.list().await?);
    write!(out, "{}", render_history(&sessions))?;
    out.flush()?;
    Ok(())
}
