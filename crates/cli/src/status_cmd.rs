use std::path::Path;

use anyhow::Result;
use collabsync_types::time;

use crate::config;

pub fn run_status(db: Option<&Path>) -> Result<()> {
    let store = config::open_store(db)?;

    println!("Last sync:");
    let bookkeeping = store.bookkeeping()?;
    if bookkeeping.is_empty() {
        println!("  (never synced)");
    }
    for (key, stamp) in bookkeeping {
        let stamp = stamp.map(time::to_store).unwrap_or_else(|| "never".to_string());
        println!("  {key:<10} {stamp}");
    }

    println!();
    println!("Mirrored locally:");
    let teams = store.teams()?;
    println!("  {} team(s)", teams.len());
    for team in &teams {
        let channels = store.channel_ids_of_team(&team.id)?;
        let messages: usize = channels
            .iter()
            .map(|c| store.channel_message_ids(c).map(|ids| ids.len()))
            .sum::<Result<usize>>()?;
        println!(
            "    {} — {} channel(s), {} message(s)",
            team.display_name,
            channels.len(),
            messages
        );
    }
    let chats = store.chat_ids()?;
    let chat_messages: usize = chats
        .iter()
        .map(|c| store.chat_message_ids(c).map(|ids| ids.len()))
        .sum::<Result<usize>>()?;
    println!("  {} chat(s), {} message(s)", chats.len(), chat_messages);
    println!("  {} event(s)", store.event_ids()?.len());
    println!("  {} known user name(s)", store.directory_entries()?.len());
    Ok(())
}
