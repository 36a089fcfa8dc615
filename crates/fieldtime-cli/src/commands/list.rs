use fieldtime_core::config::RetentionPolicy;
use fieldtime_core::WorkEntry;

use crate::commands::common::{
    entry_to_list_item, format_entry_lines, local_offset, CommandContext, EntryListItem,
};
use crate::error::CliError;

pub async fn run_list(ctx: &CommandContext, all: bool, as_json: bool) -> Result<(), CliError> {
    let service = ctx.open_service()?;
    let user_id = &ctx.technician.user_id;

    let window = if all {
        None
    } else {
        RetentionPolicy::Today.window(service.now().await)
    };
    let entries = match window {
        Some((start, end)) => service.list_window(user_id, start, end).await?,
        None => service.list_for_user(user_id).await?,
    };

    print_entries(&entries, as_json, "No entries today.")
}

pub async fn run_pending(ctx: &CommandContext, as_json: bool) -> Result<(), CliError> {
    let service = ctx.open_service()?;
    let entries = service.pending_for(&ctx.technician.user_id).await?;
    print_entries(&entries, as_json, "Everything is synced.")
}

fn print_entries(entries: &[WorkEntry], as_json: bool, empty_message: &str) -> Result<(), CliError> {
    if as_json {
        let json_items = entries
            .iter()
            .map(entry_to_list_item)
            .collect::<Vec<EntryListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{empty_message}");
        return Ok(());
    }

    for line in format_entry_lines(entries, local_offset()) {
        println!("{line}");
    }
    Ok(())
}
