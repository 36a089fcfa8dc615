use serde::Serialize;

use crate::commands::common::{
    entry_to_list_item, local_offset, phase_summary, CommandContext, EntryListItem,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusItem {
    pub profile: String,
    pub user_id: String,
    pub state: String,
    pub active_entry: Option<EntryListItem>,
    pub pending: usize,
}

pub async fn run_status(ctx: &CommandContext, as_json: bool) -> Result<(), CliError> {
    let service = ctx.open_service()?;
    let user_id = &ctx.technician.user_id;
    let state = service.clock_state(user_id).await?;
    let active = service.active_entry(user_id).await?;
    let pending = service.pending_count(user_id).await?;

    if as_json {
        let item = StatusItem {
            profile: ctx.profile_name.clone(),
            user_id: user_id.clone(),
            state: state.label().to_string(),
            active_entry: active.as_ref().map(entry_to_list_item),
            pending,
        };
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    println!("{} ({}): {state}", ctx.technician.name, ctx.profile_name);
    if let Some(entry) = active {
        println!(
            "  {}  {}",
            entry.customer_name,
            phase_summary(&entry, local_offset())
        );
    }
    match pending {
        0 => {}
        1 => println!("1 entry pending sync"),
        count => println!("{count} entries pending sync"),
    }
    Ok(())
}
