use crate::commands::common::{normalize_entry_identifier, CommandContext};
use crate::error::CliError;

pub async fn run_delete(ctx: &CommandContext, id: &str) -> Result<(), CliError> {
    let normalized_id = normalize_entry_identifier(id)?;
    let service = ctx.open_service()?;
    let entry_id = service.resolve_id(&normalized_id).await?;

    let deleted = service
        .delete_entry(&ctx.technician.user_id, &entry_id)
        .await?;
    println!("{}", deleted.local_id);
    if deleted.remote_id.is_some() {
        println!("Marked for deletion; the server copy is removed on the next sync.");
    }
    Ok(())
}
