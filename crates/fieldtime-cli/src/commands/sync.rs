use fieldtime_core::sync::{SyncEngine, SyncError, SyncReport};

use crate::commands::common::CommandContext;
use crate::error::CliError;

pub async fn run_sync(ctx: &CommandContext, watch: bool) -> Result<(), CliError> {
    let token = ctx.require_token()?;
    let engine = SyncEngine::http(ctx.open_service()?, ctx.settings.clone())?;

    if !watch {
        let report = engine
            .run_sync_cycle(&ctx.technician.user_id, token)
            .await?;
        print_report(&report);
        return Ok(());
    }

    run_watch(ctx, &engine, token).await
}

async fn run_watch(ctx: &CommandContext, engine: &SyncEngine, token: &str) -> Result<(), CliError> {
    let period = engine.settings().sync_interval;
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    println!(
        "Syncing every {}s for profile '{}'. Press Ctrl-C to stop.",
        period.as_secs(),
        ctx.profile_name
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                println!("Stopped");
                return Ok(());
            }
        }

        match engine.run_sync_cycle(&ctx.technician.user_id, token).await {
            Ok(report) => print_report(&report),
            Err(error) => {
                if is_fatal_for_watch(&error) {
                    return Err(error.into());
                }
                tracing::warn!("Sync cycle failed: {error}");
                eprintln!("Warning: sync failed, retrying in {}s: {error}", period.as_secs());
            }
        }
    }
}

/// Errors that retrying on the next tick cannot fix.
pub const fn is_fatal_for_watch(error: &SyncError) -> bool {
    matches!(error, SyncError::Auth(_) | SyncError::Config(_))
}

fn print_report(report: &SyncReport) {
    println!("Sync completed: {report}");
    if let Some(advisory) = report.pending_advisory() {
        println!("{advisory}");
    }
}
