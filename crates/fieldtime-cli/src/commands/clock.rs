use fieldtime_core::clock::{ClockAction, ClockState, Transition};

use crate::commands::common::{
    format_clock_time, local_offset, push_after_change, worked_time, CommandContext,
};
use crate::error::CliError;

pub async fn run_clock_action(ctx: &CommandContext, action: ClockAction) -> Result<(), CliError> {
    let service = ctx.open_service()?;
    let transition = service
        .apply(&ctx.technician.user_id, &ctx.technician.name, action)
        .await?;

    println!("{}", describe_transition(&transition, local_offset()));
    push_after_change(ctx, &service, &transition.entry.local_id).await;
    Ok(())
}

/// One line telling the technician what just changed.
pub fn describe_transition(transition: &Transition, offset: chrono::FixedOffset) -> String {
    let entry = &transition.entry;
    let customer = &entry.customer_name;
    match (transition.from, transition.to) {
        (_, ClockState::Driving(_)) => {
            let since = entry
                .drive_start
                .map(|at| format_clock_time(at, offset))
                .unwrap_or_default();
            format!("Driving to {customer} since {since}")
        }
        (ClockState::OnLunch(_), ClockState::ClockedIn(_)) => {
            format!("Lunch ended, back at {customer}")
        }
        (_, ClockState::ClockedIn(_)) => {
            let since = entry
                .clock_in
                .map(|at| format_clock_time(at, offset))
                .unwrap_or_default();
            format!("Clocked in at {customer} since {since}")
        }
        (_, ClockState::OnLunch(_)) => "Lunch started".to_string(),
        (ClockState::Driving(_), ClockState::Idle) => format!("Drive to {customer} ended"),
        (ClockState::OnLunch(_), ClockState::Idle) if entry.clock_in.is_none() => {
            "Lunch ended".to_string()
        }
        (_, ClockState::Idle) => match worked_time(entry) {
            Some(worked) => format!("Clocked out from {customer} after {worked}"),
            None => format!("Clocked out from {customer}"),
        },
    }
}
