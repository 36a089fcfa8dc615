use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local, Utc};
use fieldtime_core::config::SyncSettings;
use fieldtime_core::models::{format_hours_minutes, SyncStatus};
use fieldtime_core::services::EntryService;
use fieldtime_core::sync::{PushOutcome, SyncEngine};
use fieldtime_core::{EntryId, WorkEntry};
use serde::Serialize;

use crate::config_profiles::{normalize_text_option, CliProfilesConfig, Technician};
use crate::error::CliError;

/// Everything a clocking or sync command needs, resolved from flags, env and profile.
pub struct CommandContext {
    pub db_path: PathBuf,
    pub profile_name: String,
    pub technician: Technician,
    pub settings: SyncSettings,
    pub token: Option<String>,
}

impl CommandContext {
    pub fn load(
        cli_db_path: Option<PathBuf>,
        profile: Option<&str>,
        token: Option<String>,
    ) -> Result<Self, CliError> {
        let config = CliProfilesConfig::load().map_err(CliError::Config)?;
        let profile_name = config.resolve_profile_name(profile);
        let profile = config.profile(&profile_name).cloned().unwrap_or_default();

        let technician = profile
            .technician()
            .ok_or_else(|| CliError::MissingIdentity(profile_name.clone()))?;
        let settings = profile.client.sync_settings()?;

        Ok(Self {
            db_path: resolve_db_path(cli_db_path)?,
            profile_name,
            technician,
            settings,
            token: resolve_token(token),
        })
    }

    pub fn open_service(&self) -> Result<EntryService, CliError> {
        open_service(&self.db_path)
    }

    pub fn require_token(&self) -> Result<&str, CliError> {
        self.token.as_deref().ok_or(CliError::MissingToken)
    }
}

#[derive(Debug, Serialize)]
pub struct EntryListItem {
    pub id: String,
    pub remote_id: Option<String>,
    pub customer_name: String,
    pub technician_name: String,
    pub drive_start: Option<DateTime<Utc>>,
    pub drive_end: Option<DateTime<Utc>>,
    pub clock_in: Option<DateTime<Utc>>,
    pub clock_out: Option<DateTime<Utc>>,
    pub lunch_start: Option<DateTime<Utc>>,
    pub lunch_end: Option<DateTime<Utc>>,
    pub work_minutes: Option<i64>,
    pub status: SyncStatus,
    pub rejection: Option<String>,
}

pub fn entry_to_list_item(entry: &WorkEntry) -> EntryListItem {
    EntryListItem {
        id: entry.local_id.to_string(),
        remote_id: entry.remote_id.clone(),
        customer_name: entry.customer_name.clone(),
        technician_name: entry.technician_name.clone(),
        drive_start: entry.drive_start,
        drive_end: entry.drive_end,
        clock_in: entry.clock_in,
        clock_out: entry.clock_out,
        lunch_start: entry.lunch_start,
        lunch_end: entry.lunch_end,
        work_minutes: entry.work_duration().map(|duration| duration.num_minutes()),
        status: entry.sync_status(),
        rejection: entry
            .sync_rejection
            .as_ref()
            .map(|rejection| rejection.message.clone()),
    }
}

pub fn format_entry_lines(entries: &[WorkEntry], offset: FixedOffset) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let short_id = short_id(&entry.local_id);
            let customer = truncate(&entry.customer_name, 24);
            let day = entry.anchor_time().map_or_else(
                || "----------".to_string(),
                |anchor| anchor.with_timezone(&offset).format("%Y-%m-%d").to_string(),
            );
            let phases = phase_summary(entry, offset);
            let status = entry.sync_status();

            match &entry.sync_rejection {
                Some(rejection) => format!(
                    "{short_id:<13}  {customer:<24}  {day}  {phases:<44}  {status} ({})",
                    rejection.message
                ),
                None => format!("{short_id:<13}  {customer:<24}  {day}  {phases:<44}  {status}"),
            }
        })
        .collect()
}

/// `drive 07:40-08:00  work 08:00-...` style summary of the phases that started.
pub fn phase_summary(entry: &WorkEntry, offset: FixedOffset) -> String {
    let mut parts = Vec::new();
    if let Some(start) = entry.drive_start {
        parts.push(format!("drive {}", format_span(start, entry.drive_end, offset)));
    }
    if let Some(start) = entry.clock_in {
        parts.push(format!("work {}", format_span(start, entry.clock_out, offset)));
    }
    if let Some(start) = entry.lunch_start {
        parts.push(format!("lunch {}", format_span(start, entry.lunch_end, offset)));
    }
    parts.join("  ")
}

pub fn format_span(
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    offset: FixedOffset,
) -> String {
    let end = end.map_or_else(|| "...".to_string(), |end| format_clock_time(end, offset));
    format!("{}-{end}", format_clock_time(start, offset))
}

pub fn format_clock_time(value: DateTime<Utc>, offset: FixedOffset) -> String {
    value.with_timezone(&offset).format("%H:%M").to_string()
}

/// Worked time of a closed session, lunch excluded.
pub fn worked_time(entry: &WorkEntry) -> Option<String> {
    let work = entry.work_duration()?;
    let lunch = entry.lunch_duration().unwrap_or_else(chrono::Duration::zero);
    Some(format_hours_minutes(work - lunch))
}

pub fn short_id(id: &EntryId) -> String {
    id.to_string().chars().take(13).collect()
}

pub fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = value.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn local_offset() -> FixedOffset {
    *Local::now().offset()
}

pub fn normalize_customer(parts: &[String]) -> String {
    parts
        .iter()
        .flat_map(|part| part.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn normalize_entry_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyEntryId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Advisory line for a push attempted right after a local change.
pub fn describe_push_outcome(outcome: &PushOutcome) -> Option<String> {
    match outcome {
        PushOutcome::Created(_) | PushOutcome::Updated(_) => Some("Synced".to_string()),
        PushOutcome::Skipped => None,
        PushOutcome::Failed(error) => Some(format!("Saved offline, will sync later ({error})")),
        PushOutcome::Rejected(rejection) => Some(format!(
            "Server refused this entry ({}): {}. Edit it to retry.",
            rejection.kind.as_str(),
            rejection.message
        )),
    }
}

/// Push `id` right away when a token is at hand. Never fails the command.
pub async fn push_after_change(ctx: &CommandContext, service: &EntryService, id: &EntryId) {
    let Some(token) = ctx.token.as_deref() else {
        println!("Saved locally. Run `fieldtime sync` with a token to upload.");
        return;
    };

    let engine = match SyncEngine::http(service.clone(), ctx.settings.clone()) {
        Ok(engine) => engine,
        Err(error) => {
            eprintln!("Warning: {error}");
            return;
        }
    };

    match engine.push_now(id, token).await {
        Ok(outcome) => {
            if let Some(line) = describe_push_outcome(&outcome) {
                if matches!(outcome, PushOutcome::Created(_) | PushOutcome::Updated(_)) {
                    println!("{line}");
                } else {
                    eprintln!("Warning: {line}");
                }
            }
        }
        Err(error) => {
            tracing::warn!("Immediate push failed: {error}");
            eprintln!("Warning: saved locally but not uploaded: {error}");
        }
    }
}

pub fn resolve_token(cli_token: Option<String>) -> Option<String> {
    normalize_text_option(cli_token)
        .or_else(|| normalize_text_option(env::var("FIELDTIME_TOKEN").ok()))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("FIELDTIME_DB_PATH").map(PathBuf::from))
    {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("fieldtime").join("fieldtime.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub fn open_service(path: &Path) -> Result<EntryService, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(EntryService::open_path(path.to_path_buf())?)
}
