use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fieldtime_core::config::RetentionPolicy;

#[derive(Parser)]
#[command(name = "fieldtime")]
#[command(about = "Track drive, work and lunch time from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name holding the technician identity and API settings
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Bearer token for the time entry API (falls back to FIELDTIME_TOKEN)
    #[arg(long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the current clock state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start working for a customer (or arrive after driving)
    #[command(alias = "in")]
    ClockIn {
        /// Customer name; ignored when arriving from a drive
        customer: Vec<String>,
    },
    /// Finish the current session
    #[command(alias = "out")]
    ClockOut,
    /// Track driving to a customer
    Drive {
        #[command(subcommand)]
        command: DriveCommands,
    },
    /// Track the lunch break
    Lunch {
        #[command(subcommand)]
        command: LunchCommands,
    },
    /// List entries anchored today
    List {
        /// Include every stored entry
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List entries waiting for the server
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an entry
    Delete {
        /// Entry ID or unique ID prefix
        id: String,
    },
    /// Push local changes and pull remote entries
    Sync {
        /// Keep syncing on the configured interval until interrupted
        #[arg(long)]
        watch: bool,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum DriveCommands {
    /// Start driving to a customer
    Start {
        /// Customer name
        customer: Vec<String>,
    },
    /// Stop driving
    End,
}

#[derive(Subcommand)]
pub enum LunchCommands {
    /// Start the lunch break
    Start,
    /// End the lunch break
    End,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Technician user id on the server
        #[arg(long, value_name = "ID")]
        user_id: Option<String>,
        /// Technician display name
        #[arg(long, value_name = "NAME")]
        technician: Option<String>,
        /// Time entry API base URL (e.g. <https://example.com/api>)
        #[arg(long, value_name = "URL")]
        api_base_url: Option<String>,
        /// HTTP request timeout in seconds
        #[arg(long, value_name = "SECS")]
        request_timeout_secs: Option<u64>,
        /// Pause between two pushes in milliseconds
        #[arg(long, value_name = "MS")]
        push_delay_ms: Option<u64>,
        /// Period of `sync --watch` in seconds
        #[arg(long, value_name = "SECS")]
        sync_interval_secs: Option<u64>,
        /// Local retention: `today`, `keep-all` or a number of days
        #[arg(long, value_name = "POLICY", value_parser = parse_retention)]
        retention: Option<RetentionPolicy>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Show a profile
    Show {
        /// Profile name (defaults to the resolved profile)
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
    /// Make a profile the active one
    Use {
        /// Profile name
        name: String,
    },
}

pub fn parse_retention(value: &str) -> Result<RetentionPolicy, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "today" => Ok(RetentionPolicy::Today),
        "keep-all" | "keep_all" | "all" => Ok(RetentionPolicy::KeepAll),
        other => match other.trim_end_matches('d').parse::<u32>() {
            Ok(0) => Ok(RetentionPolicy::Today),
            Ok(days) => Ok(RetentionPolicy::TrailingDays(days)),
            Err(_) => Err(format!(
                "invalid retention '{value}': use today, keep-all or a number of days"
            )),
        },
    }
}
