use fieldtime_core::config::RetentionPolicy;
use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::config_profiles::{normalize_text_option, CliProfile, CliProfilesConfig};
use crate::error::CliError;

/// Values given to `config init`; unset fields keep the stored value.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub user_id: Option<String>,
    pub technician: Option<String>,
    pub api_base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub push_delay_ms: Option<u64>,
    pub sync_interval_secs: Option<u64>,
    pub retention: Option<RetentionPolicy>,
}

#[derive(Debug, Serialize)]
struct ProfileView<'a> {
    name: &'a str,
    active: bool,
    #[serde(flatten)]
    profile: &'a CliProfile,
}

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            user_id,
            technician,
            api_base_url,
            request_timeout_secs,
            push_delay_ms,
            sync_interval_secs,
            retention,
            no_activate,
        } => {
            let update = ProfileUpdate {
                user_id,
                technician,
                api_base_url,
                request_timeout_secs,
                push_delay_ms,
                sync_interval_secs,
                retention,
            };
            run_config_init(profile.as_deref().or(global_profile), update, no_activate)
        }
        ConfigCommands::Show { profile } => run_config_show(profile.as_deref().or(global_profile)),
        ConfigCommands::Use { name } => run_config_use(&name),
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    update: ProfileUpdate,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);

    let profile = config.profile_mut_or_default(&profile_name);
    apply_profile_update(profile, update)?;
    let missing_fields = profile.missing_fields();

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    if missing_fields.is_empty() {
        println!("Profile '{profile_name}' is ready. Run `fieldtime clock-in <customer>`.");
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing_fields.join(", ")
        );
    }
    Ok(())
}

/// Merge explicit values into `profile` and validate the result.
pub fn apply_profile_update(profile: &mut CliProfile, update: ProfileUpdate) -> Result<(), CliError> {
    let mut merged = profile.clone();

    if let Some(value) = normalize_text_option(update.user_id) {
        merged.user_id = Some(value);
    }
    if let Some(value) = normalize_text_option(update.technician) {
        merged.technician_name = Some(value);
    }
    if let Some(value) = normalize_text_option(update.api_base_url) {
        merged.client.api_base_url = value;
    }
    if let Some(value) = update.request_timeout_secs {
        merged.client.request_timeout_secs = value;
    }
    if let Some(value) = update.push_delay_ms {
        merged.client.push_delay_ms = value;
    }
    if let Some(value) = update.sync_interval_secs {
        merged.client.sync_interval_secs = value;
    }
    if let Some(value) = update.retention {
        merged.client.retention = value;
    }

    merged.client.api_base_url = merged.client.validate()?;
    *profile = merged;
    Ok(())
}

fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let name = config.resolve_profile_name(profile_name);
    let profile = config
        .profile(&name)
        .ok_or_else(|| CliError::Config(format!("Profile '{name}' does not exist")))?;

    let view = ProfileView {
        name: &name,
        active: config.active_profile.as_deref() == Some(name.as_str()),
        profile,
    };
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

fn run_config_use(name: &str) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let name = name.trim();
    if config.profile(name).is_none() {
        let known = config.profiles.keys().cloned().collect::<Vec<_>>().join(", ");
        return Err(CliError::Config(format!(
            "Profile '{name}' does not exist (known: {known})"
        )));
    }

    config.active_profile = Some(name.to_string());
    config.save().map_err(CliError::Config)?;
    println!("Active profile: {name}");
    Ok(())
}
