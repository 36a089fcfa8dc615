//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use fieldtime_core::config::ClientConfig;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "cli-config.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

/// Technician identity plus the client settings used against one server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub technician_name: Option<String>,
    #[serde(default)]
    pub client: ClientConfig,
}

/// Who is clocking: the identity stamped on every new entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Technician {
    pub user_id: String,
    pub name: String,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join("fieldtime").join(CONFIG_FILE_NAME))
        .ok_or_else(|| "Failed to resolve CLI config directory".to_string())
}

pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    fieldtime_core::util::normalize_text_option(value)
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Explicit name, then `FIELDTIME_PROFILE`, then the active profile, then `default`.
    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        if let Some(profile) = normalize_profile_name(explicit) {
            return profile;
        }
        if let Some(profile) =
            normalize_profile_name(std::env::var("FIELDTIME_PROFILE").ok().as_deref())
        {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(self.active_profile.as_deref()) {
            return profile;
        }
        "default".to_string()
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    /// Identity for new entries; `None` until both fields are set.
    pub fn technician(&self) -> Option<Technician> {
        let user_id = normalize_text_option(self.user_id.clone())?;
        let name = normalize_text_option(self.technician_name.clone())?;
        Some(Technician { user_id, name })
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if normalize_text_option(self.user_id.clone()).is_none() {
            missing.push("user_id");
        }
        if normalize_text_option(self.technician_name.clone()).is_none() {
            missing.push("technician_name");
        }
        missing
    }

    fn normalize(&mut self) {
        self.user_id = normalize_text_option(self.user_id.clone());
        self.technician_name = normalize_text_option(self.technician_name.clone());
        self.client.api_base_url = self.client.api_base_url.trim().to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldtime_core::config::RetentionPolicy;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalize_profile_name_rejects_empty() {
        assert_eq!(normalize_profile_name(None), None);
        assert_eq!(normalize_profile_name(Some(" ")), None);
        assert_eq!(normalize_profile_name(Some(" van ")), Some("van".to_string()));
    }

    #[test]
    fn missing_config_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = CliProfilesConfig::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, CliProfilesConfig::default());
    }

    #[test]
    fn config_roundtrip_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = CliProfilesConfig {
            version: 1,
            active_profile: Some(" default ".to_string()),
            profiles: BTreeMap::new(),
        };
        config.profiles.insert(
            "default".to_string(),
            CliProfile {
                user_id: Some(" 7 ".to_string()),
                technician_name: Some(" Dana Field ".to_string()),
                client: ClientConfig {
                    api_base_url: " https://time.example.com/api ".to_string(),
                    retention: RetentionPolicy::TrailingDays(3),
                    ..ClientConfig::default()
                },
            },
        );

        config.save_to_path(&path).unwrap();
        let loaded = CliProfilesConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.active_profile.as_deref(), Some("default"));

        let profile = loaded.profile("default").unwrap();
        assert_eq!(profile.user_id.as_deref(), Some("7"));
        assert_eq!(profile.technician_name.as_deref(), Some("Dana Field"));
        assert_eq!(profile.client.api_base_url, "https://time.example.com/api");
        assert_eq!(profile.client.retention, RetentionPolicy::TrailingDays(3));
    }

    #[test]
    fn unknown_client_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"{"profiles":{"default":{"client":{"api_base":"https://x"}}}}"#,
        )
        .unwrap();

        let error = CliProfilesConfig::load_from_path(&path).unwrap_err();
        assert!(error.contains("Failed to parse config"));
    }

    #[test]
    fn resolve_profile_name_prefers_explicit_then_active() {
        let config = CliProfilesConfig {
            version: 1,
            active_profile: Some("van".to_string()),
            profiles: BTreeMap::new(),
        };
        assert_eq!(config.resolve_profile_name(Some("office")), "office");
        if std::env::var_os("FIELDTIME_PROFILE").is_none() {
            assert_eq!(config.resolve_profile_name(None), "van");
        }
    }

    #[test]
    fn technician_requires_both_identity_fields() {
        let mut profile = CliProfile {
            user_id: Some("7".to_string()),
            ..CliProfile::default()
        };
        assert_eq!(profile.technician(), None);
        assert_eq!(profile.missing_fields(), vec!["technician_name"]);

        profile.technician_name = Some("Dana".to_string());
        assert_eq!(
            profile.technician(),
            Some(Technician {
                user_id: "7".to_string(),
                name: "Dana".to_string(),
            })
        );
        assert!(profile.missing_fields().is_empty());
    }
}
