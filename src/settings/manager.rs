use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::catalog::builtin::KNOWN_PAYMENT_BRANDS;
use crate::recognition::gemini_provider::{DEFAULT_ENDPOINT, DEFAULT_MODEL};

pub const MIN_LAUNCH_TIMEOUT_MS: u64 = 500;
pub const MAX_LAUNCH_TIMEOUT_MS: u64 = 10_000;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const LAUNCH_TIMEOUT_ENV: &str = "QRPAY_LAUNCH_TIMEOUT_MS";

/// Main settings structure containing all application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub launch: LaunchSettings,
    #[serde(default)]
    pub recognition: RecognitionSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

/// Deep-link launch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchSettings {
    /// How long the page must stay visible after a launch before it counts as failed.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Image recognition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionSettings {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Usually left unset on disk and supplied through GEMINI_API_KEY.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Brand names the prompt lists and the salvage pass scans for.
    #[serde(default = "default_known_brands")]
    pub known_brands: Vec<String>,
    /// Replaces the built-in prompt when set.
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Where selection data lives. Unset paths resolve under ~/.qrpay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StorageSettings {
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_known_brands() -> Vec<String> {
    KNOWN_PAYMENT_BRANDS.iter().map(|b| b.to_string()).collect()
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: default_endpoint(),
            api_key: None,
            known_brands: default_known_brands(),
            prompt: None,
        }
    }
}

/// Base directory for everything the app stores: ~/.qrpay
pub fn app_dir() -> Result<PathBuf, String> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| "Failed to get home directory".to_string())?;
    Ok(home_dir.join(".qrpay"))
}

impl StorageSettings {
    pub fn resolved_database_path(&self) -> Result<PathBuf, String> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(app_dir()?.join("qrpay.db")),
        }
    }

    pub fn resolved_cache_path(&self) -> Result<PathBuf, String> {
        match &self.cache_path {
            Some(path) => Ok(path.clone()),
            None => Ok(app_dir()?.join("cache.json")),
        }
    }
}

/// Layer environment variables over persisted settings.
///
/// Values that fail to parse or validate are logged and ignored.
pub fn apply_env_overrides<F>(mut settings: Settings, lookup: F) -> Settings
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
        settings.recognition.api_key = Some(key.trim().to_string());
    }

    if let Some(raw) = lookup(LAUNCH_TIMEOUT_ENV) {
        match raw.trim().parse::<u64>() {
            Ok(ms) if (MIN_LAUNCH_TIMEOUT_MS..=MAX_LAUNCH_TIMEOUT_MS).contains(&ms) => {
                settings.launch.timeout_ms = ms;
            }
            _ => warn!(
                "Settings: ignoring {}={:?} (expected {}..={})",
                LAUNCH_TIMEOUT_ENV, raw, MIN_LAUNCH_TIMEOUT_MS, MAX_LAUNCH_TIMEOUT_MS
            ),
        }
    }

    settings
}

/// Manages settings persistence and provides thread-safe access
pub struct SettingsManager {
    settings_path: PathBuf,
    current_settings: Arc<RwLock<Settings>>,
}

impl SettingsManager {
    /// Creates a new SettingsManager backed by ~/.qrpay/settings.json
    ///
    /// If the settings file doesn't exist, creates it with default values.
    pub fn new() -> Result<Self, String> {
        Self::new_with_path(app_dir()?.join("settings.json"))
    }

    /// Creates a new SettingsManager with a custom settings path
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The settings directory cannot be created
    /// - The settings file cannot be read or written
    pub fn new_with_path(settings_path: PathBuf) -> Result<Self, String> {
        if let Some(parent) = settings_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create settings directory: {}", e))?;
            }
        }

        let manager = Self {
            settings_path: settings_path.clone(),
            current_settings: Arc::new(RwLock::new(Settings::default())),
        };

        let settings = if settings_path.exists() {
            manager.load_from_file()?
        } else {
            let defaults = Settings::default();
            manager.save_to_file(&defaults)?;
            defaults
        };

        *manager.current_settings.write()
            .map_err(|e| format!("Failed to acquire write lock: {}", e))? = settings;

        Ok(manager)
    }

    pub fn path(&self) -> &PathBuf {
        &self.settings_path
    }

    /// Returns a clone of the persisted settings
    pub fn get(&self) -> Settings {
        match self.current_settings.read() {
            Ok(settings) => settings.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Persisted settings with GEMINI_API_KEY and QRPAY_LAUNCH_TIMEOUT_MS applied.
    ///
    /// Overrides are never written back to disk.
    pub fn effective(&self) -> Settings {
        apply_env_overrides(self.get(), |name| std::env::var(name).ok())
    }

    /// Updates settings (validates, persists to disk, then updates in-memory)
    ///
    /// If an error occurs, in-memory state remains unchanged.
    pub fn update(&self, settings: Settings) -> Result<(), String> {
        Self::validate(&settings)?;

        self.save_to_file(&settings)?;

        *self.current_settings.write()
            .map_err(|e| format!("Failed to acquire write lock: {}", e))? = settings;

        Ok(())
    }

    /// Validates settings constraints
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - launch.timeout_ms is outside 500..=10000
    /// - the recognition model or endpoint is empty
    /// - the brand list is empty or contains a blank name
    pub fn validate(settings: &Settings) -> Result<(), String> {
        let timeout = settings.launch.timeout_ms;
        if !(MIN_LAUNCH_TIMEOUT_MS..=MAX_LAUNCH_TIMEOUT_MS).contains(&timeout) {
            return Err(format!(
                "Launch timeout must be between {} and {} ms, got {}",
                MIN_LAUNCH_TIMEOUT_MS, MAX_LAUNCH_TIMEOUT_MS, timeout
            ));
        }

        if settings.recognition.model.trim().is_empty() {
            return Err("Recognition model name cannot be empty".to_string());
        }

        let endpoint = settings.recognition.endpoint.trim();
        if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
            return Err(format!(
                "Recognition endpoint must be an http(s) URL, got '{}'",
                endpoint
            ));
        }

        if settings.recognition.known_brands.is_empty() {
            return Err("Known brand list cannot be empty".to_string());
        }
        if settings.recognition.known_brands.iter().any(|b| b.trim().is_empty()) {
            return Err("Known brand names cannot be blank".to_string());
        }

        Ok(())
    }

    /// Loads settings from disk
    ///
    /// If the file contains invalid JSON or fails validation, logs an error
    /// and returns defaults.
    fn load_from_file(&self) -> Result<Settings, String> {
        let contents = std::fs::read_to_string(&self.settings_path)
            .map_err(|e| format!("Failed to read settings file: {}", e))?;

        match serde_json::from_str::<Settings>(&contents) {
            Ok(settings) => match Self::validate(&settings) {
                Ok(()) => Ok(settings),
                Err(e) => {
                    error!("Settings: invalid settings file ({}). Using defaults.", e);
                    Ok(Settings::default())
                }
            },
            Err(e) => {
                error!("Settings: Failed to parse settings JSON: {}. Using defaults.", e);
                Ok(Settings::default())
            }
        }
    }

    /// Saves settings to disk atomically
    ///
    /// Uses a temporary file and atomic rename to prevent partial writes.
    fn save_to_file(&self, settings: &Settings) -> Result<(), String> {
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        let temp_path = self.settings_path.with_extension("json.tmp");
        std::fs::write(&temp_path, json)
            .map_err(|e| format!("Failed to write temporary settings file: {}", e))?;

        std::fs::rename(&temp_path, &self.settings_path)
            .map_err(|e| format!("Failed to rename settings file: {}", e))?;

        Ok(())
    }
}
