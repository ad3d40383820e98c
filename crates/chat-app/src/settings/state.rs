use std::path::PathBuf;

use gpui::*;
use gpui_component::{Theme, ThemeMode};
use wren_backend::BackendConfig;
use wren_llm::{DEFAULT_GEMINI_MODEL, ProviderConfig};

/// Environment fallbacks consulted for fields the settings file leaves blank.
pub const BACKEND_URL_ENV: &str = "SUPABASE_URL";
pub const BACKEND_KEY_ENV: &str = "SUPABASE_ANON_KEY";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const MODEL_ENV: &str = "GEMINI_MODEL";

/// Settings that persist across app restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSettings {
    /// Base URL of the hosted conversation store.
    pub backend_url: String,
    /// Service key for the hosted conversation store.
    pub backend_key: String,
    /// API key for the generative-model provider.
    pub api_key: String,
    /// Model ID to generate with.
    pub model_id: String,
    /// Whether responses stream incrementally or arrive in one shot.
    pub streaming: bool,
    pub theme_mode: ThemeMode,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            backend_url: String::new(),
            backend_key: String::new(),
            api_key: String::new(),
            model_id: DEFAULT_GEMINI_MODEL.to_string(),
            streaming: true,
            theme_mode: ThemeMode::Light,
        }
    }
}

impl AppSettings {
    /// Returns true when a required value is missing or still a placeholder,
    /// in which case the shell shows the setup screen instead of the chat.
    pub fn setup_required(&self) -> bool {
        is_placeholder(&self.backend_url)
            || is_placeholder(&self.backend_key)
            || is_placeholder(&self.api_key)
    }

    /// Creates the hosted-store config from these settings.
    /// Returns None if either backend value is unusable.
    pub fn to_backend_config(&self) -> Option<BackendConfig> {
        if is_placeholder(&self.backend_url) || is_placeholder(&self.backend_key) {
            return None;
        }

        Some(BackendConfig::new(&self.backend_url, &self.backend_key))
    }

    /// Creates the model provider config from these settings.
    /// Returns None if the API key is unusable.
    pub fn to_provider_config(&self) -> Option<ProviderConfig> {
        if is_placeholder(&self.api_key) {
            return None;
        }

        Some(ProviderConfig::new(
            "gemini",
            &self.api_key,
            Some(self.model_id.clone()),
        ))
    }

    pub fn apply_theme(&self, window: Option<&mut Window>, cx: &mut App) {
        Theme::change(self.theme_mode, window, cx);
    }
}

/// Returns true for values that cannot possibly work: empty ones and the
/// literal placeholders people leave in copied env templates.
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.to_ascii_lowercase().contains("placeholder")
}

/// Fills blank settings fields from the environment.
///
/// The lookup is injected so resolution stays testable without mutating
/// process state.
pub fn resolve_settings<F>(mut settings: AppSettings, lookup: F) -> AppSettings
where
    F: Fn(&str) -> Option<String>,
{
    let fallback = |current: &str, env_name: &str| {
        if !current.trim().is_empty() {
            return current.to_string();
        }

        lookup(env_name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_default()
    };

    settings.backend_url = fallback(&settings.backend_url, BACKEND_URL_ENV);
    settings.backend_key = fallback(&settings.backend_key, BACKEND_KEY_ENV);
    settings.api_key = fallback(&settings.api_key, API_KEY_ENV);

    let model_id = fallback(&settings.model_id, MODEL_ENV);
    settings.model_id = if model_id.is_empty() {
        DEFAULT_GEMINI_MODEL.to_string()
    } else {
        model_id
    };

    settings
}

/// Settings persistence layer using a simple line-based format.
pub struct SettingsStore {
    settings: AppSettings,
    config_path: PathBuf,
}

impl SettingsStore {
    /// Returns the default config file path in the user's home directory.
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wren")
            .join("settings.conf")
    }

    /// Creates a new settings store with the given config path.
    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_disk(&config_path);
        Self {
            settings,
            config_path,
        }
    }

    /// Loads settings with default path.
    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    /// Returns current settings.
    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Updates settings and persists to disk.
    pub fn update(&mut self, settings: AppSettings) -> Result<(), SettingsError> {
        self.persist(&settings)?;
        self.settings = settings;
        Ok(())
    }

    /// Loads settings from disk or returns defaults.
    fn load_from_disk(path: &PathBuf) -> AppSettings {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                tracing::info!("settings file not found at {:?}, using defaults", path);
                return AppSettings::default();
            }
        };

        Self::parse_settings(&content)
    }

    /// Parses settings from content using key=value format.
    fn parse_settings(content: &str) -> AppSettings {
        let mut settings = AppSettings::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim();

                match key {
                    "backend_url" => settings.backend_url = value.to_string(),
                    "backend_key" => settings.backend_key = value.to_string(),
                    "api_key" => settings.api_key = value.to_string(),
                    "model_id" => settings.model_id = value.to_string(),
                    "streaming" => settings.streaming = parse_bool(value, true),
                    "theme_mode" => settings.theme_mode = parse_theme_mode(value),
                    _ => {}
                }
            }
        }

        settings
    }

    /// Formats settings for persistence.
    fn format_settings(settings: &AppSettings) -> String {
        format!(
            "# Wren Settings\n\
             backend_url={}\n\
             backend_key={}\n\
             api_key={}\n\
             model_id={}\n\
             streaming={}\n\
             theme_mode={}\n",
            settings.backend_url,
            settings.backend_key,
            settings.api_key,
            settings.model_id,
            settings.streaming,
            settings.theme_mode.name(),
        )
    }

    /// Persists settings to disk.
    fn persist(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let content = Self::format_settings(settings);

        std::fs::write(&self.config_path, content).map_err(|e| SettingsError::WriteFile {
            path: self.config_path.clone(),
            source: e,
        })?;

        tracing::info!("saved settings to {:?}", self.config_path);
        Ok(())
    }
}

/// Errors that can occur during settings operations.
#[derive(Debug)]
pub enum SettingsError {
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::CreateDir { path, source } => {
                write!(
                    f,
                    "failed to create config directory at {:?}: {}",
                    path, source
                )
            }
            SettingsError::WriteFile { path, source } => {
                write!(f, "failed to write settings file to {:?}: {}", path, source)
            }
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::CreateDir { source, .. } => Some(source),
            SettingsError::WriteFile { source, .. } => Some(source),
        }
    }
}

fn parse_bool(value: &str, default: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" => false,
        _ => default,
    }
}

fn parse_theme_mode(value: &str) -> ThemeMode {
    if value.trim().eq_ignore_ascii_case("dark") {
        ThemeMode::Dark
    } else {
        ThemeMode::Light
    }
}

/// GPUI entity that holds settings state and emits change events.
pub struct SettingsState {
    store: SettingsStore,
}

/// Emitted when settings change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsChanged {
    pub settings: AppSettings,
}

impl EventEmitter<SettingsChanged> for SettingsState {}

impl SettingsState {
    /// Creates a new settings state entity.
    pub fn new(cx: &mut App) -> Entity<Self> {
        cx.new(|_| Self {
            store: SettingsStore::load(),
        })
    }

    /// Returns current settings.
    pub fn settings(&self) -> &AppSettings {
        self.store.settings()
    }

    /// Returns settings with blank fields filled from the environment.
    pub fn resolved_settings(&self) -> AppSettings {
        resolve_settings(self.store.settings().clone(), |name| {
            std::env::var(name).ok()
        })
    }

    /// Updates settings and notifies subscribers.
    pub fn update_settings(
        &mut self,
        settings: AppSettings,
        cx: &mut Context<Self>,
    ) -> Result<(), SettingsError> {
        self.store.update(settings.clone())?;
        cx.emit(SettingsChanged { settings });
        cx.notify();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + '_ {
        move |name| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn placeholder_detection_covers_blank_and_template_values() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("   "));
        assert!(is_placeholder("https://placeholder.supabase.co"));
        assert!(is_placeholder("YOUR-PLACEHOLDER-KEY"));
        assert!(!is_placeholder("https://abc.supabase.co"));
    }

    #[test]
    fn blank_fields_fall_back_to_the_environment() {
        let resolved = resolve_settings(
            AppSettings::default(),
            lookup_from(&[
                (BACKEND_URL_ENV, "https://abc.supabase.co"),
                (BACKEND_KEY_ENV, "anon-key"),
                (API_KEY_ENV, "model-key"),
                (MODEL_ENV, "gemini-1.5-pro"),
            ]),
        );

        assert_eq!(resolved.backend_url, "https://abc.supabase.co");
        assert_eq!(resolved.backend_key, "anon-key");
        assert_eq!(resolved.api_key, "model-key");
        assert_eq!(resolved.model_id, "gemini-1.5-pro");
        assert!(!resolved.setup_required());
    }

    #[test]
    fn persisted_values_win_over_the_environment() {
        let mut settings = AppSettings::default();
        settings.backend_url = "https://from-file.supabase.co".to_string();

        let resolved = resolve_settings(
            settings,
            lookup_from(&[(BACKEND_URL_ENV, "https://from-env.supabase.co")]),
        );

        assert_eq!(resolved.backend_url, "https://from-file.supabase.co");
    }

    #[test]
    fn missing_values_mark_setup_as_required() {
        let resolved = resolve_settings(AppSettings::default(), |_| None);
        assert!(resolved.setup_required());
        assert!(resolved.to_backend_config().is_none());
        assert!(resolved.to_provider_config().is_none());
        // The model id still resolves so the settings form shows the default.
        assert_eq!(resolved.model_id, DEFAULT_GEMINI_MODEL);
    }

    #[test]
    fn settings_survive_a_format_parse_round_trip() {
        let mut settings = AppSettings::default();
        settings.backend_url = "https://abc.supabase.co".to_string();
        settings.backend_key = "anon-key".to_string();
        settings.api_key = "model-key".to_string();
        settings.model_id = "gemini-1.5-pro".to_string();
        settings.streaming = false;
        settings.theme_mode = ThemeMode::Dark;

        let parsed = SettingsStore::parse_settings(&SettingsStore::format_settings(&settings));
        assert_eq!(parsed, settings);
    }

    #[test]
    fn unknown_keys_and_comments_are_ignored() {
        let parsed = SettingsStore::parse_settings(
            "# comment\nunknown_key=value\nstreaming=false\n\nmodel_id=gemini-1.5-flash\n",
        );
        assert!(!parsed.streaming);
        assert_eq!(parsed.model_id, "gemini-1.5-flash");
        assert_eq!(parsed.backend_url, "");
    }
}
