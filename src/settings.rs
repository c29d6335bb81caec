//! User settings storage
//!
//! Settings are saved as a JSON file in the user's config directory and
//! reloaded in full whenever a change notification is received. Every
//! update broadcasts the names of the keys that changed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use zeroize::Zeroize;

/// Default target language for translations
const DEFAULT_TARGET_LANG: &str = "ja";

/// Default chat-completion model
const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Default overlay text color
const DEFAULT_OVERLAY_COLOR: &str = "#ffeb3b";

/// API credential. Redacted in debug output and cleared from memory on drop.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct Credential(String);

impl Credential {
    pub(crate) fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }

    fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_blank() {
            write!(f, "Credential(<unset>)")
        } else {
            write!(f, "Credential(<redacted>)")
        }
    }
}

impl Drop for Credential {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// User settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    /// OpenAI API key
    pub credential: Credential,
    /// Language code translations are produced in (e.g., "ja", "en")
    pub target_lang: String,
    /// Chat-completion model used for translation and minutes
    pub model: String,
    /// Accumulate translations for meeting minutes
    pub minutes_enabled: bool,
    /// Recipient of the minutes email draft
    pub minutes_recipient: String,
    /// CSS color of the translation overlay
    pub overlay_color: String,
    /// Master switch for caption translation
    pub translate_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            credential: Credential::default(),
            target_lang: DEFAULT_TARGET_LANG.to_string(),
            model: DEFAULT_MODEL.to_string(),
            minutes_enabled: false,
            minutes_recipient: String::new(),
            overlay_color: DEFAULT_OVERLAY_COLOR.to_string(),
            translate_enabled: true,
        }
    }
}

impl Settings {
    /// The configured credential, if any
    pub(crate) fn credential(&self) -> Option<&Credential> {
        (!self.credential.is_blank()).then_some(&self.credential)
    }

    /// The configured model, if any
    pub(crate) fn model(&self) -> Option<&str> {
        let model = self.model.trim();
        (!model.is_empty()).then_some(model)
    }

    /// Model for caption translation, falling back to the default when blank
    pub(crate) fn model_or_default(&self) -> &str {
        self.model().unwrap_or(DEFAULT_MODEL)
    }

    /// Target language, falling back to the default when blank
    pub(crate) fn target_lang(&self) -> &str {
        let lang = self.target_lang.trim();
        if lang.is_empty() {
            DEFAULT_TARGET_LANG
        } else {
            lang
        }
    }

    /// Names of the keys whose values differ between `self` and `other`
    fn changed_keys(&self, other: &Settings) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.credential != other.credential {
            keys.push("credential");
        }
        if self.target_lang != other.target_lang {
            keys.push("target_lang");
        }
        if self.model != other.model {
            keys.push("model");
        }
        if self.minutes_enabled != other.minutes_enabled {
            keys.push("minutes_enabled");
        }
        if self.minutes_recipient != other.minutes_recipient {
            keys.push("minutes_recipient");
        }
        if self.overlay_color != other.overlay_color {
            keys.push("overlay_color");
        }
        if self.translate_enabled != other.translate_enabled {
            keys.push("translate_enabled");
        }
        keys
    }
}

/// Change notification. Subscribers reload the full snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SettingsChanged {
    pub keys: Vec<&'static str>,
}

/// Settings store backed by a JSON file, or by memory when no path is given
pub(crate) struct SettingsStore {
    path: Option<PathBuf>,
    memory: Mutex<Settings>,
    env_credential: Option<Credential>,
    notifier: broadcast::Sender<SettingsChanged>,
}

/// Get the settings file path
fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("CaptionRelay").join("settings.json"))
}

impl SettingsStore {
    /// Store backed by the default settings file
    pub(crate) fn open_default() -> Result<Self, SettingsError> {
        let path = settings_path().ok_or(SettingsError::NoConfigDir)?;
        Ok(Self::open(path))
    }

    /// Store backed by the given settings file
    pub(crate) fn open(path: PathBuf) -> Self {
        Self::build(Some(path), Settings::default())
    }

    /// Store kept only in memory
    pub(crate) fn in_memory(settings: Settings) -> Self {
        Self::build(None, settings)
    }

    fn build(path: Option<PathBuf>, settings: Settings) -> Self {
        let (notifier, _) = broadcast::channel(32);
        Self {
            path,
            memory: Mutex::new(settings),
            env_credential: None,
            notifier,
        }
    }

    /// Use `credential` whenever the stored credential is blank
    pub(crate) fn with_env_credential(mut self, credential: Option<String>) -> Self {
        self.env_credential = credential
            .map(Credential::new)
            .filter(|c| !c.is_blank());
        self
    }

    /// Subscribe to change notifications
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SettingsChanged> {
        self.notifier.subscribe()
    }

    /// Load the full settings snapshot
    ///
    /// Returns defaults if the file doesn't exist or can't be read
    pub(crate) fn load(&self) -> Settings {
        let mut settings = self.load_stored();
        if settings.credential().is_none() {
            if let Some(ref credential) = self.env_credential {
                settings.credential = credential.clone();
            }
        }
        settings
    }

    fn load_stored(&self) -> Settings {
        let Some(ref path) = self.path else {
            return match self.memory.lock() {
                Ok(settings) => settings.clone(),
                Err(poisoned) => {
                    warn!("Settings mutex was poisoned, recovering data");
                    poisoned.into_inner().clone()
                }
            };
        };

        if !path.exists() {
            return Settings::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    error!("Failed to parse settings: {}", e);
                    Settings::default()
                }
            },
            Err(e) => {
                error!("Failed to read settings file: {}", e);
                Settings::default()
            }
        }
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let Some(ref path) = self.path else {
            let mut memory = self.memory.lock().map_err(|_| SettingsError::Poisoned)?;
            *memory = settings.clone();
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
                info!("Created settings directory: {:?}", parent);
            }
        }

        let json = serde_json::to_string_pretty(settings)?;
        fs::write(path, json)?;
        info!("Saved settings to: {:?}", path);
        Ok(())
    }

    /// Apply `edit` to the stored settings, persist them, and notify
    /// subscribers if anything changed.
    pub(crate) fn update(
        &self,
        edit: impl FnOnce(&mut Settings),
    ) -> Result<SettingsChanged, SettingsError> {
        let before = self.load_stored();
        let mut after = before.clone();
        edit(&mut after);

        let change = SettingsChanged {
            keys: before.changed_keys(&after),
        };
        if change.keys.is_empty() {
            return Ok(change);
        }

        self.save(&after)?;
        info!(keys = ?change.keys, "Settings changed");
        // No subscribers is fine; the next load still sees the new values
        let _ = self.notifier.send(change.clone());
        Ok(change)
    }
}

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub(crate) enum SettingsError {
    #[error("Could not find config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Settings lock poisoned")]
    Poisoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.credential().is_none());
        assert_eq!(settings.target_lang(), "ja");
        assert_eq!(settings.model(), Some("gpt-4.1-nano"));
        assert!(!settings.minutes_enabled);
        assert!(settings.translate_enabled);
    }

    #[test]
    fn test_settings_path() {
        let path = settings_path();
        assert!(path.is_some());
        assert!(path.unwrap().ends_with("CaptionRelay/settings.json"));
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("sk-secret");
        assert_eq!(format!("{:?}", credential), "Credential(<redacted>)");
        assert_eq!(credential.expose(), "sk-secret");
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"credential":"sk-1","minutes_enabled":true}"#).unwrap();
        assert_eq!(settings.credential.expose(), "sk-1");
        assert!(settings.minutes_enabled);
        assert_eq!(settings.model, "gpt-4.1-nano");
        assert!(settings.translate_enabled);
    }

    #[test]
    fn test_blank_values_fall_back() {
        let settings = Settings {
            credential: Credential::new("   "),
            target_lang: String::new(),
            model: " ".to_string(),
            ..Settings::default()
        };
        assert!(settings.credential().is_none());
        assert!(settings.model().is_none());
        assert_eq!(settings.target_lang(), "ja");
    }

    #[test]
    fn test_file_store_roundtrip_and_notification() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("nested").join("settings.json"));
        let mut rx = store.subscribe();

        assert_eq!(store.load(), Settings::default());

        let change = store
            .update(|s| {
                s.minutes_enabled = true;
                s.minutes_recipient = "team@example.com".to_string();
            })
            .unwrap();
        assert_eq!(change.keys, vec!["minutes_enabled", "minutes_recipient"]);
        assert_eq!(rx.try_recv().unwrap(), change);

        let reloaded = store.load();
        assert!(reloaded.minutes_enabled);
        assert_eq!(reloaded.minutes_recipient, "team@example.com");
    }

    #[test]
    fn test_unchanged_update_does_not_notify() {
        let store = SettingsStore::in_memory(Settings::default());
        let mut rx = store.subscribe();
        let change = store.update(|s| s.translate_enabled = true).unwrap();
        assert!(change.keys.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_corrupt_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        let store = SettingsStore::open(path);
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_env_credential_fills_blank_only() {
        let store = SettingsStore::in_memory(Settings::default())
            .with_env_credential(Some("sk-env".to_string()));
        assert_eq!(store.load().credential.expose(), "sk-env");

        store.update(|s| s.credential = Credential::new("sk-stored")).unwrap();
        assert_eq!(store.load().credential.expose(), "sk-stored");
    }
}
