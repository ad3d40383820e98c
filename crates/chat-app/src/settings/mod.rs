/// Settings persistence, environment fallback, and the settings overlay.
pub mod state;
pub mod view;

pub use state::{
    API_KEY_ENV, AppSettings, BACKEND_KEY_ENV, BACKEND_URL_ENV, MODEL_ENV, SettingsChanged,
    SettingsError, SettingsState, SettingsStore, is_placeholder, resolve_settings,
};
pub use view::{SettingsClose, SettingsView};
