pub mod manager;


pub use manager::{
    apply_env_overrides, app_dir, LaunchSettings, RecognitionSettings, Settings, SettingsManager,
    StorageSettings,
};
