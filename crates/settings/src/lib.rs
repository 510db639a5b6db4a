//! 頁面挑選工具的專案設定。 / Per-project settings for the page picker.

pub mod settings;
mod util;

pub use settings::{
    settings_path, EntryLayout, PickerSettings, SettingsError, SettingsStore, SETTINGS_FILE_NAME,
};
pub use util::{read_optional, write_atomic};
