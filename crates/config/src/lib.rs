//! Config access layer: entry-file discovery, config extraction and write-back.
//! 設定存取層：尋找入口檔、擷取設定物件並寫回原始碼。

pub mod app_config;
pub mod codec;
pub mod literal;
pub mod monitor;
pub mod provider;

pub use app_config::{AppConfig, SubPackageConfig, TabBarConfig, TabBarItem};
pub use codec::{GenerationMarker, LocateError, Span};
pub use literal::LiteralError;
pub use monitor::{EntryFileEvent, EntryFileMonitor, FileMonitorError};
pub use provider::{
    AppConfigProvider, ConfigError, ConfigOrigin, LoadedConfig, RevertOutcome, RevertSkip,
};
pub use page_picker_settings::{read_optional, write_atomic};
