use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::util::{read_optional, write_atomic};

const SETTINGS_VERSION: u32 = 1;

/// 設定檔的檔名（位於 storage 目錄下）。 / File name of the settings JSON inside the storage directory.
pub const SETTINGS_FILE_NAME: &str = "page-picker.settings.json";

const DEFAULT_STORAGE_DIR: &str = ".vscode";

/// 讀寫設定檔時的錯誤。 / Errors raised by the settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is not valid settings JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// 入口檔中設定物件的擺放方式。 / How the configuration object is declared inside an entry file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryLayout {
    /// `class App { config: Config = { ... } }`
    ClassProperty { stem: String },
    /// `export default { pages: [...] }` or `defineAppConfig({ pages: [...] })`
    ObjectLiteral { stem: String },
}

impl EntryLayout {
    pub fn stem(&self) -> &str {
        match self {
            EntryLayout::ClassProperty { stem } | EntryLayout::ObjectLiteral { stem } => stem,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickerSettings {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_source_dir")]
    pub source_dir: String,
    #[serde(default = "default_suffixes")]
    pub suffixes: Vec<String>,
    #[serde(default = "default_layouts")]
    pub layouts: Vec<EntryLayout>,
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,
    #[serde(default = "default_storage_file")]
    pub storage_file: String,
    #[serde(default = "default_marker_flag")]
    pub marker_flag: String,
    #[serde(default)]
    pub show_picked_only: bool,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

fn default_source_dir() -> String {
    "src".to_string()
}

fn default_suffixes() -> Vec<String> {
    ["tsx", "ts", "jsx", "js"]
        .iter()
        .map(|suffix| suffix.to_string())
        .collect()
}

fn default_layouts() -> Vec<EntryLayout> {
    vec![
        EntryLayout::ClassProperty {
            stem: "app".to_string(),
        },
        EntryLayout::ObjectLiteral {
            stem: "app.config".to_string(),
        },
    ]
}

fn default_storage_dir() -> String {
    DEFAULT_STORAGE_DIR.to_string()
}

fn default_storage_file() -> String {
    "page-picker.json".to_string()
}

fn default_marker_flag() -> String {
    "PAGE-PICKER-GENERATED".to_string()
}

impl Default for PickerSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            source_dir: default_source_dir(),
            suffixes: default_suffixes(),
            layouts: default_layouts(),
            storage_dir: default_storage_dir(),
            storage_file: default_storage_file(),
            marker_flag: default_marker_flag(),
            show_picked_only: false,
        }
    }
}

impl PickerSettings {
    pub fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = SETTINGS_VERSION;
        }
        if self.source_dir.trim().is_empty() {
            self.source_dir = default_source_dir();
        }
        self.suffixes = self
            .suffixes
            .iter()
            .map(|suffix| suffix.trim().trim_start_matches('.').to_string())
            .filter(|suffix| !suffix.is_empty())
            .collect();
        if self.suffixes.is_empty() {
            self.suffixes = default_suffixes();
        }
        self.layouts.retain(|layout| !layout.stem().trim().is_empty());
        if self.layouts.is_empty() {
            self.layouts = default_layouts();
        }
        if self.storage_dir.trim().is_empty() {
            self.storage_dir = default_storage_dir();
        }
        if self.storage_file.trim().is_empty() {
            self.storage_file = default_storage_file();
        }
        if self.marker_flag.trim().is_empty() {
            self.marker_flag = default_marker_flag();
        }
    }

    /// 專案原始碼根目錄。 / Source root of the project (`<project>/src` by default).
    pub fn source_root(&self, project: &Path) -> PathBuf {
        project.join(&self.source_dir)
    }

    /// 選取紀錄 sidecar 檔的位置。 / Location of the selection sidecar file.
    pub fn storage_path(&self, project: &Path) -> PathBuf {
        project.join(&self.storage_dir).join(&self.storage_file)
    }
}

/// 設定檔預設路徑。 / Default settings path for a project.
pub fn settings_path(project: &Path) -> PathBuf {
    project.join(DEFAULT_STORAGE_DIR).join(SETTINGS_FILE_NAME)
}

/// Settings file of one project, sanitized on every load and edit.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: PickerSettings,
}

impl SettingsStore {
    /// 載入設定；檔案不存在時使用預設值。 / Loads `path`, or defaults when it does not exist yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let text = read_optional(&path).map_err(|source| SettingsError::Read {
            path: path.clone(),
            source,
        })?;
        let mut settings = match text {
            Some(text) => serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
                path: path.clone(),
                source,
            })?,
            None => {
                debug!(path = %path.display(), "no settings file, using defaults");
                PickerSettings::default()
            }
        };
        settings.sanitize();
        Ok(Self { path, settings })
    }

    pub fn settings(&self) -> &PickerSettings {
        &self.settings
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `edit`, then writes the sanitized result back.
    pub fn update(&mut self, edit: impl FnOnce(&mut PickerSettings)) -> Result<(), SettingsError> {
        edit(&mut self.settings);
        self.settings.sanitize();
        let body = serde_json::to_vec_pretty(&self.settings).map_err(io::Error::from);
        body.and_then(|body| write_atomic(&self.path, &body))
            .map_err(|source| SettingsError::Write {
                path: self.path.clone(),
                source,
            })?;
        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_restores_defaults_for_blank_fields() {
        let mut settings = PickerSettings {
            source_dir: "  ".into(),
            suffixes: vec![".ts".into(), "".into()],
            layouts: vec![EntryLayout::ObjectLiteral { stem: " ".into() }],
            marker_flag: String::new(),
            ..PickerSettings::default()
        };
        settings.sanitize();

        assert_eq!(settings.source_dir, "src");
        assert_eq!(settings.suffixes, vec!["ts".to_string()]);
        assert_eq!(settings.layouts, default_layouts());
        assert_eq!(settings.marker_flag, "PAGE-PICKER-GENERATED");
    }

    #[test]
    fn layouts_use_tagged_representation() {
        let json = serde_json::to_value(&default_layouts()).unwrap();
        assert_eq!(json[0]["kind"], "class_property");
        assert_eq!(json[1]["stem"], "app.config");
    }

    #[test]
    fn storage_path_joins_project_relative_parts() {
        let settings = PickerSettings::default();
        let path = settings.storage_path(Path::new("/work/demo"));
        assert_eq!(path, PathBuf::from("/work/demo/.vscode/page-picker.json"));
    }
}
