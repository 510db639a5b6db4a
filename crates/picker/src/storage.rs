//! Sidecar store for the per-project pick state and the pristine entry-file text.
//! 專案選取狀態與原始入口檔內容的 sidecar 儲存。

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use page_picker_config::{read_optional, write_atomic};
use page_picker_settings::PickerSettings;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

const FALLBACK_APP_DIR: &str = "page-picker";

/// One picked page as persisted on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPage {
    pub id: String,
    #[serde(default)]
    pub picked: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub entry: bool,
}

/// Persisted selection record.
/// 持久化的選取紀錄。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRecord {
    #[serde(default)]
    pub pages: BTreeMap<String, StoredPage>,
    #[serde(
        rename = "originAppFile",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub origin_app_file: Option<String>,
}

impl SelectionRecord {
    pub fn page(&self, id: &str) -> Option<&StoredPage> {
        self.pages.get(id)
    }

    pub fn is_picked(&self, id: &str) -> bool {
        self.page(id).map_or(false, |page| page.picked)
    }

    pub fn is_entry(&self, id: &str) -> bool {
        self.page(id).map_or(false, |page| page.entry)
    }
}

/// Where the last save landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    Project(PathBuf),
    Fallback(PathBuf),
    Unsaved,
}

/// Selection store with a project sidecar and a per-user fallback file.
/// I/O failures are logged and never returned.
/// 選取紀錄儲存：優先寫入專案 sidecar，失敗時改寫入使用者資料夾。
#[derive(Debug, Clone)]
pub struct SelectionStore {
    primary: Option<PathBuf>,
    fallback: Option<PathBuf>,
    record: SelectionRecord,
}

impl SelectionStore {
    /// Empty store; nothing is read from disk.
    pub fn new(primary: Option<PathBuf>, fallback: Option<PathBuf>) -> Self {
        Self {
            primary,
            fallback,
            record: SelectionRecord::default(),
        }
    }

    /// Store for `project`, with the fallback under `state_root` (or the user's local data dir).
    /// 依專案與設定建立儲存位置並讀取既有紀錄。
    pub fn for_project(
        project: &Path,
        settings: &PickerSettings,
        state_root: Option<&Path>,
    ) -> Self {
        let fallback = state_root
            .map(Path::to_path_buf)
            .or_else(|| dirs::data_local_dir().map(|dir| dir.join(FALLBACK_APP_DIR)))
            .map(|root| fallback_path(&root, project));
        let primary = project.is_dir().then(|| settings.storage_path(project));
        Self::load(primary, fallback)
    }

    /// Reads the newer of the primary and fallback files; an unreadable record is empty.
    /// A fallback at least as new as the primary means the sidecar could not be written.
    pub fn load(primary: Option<PathBuf>, fallback: Option<PathBuf>) -> Self {
        let mut store = Self::new(primary, fallback);
        let from_primary = store.primary.as_deref().and_then(read_record);
        let from_fallback = store.fallback.as_deref().and_then(read_record);
        let chosen = match (from_primary, from_fallback) {
            (Some(primary), Some(fallback)) => {
                if fallback.modified >= primary.modified {
                    fallback
                } else {
                    primary
                }
            }
            (Some(found), None) | (None, Some(found)) => found,
            (None, None) => return store,
        };
        if let Some(record) = chosen.record {
            store.record = record;
        }
        store
    }

    pub fn record(&self) -> &SelectionRecord {
        &self.record
    }

    pub fn primary_path(&self) -> Option<&Path> {
        self.primary.as_deref()
    }

    pub fn fallback_path(&self) -> Option<&Path> {
        self.fallback.as_deref()
    }

    /// Pristine entry-file text captured from the last hand-authored read.
    pub fn origin(&self) -> Option<&str> {
        self.record.origin_app_file.as_deref()
    }

    /// Replaces the stored original; the page map is untouched.
    pub fn capture_origin(&mut self, text: &str) {
        self.record.origin_app_file = Some(text.to_string());
    }

    /// Replaces the page map; the stored original is untouched.
    pub fn replace_pages(&mut self, pages: BTreeMap<String, StoredPage>) {
        self.record.pages = pages;
    }

    /// Writes the record, trying the project sidecar first.
    /// 寫入紀錄：先嘗試專案 sidecar，失敗時改用備援位置。
    pub fn save(&self) -> StorageLocation {
        let body = match serde_json::to_vec_pretty(&self.record) {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "failed to serialize selection record");
                return StorageLocation::Unsaved;
            }
        };

        if let Some(path) = &self.primary {
            match write_atomic(path, &body) {
                Ok(()) => {
                    debug!(path = %path.display(), "selection record saved");
                    self.discard_fallback();
                    return StorageLocation::Project(path.clone());
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "project sidecar not writable, using fallback");
                }
            }
        }

        if let Some(path) = &self.fallback {
            match write_atomic(path, &body) {
                Ok(()) => {
                    info!(path = %path.display(), "selection record saved to fallback location");
                    return StorageLocation::Fallback(path.clone());
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to save selection record");
                }
            }
        }
        StorageLocation::Unsaved
    }

    fn discard_fallback(&self) {
        let Some(path) = self.fallback.as_deref().filter(|path| path.exists()) else {
            return;
        };
        if let Err(err) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %err, "failed to remove stale fallback record");
        }
    }
}

struct StoredFile {
    modified: Option<SystemTime>,
    record: Option<SelectionRecord>,
}

fn read_record(path: &Path) -> Option<StoredFile> {
    let text = match read_optional(path) {
        Ok(text) => text?,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read selection record");
            return None;
        }
    };
    let modified = fs::metadata(path).and_then(|meta| meta.modified()).ok();
    let record = match serde_json::from_str::<SelectionRecord>(&text) {
        Ok(record) => {
            debug!(path = %path.display(), pages = record.pages.len(), "selection record loaded");
            Some(record)
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable selection record");
            None
        }
    };
    Some(StoredFile { modified, record })
}

/// Per-project fallback file: `<root>/projects/<hash>.json`, keyed on the canonical project path.
pub fn fallback_path(root: &Path, project: &Path) -> PathBuf {
    let canonical = project
        .canonicalize()
        .unwrap_or_else(|_| project.to_path_buf());
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    let hash_hex = format!("{:x}", hasher.finalize());
    root.join("projects").join(format!("{}.json", &hash_hex[..16]))
}
