use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use page_picker_settings::{write_atomic, EntryLayout, PickerSettings};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::app_config::AppConfig;
use crate::codec::{self, GenerationMarker, LocateError};
use crate::literal;

/// Errors raised while reading or writing the entry configuration.
/// 讀寫入口設定時可能出現的錯誤。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no entry file found under {0}")]
    EntryNotFound(PathBuf),
    #[error("{0} was generated by page-picker and no usable original is stored")]
    GeneratedWithoutBackup(PathBuf),
    #[error("no configuration declaration in {0}")]
    DeclarationMissing(PathBuf),
    #[error("{count} configuration declarations in {path}")]
    DeclarationAmbiguous { path: PathBuf, count: usize },
    #[error("malformed configuration in {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ConfigError {
    /// True for every outcome that means "this project has no usable configuration".
    /// 是否屬於「找不到設定」類別（可復原的空狀態）。
    pub fn is_not_found(&self) -> bool {
        !matches!(self, ConfigError::Write { .. })
    }
}

/// Where the returned configuration text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    EntryFile,
    Backup,
}

/// Configuration read from a project, together with the text it was parsed from.
/// 讀取到的設定及其來源文字。
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub entry: PathBuf,
    /// Pristine text the next write embeds into.
    pub scaffold: String,
    pub origin: ConfigOrigin,
}

impl LoadedConfig {
    /// Text that should become the stored original (only for hand-authored files).
    /// 需要保存為原始備份的文字（僅限非工具產生的檔案）。
    pub fn captured_origin(&self) -> Option<&str> {
        match self.origin {
            ConfigOrigin::EntryFile => Some(&self.scaffold),
            ConfigOrigin::Backup => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertOutcome {
    Reverted(PathBuf),
    NothingToRevert(RevertSkip),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertSkip {
    NoEntryFile,
    NoBackup,
    BackupIsGenerated,
    EntryNotGenerated,
}

/// Reads and writes the configuration declared in a project's entry file.
/// 負責專案入口檔設定物件的讀取與寫回。
#[derive(Debug, Clone)]
pub struct AppConfigProvider {
    source_root: PathBuf,
    layout: EntryLayout,
    suffixes: Vec<String>,
    marker: GenerationMarker,
    entry: Option<PathBuf>,
}

impl AppConfigProvider {
    pub fn new(project: &Path, settings: &PickerSettings, layout: EntryLayout) -> Self {
        Self {
            source_root: settings.source_root(project),
            layout,
            suffixes: settings.suffixes.clone(),
            marker: GenerationMarker::new(settings.marker_flag.clone()),
            entry: None,
        }
    }

    /// Tries every configured layout in order and keeps the first one that yields a configuration.
    /// 依序嘗試各種入口格式，採用第一個成功讀取設定者。
    pub fn detect(
        project: &Path,
        settings: &PickerSettings,
        backup: Option<&str>,
    ) -> Result<(Self, LoadedConfig), ConfigError> {
        let mut last_error = None;
        for layout in &settings.layouts {
            let mut provider = Self::new(project, settings, layout.clone());
            match provider.read_config(backup) {
                Ok(loaded) => {
                    debug!(entry = %loaded.entry.display(), ?layout, "configuration detected");
                    return Ok((provider, loaded));
                }
                Err(err) => {
                    debug!(?layout, error = %err, "layout rejected");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| ConfigError::EntryNotFound(settings.source_root(project))))
    }

    pub fn layout(&self) -> &EntryLayout {
        &self.layout
    }

    pub fn marker(&self) -> &GenerationMarker {
        &self.marker
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Entry file resolved by the last lookup.
    pub fn entry(&self) -> Option<&Path> {
        self.entry.as_deref()
    }

    /// Probes `<source>/<stem>.<suffix>` for each accepted suffix.
    /// 依副檔名順序尋找入口檔。
    pub fn find_entry_file(&mut self) -> Option<PathBuf> {
        let stem = self.layout.stem();
        let found = self
            .suffixes
            .iter()
            .map(|suffix| self.source_root.join(format!("{stem}.{suffix}")))
            .find(|candidate| candidate.is_file());
        self.entry = found.clone();
        found
    }

    /// Reads the configuration, substituting `backup` when the entry file is tool-generated.
    /// 讀取設定；若入口檔由工具產生則改用備份的原始內容。
    pub fn read_config(&mut self, backup: Option<&str>) -> Result<LoadedConfig, ConfigError> {
        let entry = self
            .find_entry_file()
            .ok_or_else(|| ConfigError::EntryNotFound(self.source_root.clone()))?;
        let text = fs::read_to_string(&entry).map_err(|source| ConfigError::Read {
            path: entry.clone(),
            source,
        })?;

        let (scaffold, origin) = if self.marker.is_marked(&text) {
            match backup {
                Some(original) if !self.marker.is_marked(original) => {
                    (original.to_string(), ConfigOrigin::Backup)
                }
                _ => return Err(ConfigError::GeneratedWithoutBackup(entry)),
            }
        } else {
            (text, ConfigOrigin::EntryFile)
        };

        let config = self.extract(&scaffold, &entry)?;
        Ok(LoadedConfig {
            config,
            entry,
            scaffold,
            origin,
        })
    }

    fn extract(&self, text: &str, entry: &Path) -> Result<AppConfig, ConfigError> {
        let span = codec::locate(text, &self.layout).map_err(|err| locate_error(err, entry))?;
        let value = literal::parse_at(text, span.start)
            .map(|(value, _)| value)
            .map_err(|err| ConfigError::Malformed {
                path: entry.to_path_buf(),
                reason: err.to_string(),
            })?;
        AppConfig::from_value(value).map_err(|reason| ConfigError::Malformed {
            path: entry.to_path_buf(),
            reason,
        })
    }

    /// Embeds `config` into `scaffold`, marks the result and writes it to the entry file.
    /// Returns the written text.
    /// 將設定嵌入原始內容、加上產生標記後寫入入口檔，並回傳寫入的文字。
    pub fn write_config(
        &mut self,
        config: &AppConfig,
        scaffold: &str,
    ) -> Result<String, ConfigError> {
        let entry = match self.entry.clone().or_else(|| self.find_entry_file()) {
            Some(entry) => entry,
            None => return Err(ConfigError::EntryNotFound(self.source_root.clone())),
        };
        let span = codec::locate(scaffold, &self.layout).map_err(|err| locate_error(err, &entry))?;
        let value = config.to_value().map_err(|err| ConfigError::Malformed {
            path: entry.clone(),
            reason: err.to_string(),
        })?;
        let contents = self.marker.wrap(&codec::embed(scaffold, span, &value));
        write_atomic(&entry, contents.as_bytes()).map_err(|source| ConfigError::Write {
            path: entry.clone(),
            source,
        })?;
        info!(entry = %entry.display(), pages = config.pages.len(), "entry configuration written");
        Ok(contents)
    }

    /// Restores the stored original when the entry file is tool-generated.
    /// 若入口檔為工具產生且備份可用，則還原原始內容。
    pub fn revert(&mut self, backup: Option<&str>) -> Result<RevertOutcome, ConfigError> {
        let Some(entry) = self.find_entry_file() else {
            return Ok(RevertOutcome::NothingToRevert(RevertSkip::NoEntryFile));
        };
        let Some(original) = backup else {
            warn!(entry = %entry.display(), "revert requested but no original is stored");
            return Ok(RevertOutcome::NothingToRevert(RevertSkip::NoBackup));
        };
        if self.marker.is_marked(original) {
            warn!(entry = %entry.display(), "stored original is itself generated; skipping revert");
            return Ok(RevertOutcome::NothingToRevert(RevertSkip::BackupIsGenerated));
        }
        let current = fs::read_to_string(&entry).map_err(|source| ConfigError::Read {
            path: entry.clone(),
            source,
        })?;
        if !self.marker.is_marked(&current) {
            return Ok(RevertOutcome::NothingToRevert(RevertSkip::EntryNotGenerated));
        }
        write_atomic(&entry, original.as_bytes()).map_err(|source| ConfigError::Write {
            path: entry.clone(),
            source,
        })?;
        info!(entry = %entry.display(), "entry file reverted to original");
        Ok(RevertOutcome::Reverted(entry))
    }

    /// Resolves the source file of a page (`<source>/<root><path>.<suffix>`).
    /// 找出頁面對應的原始碼檔案。
    pub fn page_source(&self, root: &str, path: &str) -> Option<PathBuf> {
        let base = self.source_root.join(format!("{root}{path}"));
        self.suffixes
            .iter()
            .map(|suffix| {
                let mut candidate = base.clone().into_os_string();
                candidate.push(".");
                candidate.push(suffix);
                PathBuf::from(candidate)
            })
            .find(|candidate| candidate.is_file())
    }
}

fn locate_error(err: LocateError, entry: &Path) -> ConfigError {
    match err {
        LocateError::Missing => ConfigError::DeclarationMissing(entry.to_path_buf()),
        LocateError::Ambiguous(count) => ConfigError::DeclarationAmbiguous {
            path: entry.to_path_buf(),
            count,
        },
        LocateError::Unterminated(_) => ConfigError::Malformed {
            path: entry.to_path_buf(),
            reason: err.to_string(),
        },
    }
}
