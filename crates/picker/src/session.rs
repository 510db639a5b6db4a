//! One project's picker state: entry configuration, page tree and selection store.
//! 單一專案的選取工作階段：入口設定、頁面樹與選取紀錄。

use std::fs;
use std::path::{Path, PathBuf};

use page_picker_config::{
    AppConfig, AppConfigProvider, ConfigError, GenerationMarker, RevertOutcome, RevertSkip,
};
use page_picker_settings::PickerSettings;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bridge;
use crate::builder;
use crate::selection::PageSelection;
use crate::storage::{SelectionStore, StorageLocation};
use crate::tree::{PageId, Scope};
use crate::view::EMPTY_PAGES_MESSAGE;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no page configuration is loaded")]
    NotLoaded,
    #[error("the original entry file could not be stored; refusing to overwrite it")]
    OriginNotStored,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// What a change of the entry file led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFileReaction {
    /// Hand edit; the tree was rebuilt.
    Reloaded,
    /// The generated file was edited by someone else; nothing was reloaded.
    GeneratedFileEdited,
    /// The file still holds our last write.
    Unchanged,
}

/// Summary of a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub entry_file: PathBuf,
    pub pages: usize,
    pub sub_packages: usize,
    pub storage: StorageLocation,
}

#[derive(Debug)]
struct Loaded {
    provider: AppConfigProvider,
    config: AppConfig,
    scaffold: String,
    selection: PageSelection,
}

/// Explicitly owned picker session; nothing in it is global.
/// 明確建立並傳遞的工作階段物件。
#[derive(Debug)]
pub struct PickerSession {
    project: PathBuf,
    settings: PickerSettings,
    store: SelectionStore,
    loaded: Option<Loaded>,
    status: Option<String>,
    last_written: Option<String>,
    /// Whether the stored original has reached disk.
    origin_stored: bool,
}

impl PickerSession {
    /// Opens `project`. A missing or unreadable configuration gives a session
    /// without a tree and a status message.
    pub fn open(
        project: impl Into<PathBuf>,
        settings: PickerSettings,
        store: SelectionStore,
    ) -> Self {
        let origin_stored = store.origin().is_some();
        let mut session = Self {
            project: project.into(),
            settings,
            store,
            loaded: None,
            status: None,
            last_written: None,
            origin_stored,
        };
        session.reload();
        session
    }

    pub fn project(&self) -> &Path {
        &self.project
    }

    pub fn settings(&self) -> &PickerSettings {
        &self.settings
    }

    pub fn store(&self) -> &SelectionStore {
        &self.store
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// User-facing status: why there is no tree, or why it is empty.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn selection(&self) -> Option<&PageSelection> {
        self.loaded.as_ref().map(|loaded| &loaded.selection)
    }

    pub fn selection_mut(&mut self) -> Option<&mut PageSelection> {
        self.loaded.as_mut().map(|loaded| &mut loaded.selection)
    }

    pub fn entry_file(&self) -> Option<&Path> {
        self.loaded.as_ref().and_then(|loaded| loaded.provider.entry())
    }

    /// Re-reads the entry file and rebuilds the tree from the stored selection.
    /// 重新讀取入口檔並依儲存的選取紀錄重建頁面樹。
    pub fn reload(&mut self) -> bool {
        match AppConfigProvider::detect(&self.project, &self.settings, self.store.origin()) {
            Ok((provider, loaded)) => {
                if let Some(origin) = loaded.captured_origin() {
                    if self.store.origin() != Some(origin) {
                        self.store.capture_origin(origin);
                        self.origin_stored = self.store.save() != StorageLocation::Unsaved;
                        debug!(
                            entry = %loaded.entry.display(),
                            stored = self.origin_stored,
                            "original entry file captured"
                        );
                    }
                }
                let tree = builder::build(&loaded.config, self.store.record());
                let mut selection = PageSelection::new(tree);
                selection.materialize(Scope::Main, false);
                self.status = loaded
                    .config
                    .pages
                    .is_empty()
                    .then(|| EMPTY_PAGES_MESSAGE.to_string());
                info!(
                    entry = %loaded.entry.display(),
                    pages = selection.tree().counts().all,
                    "page tree loaded"
                );
                self.loaded = Some(Loaded {
                    provider,
                    config: loaded.config,
                    scaffold: loaded.scaffold,
                    selection,
                });
                true
            }
            Err(err) => {
                warn!(project = %self.project.display(), error = %err, "no page configuration");
                self.loaded = None;
                self.status = Some(format!("no page configuration found: {err}"));
                false
            }
        }
    }

    /// Persists the current pick state without touching the entry file.
    pub fn commit_selection(&mut self) -> StorageLocation {
        let Some(loaded) = self.loaded.as_ref() else {
            return StorageLocation::Unsaved;
        };
        let record = bridge::to_storage_record(loaded.selection.tree());
        self.store.replace_pages(record.pages);
        self.store.save()
    }

    /// Writes the picked pages into the entry file and stores the selection.
    /// 將已選頁面寫入入口檔並保存選取紀錄。
    /// Refuses to write while the captured original is not on disk.
    pub fn save(&mut self) -> Result<SaveReport, SessionError> {
        if self.loaded.is_none() {
            return Err(SessionError::NotLoaded);
        }
        if !self.origin_stored {
            self.origin_stored = self.store.save() != StorageLocation::Unsaved;
            if !self.origin_stored {
                return Err(SessionError::OriginNotStored);
            }
        }
        let loaded = self.loaded.as_mut().ok_or(SessionError::NotLoaded)?;
        let filtered = bridge::to_filtered_config(loaded.selection.tree(), &loaded.config);
        let written = loaded.provider.write_config(&filtered, &loaded.scaffold)?;
        let entry_file = loaded
            .provider
            .entry()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        self.last_written = Some(written);

        let record = bridge::to_storage_record(loaded.selection.tree());
        self.store.replace_pages(record.pages);
        let storage = self.store.save();
        Ok(SaveReport {
            entry_file,
            pages: filtered.pages.len(),
            sub_packages: filtered.sub_packages.as_ref().map_or(0, Vec::len),
            storage,
        })
    }

    /// Restores the stored original when the entry file is generated, then reloads.
    /// Works without a loaded tree, since a generated file whose original does not parse never loads.
    pub fn revert(&mut self) -> Result<RevertOutcome, SessionError> {
        let backup = self.store.origin().map(str::to_string);
        let outcome = match self.loaded.as_mut() {
            Some(loaded) => loaded.provider.revert(backup.as_deref())?,
            None => self.revert_unloaded(backup.as_deref())?,
        };
        if let RevertOutcome::Reverted(_) = outcome {
            self.last_written = None;
            self.reload();
        }
        Ok(outcome)
    }

    /// Tries each layout in order until one holds a generated entry file.
    fn revert_unloaded(&self, backup: Option<&str>) -> Result<RevertOutcome, ConfigError> {
        let mut outcome = RevertOutcome::NothingToRevert(RevertSkip::NoEntryFile);
        for layout in &self.settings.layouts {
            let mut provider =
                AppConfigProvider::new(&self.project, &self.settings, layout.clone());
            match provider.revert(backup)? {
                RevertOutcome::NothingToRevert(RevertSkip::NoEntryFile) => {}
                skipped @ RevertOutcome::NothingToRevert(RevertSkip::EntryNotGenerated) => {
                    outcome = skipped;
                }
                other => return Ok(other),
            }
        }
        Ok(outcome)
    }

    /// Reacts to an external change of the entry file.
    /// 入口檔被外部修改時的處理：手動編輯則重新載入，產生檔被改動則警告。
    pub fn on_entry_file_changed(&mut self) -> EntryFileReaction {
        let Some(entry) = self.entry_file().map(Path::to_path_buf) else {
            self.reload();
            return EntryFileReaction::Reloaded;
        };
        let text = match fs::read_to_string(&entry) {
            Ok(text) => text,
            Err(err) => {
                debug!(entry = %entry.display(), error = %err, "entry file unreadable");
                self.reload();
                return EntryFileReaction::Reloaded;
            }
        };

        let marker = GenerationMarker::new(self.settings.marker_flag.clone());
        if !marker.is_marked(&text) {
            self.reload();
            return EntryFileReaction::Reloaded;
        }
        if self.last_written.as_deref() == Some(text.as_str()) {
            return EntryFileReaction::Unchanged;
        }
        warn!(
            entry = %entry.display(),
            "generated entry file was edited; run `page-picker revert` before changing it by hand"
        );
        EntryFileReaction::GeneratedFileEdited
    }

    /// Source file of a page, if it exists.
    pub fn locate_page(&self, page: PageId) -> Option<PathBuf> {
        let loaded = self.loaded.as_ref()?;
        let tree = loaded.selection.tree();
        let page = tree.page(page)?;
        let root = page
            .parent()
            .and_then(|sub| tree.sub_package(sub))
            .map_or("", |sub| sub.root());
        loaded.provider.page_source(root, page.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    const APP_CONFIG: &str = "// app entry\nexport default defineAppConfig({\n  pages: ['a', 'b'],\n  tabBar: { list: [{ pagePath: 'b', text: 'B' }] },\n  preloadRule: { a: { packages: ['pkg/'] } },\n})\n";

    fn project() -> TempDir {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/app.config.ts"), APP_CONFIG).unwrap();
        dir
    }

    fn open(dir: &TempDir) -> PickerSession {
        let settings = PickerSettings::default();
        let store = SelectionStore::load(
            Some(settings.storage_path(dir.path())),
            Some(dir.path().join("state/fallback.json")),
        );
        PickerSession::open(dir.path(), settings, store)
    }

    fn entry_text(dir: &TempDir) -> String {
        fs::read_to_string(dir.path().join("src/app.config.ts")).unwrap()
    }

    #[test]
    fn open_captures_original_and_reports_missing_config() {
        let dir = project();
        let session = open(&dir);
        assert!(session.is_loaded());
        assert_eq!(session.store().origin(), Some(APP_CONFIG));
        assert!(session.status().is_none());

        let empty = tempdir().unwrap();
        let session = open(&empty);
        assert!(!session.is_loaded());
        assert!(session.status().unwrap().starts_with("no page configuration found"));
    }

    #[test]
    fn save_reload_and_revert() {
        let dir = project();
        let mut session = open(&dir);
        let sel = session.selection_mut().unwrap();
        let a = sel.tree().find("a").unwrap();
        sel.pick(a);
        sel.set_entry(a);

        let report = session.save().unwrap();
        assert_eq!(report.pages, 2);
        assert!(matches!(report.storage, StorageLocation::Project(_)));
        let written = entry_text(&dir);
        assert!(written.starts_with("/* PAGE-PICKER-GENERATED"));
        assert!(written.contains("// app entry\nexport default defineAppConfig({"));
        assert!(!written.contains("preloadRule"));
        assert_eq!(session.on_entry_file_changed(), EntryFileReaction::Unchanged);

        // A fresh session reads the original through the stored backup.
        let mut reopened = open(&dir);
        let sel = reopened.selection().unwrap();
        let a = sel.tree().find("a").unwrap();
        assert_eq!(sel.entry(), Some(a));
        assert_eq!(reopened.store().origin(), Some(APP_CONFIG));

        let outcome = reopened.revert().unwrap();
        assert!(matches!(outcome, RevertOutcome::Reverted(_)));
        assert_eq!(entry_text(&dir), APP_CONFIG);
        assert!(reopened.is_loaded());
    }

    #[test]
    fn edits_are_classified() {
        let dir = project();
        let mut session = open(&dir);
        session.save().unwrap();

        let entry = dir.path().join("src/app.config.ts");
        let tampered = format!("{}// tweak\n", entry_text(&dir));
        fs::write(&entry, tampered).unwrap();
        assert_eq!(
            session.on_entry_file_changed(),
            EntryFileReaction::GeneratedFileEdited
        );

        let hand_written = "export default { pages: ['a', 'b', 'c'] }\n";
        fs::write(&entry, hand_written).unwrap();
        assert_eq!(session.on_entry_file_changed(), EntryFileReaction::Reloaded);
        assert_eq!(session.store().origin(), Some(hand_written));
        assert_eq!(session.selection().unwrap().tree().counts().all, 3);
    }

    #[test]
    fn commit_selection_survives_reopen() {
        let dir = project();
        let mut session = open(&dir);
        let sel = session.selection_mut().unwrap();
        let a = sel.tree().find("a").unwrap();
        sel.pick(a);
        assert!(matches!(session.commit_selection(), StorageLocation::Project(_)));
        assert_eq!(entry_text(&dir), APP_CONFIG);

        let reopened = open(&dir);
        let sel = reopened.selection().unwrap();
        assert!(sel.tree().page(sel.tree().find("a").unwrap()).unwrap().is_picked());
    }

    #[test]
    fn revert_without_backup_is_a_no_op() {
        let dir = project();
        let settings = PickerSettings::default();
        let marker = GenerationMarker::new(settings.marker_flag.clone());
        fs::write(dir.path().join("src/app.config.ts"), marker.wrap(APP_CONFIG)).unwrap();

        let mut session = open(&dir);
        assert!(!session.is_loaded());
        assert_eq!(
            session.revert().unwrap(),
            RevertOutcome::NothingToRevert(RevertSkip::NoBackup)
        );
        assert!(matches!(session.save(), Err(SessionError::NotLoaded)));
    }

    #[test]
    fn save_refuses_without_a_stored_original() {
        let dir = project();
        let settings = PickerSettings::default();
        let primary = settings.storage_path(dir.path());
        let fallback = dir.path().join("state/fallback.json");
        // Directories in place of the temp files make both locations unwritable.
        let blockers = [
            dir.path().join(".vscode/page-picker.json.tmp"),
            dir.path().join("state/fallback.json.tmp"),
        ];
        for blocker in &blockers {
            fs::create_dir_all(blocker).unwrap();
        }

        let store = SelectionStore::load(Some(primary), Some(fallback));
        let mut session = PickerSession::open(dir.path(), settings, store);
        assert!(session.is_loaded());
        assert!(matches!(session.save(), Err(SessionError::OriginNotStored)));
        assert_eq!(entry_text(&dir), APP_CONFIG);

        for blocker in &blockers {
            fs::remove_dir(blocker).unwrap();
        }
        let report = session.save().unwrap();
        assert!(matches!(report.storage, StorageLocation::Project(_)));
        assert_eq!(open(&dir).store().origin(), Some(APP_CONFIG));
        assert!(matches!(open(&dir).revert().unwrap(), RevertOutcome::Reverted(_)));
        assert_eq!(entry_text(&dir), APP_CONFIG);
    }

    #[test]
    fn revert_finds_the_generated_file_behind_a_plain_app_tsx() {
        let dir = project();
        let app_tsx = "import Taro from '@tarojs/taro'\nclass App extends Component {\n  render () { return null }\n}\n";
        fs::write(dir.path().join("src/app.tsx"), app_tsx).unwrap();
        let settings = PickerSettings::default();
        let marker = GenerationMarker::new(settings.marker_flag.clone());
        fs::write(dir.path().join("src/app.config.ts"), marker.wrap(APP_CONFIG)).unwrap();
        // The stored original does not parse, so nothing loads.
        let original = "export default defineAppConfig({ pages: PAGES })\n";
        let record = serde_json::json!({ "pages": {}, "originAppFile": original });
        let primary = settings.storage_path(dir.path());
        page_picker_config::write_atomic(&primary, record.to_string().as_bytes()).unwrap();

        let mut session = open(&dir);
        assert!(!session.is_loaded());
        assert!(matches!(session.revert().unwrap(), RevertOutcome::Reverted(_)));
        assert_eq!(entry_text(&dir), original);
        assert_eq!(fs::read_to_string(dir.path().join("src/app.tsx")).unwrap(), app_tsx);
    }

    #[test]
    fn locate_page_resolves_source_files() {
        let dir = project();
        let page_file = dir.path().join("src/a.tsx");
        fs::write(&page_file, "").unwrap();
        let session = open(&dir);
        let a = session.selection().unwrap().tree().find("a").unwrap();
        assert_eq!(session.locate_page(a), Some(page_file));
    }
}
