use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;

/// 監控入口檔時可能回傳的錯誤。 / Error type for entry-file monitoring.
#[derive(Debug, Error)]
pub enum FileMonitorError {
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
    #[error("{0} has no parent directory to watch")]
    NoParent(PathBuf),
    #[error("monitor channel disconnected")]
    ChannelDisconnected,
}

/// 入口檔的變更種類。 / Change observed on the entry file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFileEvent {
    Changed,
    Removed,
}

/// 監看入口檔所在資料夾，只回報入口檔本身的事件。 /
/// Watches the entry file's directory (atomic writes replace the inode) and reports events for the entry file only.
pub struct EntryFileMonitor {
    _watcher: RecommendedWatcher,
    rx: Receiver<EntryFileEvent>,
}

impl EntryFileMonitor {
    /// 開始監看指定入口檔。 / Starts watching the given entry file.
    pub fn new(entry: impl AsRef<Path>) -> Result<Self, FileMonitorError> {
        let entry = entry.as_ref();
        let parent = entry
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .ok_or_else(|| FileMonitorError::NoParent(entry.to_path_buf()))?;
        let file_name = entry
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| FileMonitorError::NoParent(entry.to_path_buf()))?;

        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                if let Ok(event) = res {
                    if let Some(mapped) = map_event(event, &file_name) {
                        let _ = tx.send(mapped);
                    }
                }
            },
            Config::default(),
        )?;
        watcher.watch(parent, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// 阻塞直到收到事件。 / Blocks until the next event arrives.
    pub fn recv(&self) -> Result<EntryFileEvent, FileMonitorError> {
        self.rx
            .recv()
            .map_err(|_| FileMonitorError::ChannelDisconnected)
    }

    /// 在期限內等待事件，逾時回傳 `None`。 / Waits for an event until the timeout, returning `None` on timeout.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Option<EntryFileEvent>, FileMonitorError> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(FileMonitorError::ChannelDisconnected),
        }
    }

    /// 取出目前累積的事件並合併為一個。 / Drains queued events, collapsing bursts into one.
    pub fn drain(&self) -> Option<EntryFileEvent> {
        let mut last = None;
        while let Ok(event) = self.rx.try_recv() {
            last = Some(event);
        }
        last
    }
}

fn map_event(event: notify::Event, file_name: &OsString) -> Option<EntryFileEvent> {
    let touches_entry = event
        .paths
        .iter()
        .any(|path| path.file_name() == Some(file_name.as_os_str()));
    if !touches_entry {
        return None;
    }

    match event.kind {
        EventKind::Remove(_) => Some(EntryFileEvent::Removed),
        EventKind::Modify(ModifyKind::Name(mode)) => {
            let is_entry = |path: &PathBuf| path.file_name() == Some(file_name.as_os_str());
            let moved = match mode {
                RenameMode::From => true,
                RenameMode::To => false,
                // Paired events list the source first; a rename onto the entry path is how atomic writes land.
                _ => !event.paths.last().map_or(false, is_entry),
            };
            Some(if moved {
                EntryFileEvent::Removed
            } else {
                EntryFileEvent::Changed
            })
        }
        EventKind::Create(_) | EventKind::Modify(_) => Some(EntryFileEvent::Changed),
        _ => None,
    }
}
