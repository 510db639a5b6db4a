//! Page selection model for mini-program entry configurations.
//! 小程式入口設定的頁面選取模型。

pub mod bridge;
pub mod builder;
pub mod selection;
pub mod session;
pub mod storage;
pub mod tree;
pub mod view;

pub use bridge::{to_filtered_config, to_storage_record};
pub use builder::build;
pub use selection::PageSelection;
pub use session::{EntryFileReaction, PickerSession, SaveReport, SessionError};
pub use storage::{fallback_path, SelectionRecord, SelectionStore, StorageLocation, StoredPage};
pub use tree::{Page, PageId, PageTree, PickCount, Scope, SubPackage, SubPackageId};
pub use view::{NodeDisplay, NodeRole, PickView, ViewEntry, ViewNode, EMPTY_PAGES_MESSAGE};
