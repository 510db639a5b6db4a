use std::collections::BTreeMap;

use page_picker_config::{AppConfig, SubPackageConfig};

use crate::storage::{SelectionRecord, StoredPage};
use crate::tree::{PageTree, Scope};

/// Selection record holding only the picked pages. The stored original is left unset.
/// 只記錄已選取的頁面。
pub fn to_storage_record(tree: &PageTree) -> SelectionRecord {
    let pages: BTreeMap<String, StoredPage> = tree
        .iter()
        .filter(|(_, page)| page.is_picked())
        .map(|(_, page)| {
            (
                page.id().to_string(),
                StoredPage {
                    id: page.id().to_string(),
                    picked: true,
                    entry: page.is_entry(),
                },
            )
        })
        .collect();
    SelectionRecord {
        pages,
        origin_app_file: None,
    }
}

/// Configuration to embed: picked main pages (entry, tab bar, then the rest),
/// sub-packages trimmed to their picked pages, `preloadRule` dropped.
/// 產生寫回入口檔的設定：僅保留已選頁面並移除 preloadRule。
pub fn to_filtered_config(tree: &PageTree, original: &AppConfig) -> AppConfig {
    let mut config = original.clone();
    config.pages = tree
        .ordered(Scope::Main)
        .into_iter()
        .filter_map(|id| tree.page(id))
        .filter(|page| page.is_picked())
        .map(|page| page.path().to_string())
        .collect();

    config.sub_packages = tree.sub_packages().map(|subs| {
        subs.iter()
            .filter_map(|sub| {
                let pages: Vec<String> = sub
                    .pages()
                    .iter()
                    .filter_map(|id| tree.page(*id))
                    .filter(|page| page.is_picked())
                    .map(|page| page.path().to_string())
                    .collect();
                (!pages.is_empty()).then(|| SubPackageConfig {
                    root: sub.root().to_string(),
                    pages,
                    extra: sub.extra().clone(),
                })
            })
            .collect()
    });

    config.preload_rule = None;
    config
}
