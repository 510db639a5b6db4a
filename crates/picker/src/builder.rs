use std::collections::HashSet;

use page_picker_config::{AppConfig, SubPackageConfig};
use tracing::debug;

use crate::storage::SelectionRecord;
use crate::tree::{Page, PageId, PageTree, SubPackage, SubPackageId};

/// Builds the page tree for one configuration generation.
/// 由設定物件與既有選取紀錄建立頁面樹。
///
/// Tab bar membership forces `picked` regardless of the stored record. The stored
/// `entry` flag is honoured for main-package pages only.
pub fn build(config: &AppConfig, record: &SelectionRecord) -> PageTree {
    let tabbar: HashSet<&str> = config.tab_bar_paths().collect();
    let mut tree = PageTree::default();

    for path in unique(&config.pages) {
        let mut page = Page::new(path, None);
        derive_flags(&mut page, &tabbar, record, true);
        let id = push(&mut tree, page);
        tree.main.push(id);
    }

    let declared = config
        .sub_packages
        .as_deref()
        .filter(|subs| !subs.is_empty());
    if let Some(declared) = declared {
        let mut seen: Vec<&SubPackageConfig> = Vec::new();
        let mut subs = Vec::new();
        for sub in declared {
            if seen.contains(&sub) {
                continue;
            }
            seen.push(sub);

            let sub_id = SubPackageId(subs.len());
            let mut pages = Vec::new();
            for path in unique(&sub.pages) {
                let mut page = Page::new(path, Some((sub.root.as_str(), sub_id)));
                derive_flags(&mut page, &tabbar, record, false);
                pages.push(push(&mut tree, page));
            }
            subs.push(SubPackage {
                root: sub.root.clone(),
                pages,
                extra: sub.extra.clone(),
            });
        }
        tree.sub_packages = Some(subs);
    }

    debug!(
        pages = tree.pages.len(),
        sub_packages = tree.sub_packages().map_or(0, <[SubPackage]>::len),
        "page tree built"
    );
    tree
}

fn derive_flags(page: &mut Page, tabbar: &HashSet<&str>, record: &SelectionRecord, main: bool) {
    page.tabbar = tabbar.contains(page.path.as_str());
    page.picked = page.tabbar || record.is_picked(&page.id);
    page.entry = main && record.is_entry(&page.id);
}

fn push(tree: &mut PageTree, page: Page) -> PageId {
    tree.pages.push(page);
    PageId(tree.pages.len() - 1)
}

/// Paths in order of first occurrence.
fn unique(paths: &[String]) -> impl Iterator<Item = &str> {
    let mut seen = HashSet::new();
    paths
        .iter()
        .map(String::as_str)
        .filter(move |path| seen.insert(*path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoredPage;
    use crate::tree::Scope;
    use serde_json::json;

    fn config(value: serde_json::Value) -> AppConfig {
        AppConfig::from_value(value).unwrap()
    }

    fn record(entries: &[(&str, bool)]) -> SelectionRecord {
        let mut record = SelectionRecord::default();
        for (id, entry) in entries {
            record.pages.insert(
                id.to_string(),
                StoredPage {
                    id: id.to_string(),
                    picked: true,
                    entry: *entry,
                },
            );
        }
        record
    }

    fn page<'a>(tree: &'a PageTree, id: &str) -> &'a Page {
        tree.page(tree.find(id).unwrap()).unwrap()
    }

    #[test]
    fn tabbar_pages_are_always_picked() {
        let config = config(json!({
            "pages": ["a", "b"],
            "tabBar": { "list": [{ "pagePath": "b", "text": "B" }] }
        }));
        let tree = build(&config, &SelectionRecord::default());

        let a = page(&tree, "a");
        assert!(!a.is_picked() && !a.is_tabbar());
        let b = page(&tree, "b");
        assert!(b.is_picked() && b.is_tabbar());
        assert!(tree.sub_packages().is_none());
    }

    #[test]
    fn stored_record_restores_picks_and_entry() {
        let config = config(json!({ "pages": ["a", "b", "c"] }));
        let tree = build(&config, &record(&[("b", true), ("c", false), ("gone", false)]));

        assert!(!page(&tree, "a").is_picked());
        assert!(page(&tree, "b").is_entry());
        assert!(page(&tree, "c").is_picked());
        assert_eq!(tree.counts().picked, 2);
    }

    #[test]
    fn duplicates_are_dropped_in_declaration_order() {
        let config = config(json!({
            "pages": ["a", "b", "a"],
            "subPackages": [
                { "root": "pkg/", "pages": ["x", "y", "x"] },
                { "root": "pkg/", "pages": ["x", "y", "x"] },
                { "root": "other/", "pages": ["x"] }
            ]
        }));
        let tree = build(&config, &SelectionRecord::default());

        assert_eq!(tree.main_pages().len(), 2);
        let subs = tree.sub_packages().unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].pages().len(), 2);
        assert_eq!(page(&tree, "pkg/y").path(), "y");
        assert!(tree.find("other/x").is_some());
    }

    #[test]
    fn sub_package_pages_never_restore_entry() {
        let config = config(json!({
            "pages": ["a"],
            "subPackages": [{ "root": "pkg/", "pages": ["x"], "name": "pkg" }]
        }));
        let tree = build(&config, &record(&[("pkg/x", true)]));

        let x = page(&tree, "pkg/x");
        assert!(x.is_picked());
        assert!(!x.is_entry());
        let sub = tree.scope_of(tree.find("pkg/x").unwrap()).unwrap();
        assert!(matches!(sub, Scope::SubPackage(_)));
        assert_eq!(tree.sub_packages().unwrap()[0].extra()["name"], "pkg");
    }

    #[test]
    fn empty_sub_package_list_is_treated_as_absent() {
        let config = config(json!({ "pages": ["a"], "subPackages": [] }));
        let tree = build(&config, &SelectionRecord::default());
        assert!(tree.sub_packages().is_none());
    }
}
