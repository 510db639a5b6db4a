use std::fmt;

use serde_json::{Map, Value};

/// Index of a page inside one tree generation.
/// 頁面於單一世代樹中的索引。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub(crate) usize);

/// Index of a sub-package inside one tree generation.
/// 分包於單一世代樹中的索引。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubPackageId(pub(crate) usize);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page#{}", self.0)
    }
}

/// A group of pages that pick-all / unpick-all operate on.
/// 批次選取操作的範圍：主包或單一分包。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Main,
    SubPackage(SubPackageId),
}

/// Leaf page with its selection flags.
/// 帶有選取狀態的頁面節點。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub(crate) path: String,
    pub(crate) id: String,
    pub(crate) picked: bool,
    pub(crate) tabbar: bool,
    pub(crate) entry: bool,
    pub(crate) parent: Option<SubPackageId>,
}

impl Page {
    pub(crate) fn new(path: &str, root: Option<(&str, SubPackageId)>) -> Self {
        let (id, parent) = match root {
            Some((root, sub)) => (format!("{root}{path}"), Some(sub)),
            None => (path.to_string(), None),
        };
        Self {
            path: path.to_string(),
            id,
            picked: false,
            tabbar: false,
            entry: false,
            parent,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Persistence key: owning root followed by the page path.
    /// 持久化鍵值：所屬分包 root 加上頁面路徑。
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_picked(&self) -> bool {
        self.picked
    }

    pub fn is_tabbar(&self) -> bool {
        self.tabbar
    }

    pub fn is_entry(&self) -> bool {
        self.entry
    }

    pub fn parent(&self) -> Option<SubPackageId> {
        self.parent
    }

    pub(crate) fn bucket(&self) -> u8 {
        if self.entry {
            0
        } else if self.tabbar {
            1
        } else if self.picked {
            2
        } else {
            3
        }
    }
}

/// Named group of pages sharing a root prefix.
/// 共用 root 前綴的分包。
#[derive(Debug, Clone, PartialEq)]
pub struct SubPackage {
    pub(crate) root: String,
    pub(crate) pages: Vec<PageId>,
    pub(crate) extra: Map<String, Value>,
}

impl SubPackage {
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Pages in declaration order.
    pub fn pages(&self) -> &[PageId] {
        &self.pages
    }

    /// Keys of the sub-package entry other than `root` and `pages`.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

/// Picked / total counters.
/// 已選取數與總數。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PickCount {
    pub picked: usize,
    pub all: usize,
}

impl fmt::Display for PickCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}/{})", self.picked, self.all)
    }
}

/// Page tree for one configuration generation. Pages live in an arena; packages hold indices.
/// 單一設定世代的頁面樹；頁面存放於 arena，主包與分包僅保存索引。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageTree {
    pub(crate) pages: Vec<Page>,
    pub(crate) main: Vec<PageId>,
    pub(crate) sub_packages: Option<Vec<SubPackage>>,
}

impl PageTree {
    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.pages.get(id.0)
    }

    pub(crate) fn page_mut(&mut self, id: PageId) -> Option<&mut Page> {
        self.pages.get_mut(id.0)
    }

    /// Main-package pages in declaration order.
    pub fn main_pages(&self) -> &[PageId] {
        &self.main
    }

    /// `None` when the configuration declared no sub-packages.
    pub fn sub_packages(&self) -> Option<&[SubPackage]> {
        self.sub_packages.as_deref()
    }

    pub fn sub_package(&self, id: SubPackageId) -> Option<&SubPackage> {
        self.sub_packages.as_ref().and_then(|subs| subs.get(id.0))
    }

    pub fn sub_package_ids(&self) -> impl Iterator<Item = SubPackageId> + '_ {
        (0..self.sub_packages().map_or(0, <[SubPackage]>::len)).map(SubPackageId)
    }

    /// Pages directly under `scope`, in declaration order.
    /// 範圍內的頁面（宣告順序）。
    pub fn scope_pages(&self, scope: Scope) -> &[PageId] {
        match scope {
            Scope::Main => &self.main,
            Scope::SubPackage(sub) => self.sub_package(sub).map_or(&[], |sub| &sub.pages),
        }
    }

    pub fn scope_of(&self, page: PageId) -> Option<Scope> {
        let page = self.page(page)?;
        Some(match page.parent {
            Some(sub) => Scope::SubPackage(sub),
            None => Scope::Main,
        })
    }

    /// Every page, main package first, then sub-packages in order.
    pub fn iter(&self) -> impl Iterator<Item = (PageId, &Page)> {
        self.pages
            .iter()
            .enumerate()
            .map(|(index, page)| (PageId(index), page))
    }

    /// Looks a page up by its persistence id.
    /// 依持久化 id 查找頁面。
    pub fn find(&self, id: &str) -> Option<PageId> {
        self.iter().find(|(_, page)| page.id == id).map(|(id, _)| id)
    }

    pub fn find_sub_package(&self, root: &str) -> Option<SubPackageId> {
        self.sub_packages()?
            .iter()
            .position(|sub| sub.root == root)
            .map(SubPackageId)
    }

    pub fn counts(&self) -> PickCount {
        count(self.pages.iter())
    }

    pub fn scope_counts(&self, scope: Scope) -> PickCount {
        count(
            self.scope_pages(scope)
                .iter()
                .filter_map(|id| self.page(*id)),
        )
    }

    /// Pages of `scope` in display order: entry, tab bar, other picked, unpicked.
    /// The sort is stable, so declaration order holds within each group.
    /// 依顯示順序排列：entry、tabBar、其他已選、未選。
    pub fn ordered(&self, scope: Scope) -> Vec<PageId> {
        let mut ids = self.scope_pages(scope).to_vec();
        ids.sort_by_key(|id| self.page(*id).map_or(u8::MAX, Page::bucket));
        ids
    }
}

fn count<'a>(pages: impl Iterator<Item = &'a Page>) -> PickCount {
    pages.fold(PickCount::default(), |mut acc, page| {
        acc.all += 1;
        if page.picked {
            acc.picked += 1;
        }
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(path: &str, picked: bool, tabbar: bool, entry: bool) -> Page {
        let mut page = Page::new(path, None);
        page.picked = picked;
        page.tabbar = tabbar;
        page.entry = entry;
        page
    }

    #[test]
    fn ordered_groups_pages_and_keeps_declaration_order() {
        let tree = PageTree {
            pages: vec![
                page("u1", false, false, false),
                page("p1", true, false, false),
                page("t1", true, true, false),
                page("u2", false, false, false),
                page("e", true, false, true),
                page("p2", true, false, false),
            ],
            main: (0..6).map(PageId).collect(),
            sub_packages: None,
        };

        let paths: Vec<_> = tree
            .ordered(Scope::Main)
            .into_iter()
            .map(|id| tree.page(id).unwrap().path().to_string())
            .collect();
        assert_eq!(paths, vec!["e", "t1", "p1", "p2", "u1", "u2"]);
        assert_eq!(tree.counts(), PickCount { picked: 4, all: 6 });
    }

    #[test]
    fn sub_package_pages_carry_root_prefixed_ids() {
        let page = Page::new("pages/a", Some(("pkg/", SubPackageId(0))));
        assert_eq!(page.id(), "pkg/pages/a");
        assert_eq!(page.parent(), Some(SubPackageId(0)));
        assert_eq!(Page::new("pages/a", None).id(), "pages/a");
    }

    #[test]
    fn unknown_scope_is_empty() {
        let tree = PageTree::default();
        assert!(tree.scope_pages(Scope::SubPackage(SubPackageId(3))).is_empty());
        assert_eq!(tree.scope_counts(Scope::Main), PickCount::default());
    }
}
