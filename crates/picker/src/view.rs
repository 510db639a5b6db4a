//! Tree-view presentation of a page selection.
//! 頁面選取狀態的樹狀檢視模型。

use serde::Serialize;

use crate::selection::PageSelection;
use crate::tree::{Page, PageId, Scope, SubPackageId};

/// Message shown when the configuration declares no pages.
pub const EMPTY_PAGES_MESSAGE: &str = "the configuration declares no pages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Root,
    RootSub,
    Package,
    PageEntry,
    PageTabbar,
    PagePicked,
    PageUnpicked,
}

impl NodeRole {
    fn of(page: &Page) -> Self {
        if page.is_entry() {
            NodeRole::PageEntry
        } else if page.is_tabbar() {
            NodeRole::PageTabbar
        } else if page.is_picked() {
            NodeRole::PagePicked
        } else {
            NodeRole::PageUnpicked
        }
    }
}

/// Node handle understood by [`PickView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewNode {
    MainPackage,
    SubPackageList,
    SubPackage(SubPackageId),
    Page(PageId),
}

/// Display data for one node.
/// 節點的顯示資料。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeDisplay {
    pub role: NodeRole,
    pub label: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Fully expanded node, as printed by the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewEntry {
    #[serde(flatten)]
    pub display: NodeDisplay,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ViewEntry>,
}

/// Tree view over a [`PageSelection`], optionally restricted to picked pages.
/// 頁面樹檢視；可切換僅顯示已選頁面。
#[derive(Debug, Clone, Copy, Default)]
pub struct PickView {
    picked_only: bool,
}

impl PickView {
    pub fn new(picked_only: bool) -> Self {
        Self { picked_only }
    }

    pub fn picked_only(&self) -> bool {
        self.picked_only
    }

    pub fn set_picked_only(&mut self, picked_only: bool) {
        self.picked_only = picked_only;
    }

    /// `pages`, then `subPackages` when the configuration has any.
    pub fn roots(&self, selection: &PageSelection) -> Vec<ViewNode> {
        let mut roots = vec![ViewNode::MainPackage];
        if selection.tree().sub_packages().is_some() {
            roots.push(ViewNode::SubPackageList);
        }
        roots
    }

    /// Children of `node`; listing a package materializes its scope.
    /// 取得子節點；展開套件時會觸發 entry 自動指定。
    pub fn children(&self, selection: &mut PageSelection, node: ViewNode) -> Vec<ViewNode> {
        match node {
            ViewNode::MainPackage => self.pages(selection, Scope::Main),
            ViewNode::SubPackage(sub) => self.pages(selection, Scope::SubPackage(sub)),
            ViewNode::SubPackageList => {
                let tree = selection.tree();
                tree.sub_package_ids()
                    .filter(|sub| {
                        !self.picked_only
                            || tree.scope_counts(Scope::SubPackage(*sub)).picked > 0
                    })
                    .map(ViewNode::SubPackage)
                    .collect()
            }
            ViewNode::Page(_) => Vec::new(),
        }
    }

    fn pages(&self, selection: &mut PageSelection, scope: Scope) -> Vec<ViewNode> {
        selection
            .materialize(scope, self.picked_only)
            .into_iter()
            .map(ViewNode::Page)
            .collect()
    }

    pub fn display(&self, selection: &PageSelection, node: ViewNode) -> Option<NodeDisplay> {
        let tree = selection.tree();
        let display = match node {
            ViewNode::MainPackage => NodeDisplay {
                role: NodeRole::Root,
                label: "pages".to_string(),
                description: tree.scope_counts(Scope::Main).to_string(),
                id: None,
            },
            ViewNode::SubPackageList => NodeDisplay {
                role: NodeRole::RootSub,
                label: "subPackages".to_string(),
                description: format!("({})", tree.sub_packages()?.len()),
                id: None,
            },
            ViewNode::SubPackage(sub) => NodeDisplay {
                role: NodeRole::Package,
                label: tree.sub_package(sub)?.root().to_string(),
                description: tree.scope_counts(Scope::SubPackage(sub)).to_string(),
                id: None,
            },
            ViewNode::Page(page) => {
                let page = tree.page(page)?;
                NodeDisplay {
                    role: NodeRole::of(page),
                    label: page.path().to_string(),
                    description: String::new(),
                    id: Some(page.id().to_string()),
                }
            }
        };
        Some(display)
    }

    /// Overall `(picked/all)` counter, or `None` for an empty tree.
    pub fn summary(&self, selection: &PageSelection) -> Option<String> {
        let counts = selection.counts();
        (counts.all > 0).then(|| counts.to_string())
    }

    /// Expands every node.
    /// 展開整棵樹。
    pub fn snapshot(&self, selection: &mut PageSelection) -> Vec<ViewEntry> {
        self.roots(selection)
            .into_iter()
            .filter_map(|node| self.expand(selection, node))
            .collect()
    }

    fn expand(&self, selection: &mut PageSelection, node: ViewNode) -> Option<ViewEntry> {
        let children = self
            .children(selection, node)
            .into_iter()
            .filter_map(|child| self.expand(selection, child))
            .collect();
        Some(ViewEntry {
            display: self.display(selection, node)?,
            children,
        })
    }
}
