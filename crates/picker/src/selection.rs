//! Pick / unpick / entry operations over one page tree.
//! 頁面樹上的選取、取消選取與 entry 指定操作。
//!
//! Every operation either applies fully or leaves the tree untouched, and invalid
//! targets (tab bar pages, sub-package entries, stale ids) are ignored rather than
//! reported.

use std::collections::HashSet;

use tracing::debug;

use crate::tree::{PageId, PageTree, PickCount, Scope};

#[derive(Debug, Clone)]
pub struct PageSelection {
    tree: PageTree,
    entry: Option<PageId>,
    materialized: HashSet<Scope>,
}

impl PageSelection {
    /// Takes ownership of a freshly built tree; at most one main-package entry survives.
    pub fn new(mut tree: PageTree) -> Self {
        let mut entry = None;
        let ids: Vec<PageId> = tree.iter().map(|(id, _)| id).collect();
        for id in ids {
            let Some(page) = tree.page_mut(id) else {
                continue;
            };
            if !page.entry {
                continue;
            }
            if entry.is_none() && page.parent.is_none() && page.picked {
                entry = Some(id);
            } else {
                page.entry = false;
            }
        }
        Self {
            tree,
            entry,
            materialized: HashSet::new(),
        }
    }

    pub fn tree(&self) -> &PageTree {
        &self.tree
    }

    pub fn entry(&self) -> Option<PageId> {
        self.entry
    }

    pub fn counts(&self) -> PickCount {
        self.tree.counts()
    }

    /// Makes `page` the entry (and picks it). Sub-package pages are ignored.
    /// 指定 entry 頁面；分包頁面不可作為 entry。
    pub fn set_entry(&mut self, page: PageId) -> bool {
        match self.tree.page(page) {
            Some(target) if target.parent.is_none() => {
                if self.entry == Some(page) && target.entry && target.picked {
                    return false;
                }
            }
            _ => return false,
        }

        if let Some(previous) = self.entry.take() {
            if let Some(previous) = self.tree.page_mut(previous) {
                previous.entry = false;
            }
        }
        if let Some(target) = self.tree.page_mut(page) {
            target.picked = true;
            target.entry = true;
        }
        self.entry = Some(page);
        debug!(%page, "entry page changed");
        true
    }

    pub fn pick(&mut self, page: PageId) -> bool {
        match self.tree.page_mut(page) {
            Some(target) if !target.tabbar && !target.picked => {
                target.picked = true;
                true
            }
            _ => false,
        }
    }

    /// Unpicks `page`; when it held the entry, the next picked sibling takes over.
    /// 取消選取；若該頁為 entry，則由同層下一個已選頁面接手。
    pub fn unpick(&mut self, page: PageId) -> bool {
        let held_entry = self.entry == Some(page);
        let Some(target) = self.tree.page_mut(page) else {
            return false;
        };
        if target.tabbar || (!target.picked && !target.entry) {
            return false;
        }
        let lost_entry = held_entry || target.entry;
        target.picked = false;
        target.entry = false;
        if lost_entry {
            self.succeed_entry(page);
        }
        true
    }

    /// Picks every non-tab-bar page directly under `scope`. Returns how many changed.
    pub fn pick_all(&mut self, scope: Scope) -> usize {
        let ids = self.tree.scope_pages(scope).to_vec();
        let mut changed = 0;
        for id in ids {
            if self.pick(id) {
                changed += 1;
            }
        }
        changed
    }

    /// Unpicks every non-tab-bar page directly under `scope`, then runs entry
    /// succession once if one of them held the entry.
    pub fn unpick_all(&mut self, scope: Scope) -> usize {
        let ids = self.tree.scope_pages(scope).to_vec();
        let mut changed = 0;
        let mut lost_entry = None;
        for id in ids {
            let held_entry = self.entry == Some(id);
            let Some(page) = self.tree.page_mut(id) else {
                continue;
            };
            if page.tabbar {
                continue;
            }
            if held_entry || page.entry {
                lost_entry = Some(id);
            }
            if page.picked || page.entry {
                changed += 1;
            }
            page.picked = false;
            page.entry = false;
        }
        if let Some(from) = lost_entry {
            self.succeed_entry(from);
        }
        changed
    }

    /// Promotes the first picked page of `from`'s scope, in declaration order.
    fn succeed_entry(&mut self, from: PageId) {
        let scope = self.tree.scope_of(from).unwrap_or(Scope::Main);
        let next = self
            .tree
            .scope_pages(scope)
            .iter()
            .copied()
            .find(|id| self.tree.page(*id).map_or(false, |page| page.picked));
        self.entry = next;
        if let Some(next) = next {
            if let Some(page) = self.tree.page_mut(next) {
                page.entry = true;
            }
        }
        debug!(from = %from, to = ?next, "entry succession");
    }

    /// Pages of `scope` in display order. The first call per scope runs the entry
    /// bootstrap: with no entry, a picked first main-package page is promoted.
    /// 依顯示順序列出頁面；每個範圍第一次展開時執行 entry 自動指定。
    pub fn materialize(&mut self, scope: Scope, picked_only: bool) -> Vec<PageId> {
        if self.materialized.insert(scope) {
            self.bootstrap_entry(scope);
        }
        self.tree
            .ordered(scope)
            .into_iter()
            .filter(|id| {
                !picked_only || self.tree.page(*id).map_or(false, |page| page.picked)
            })
            .collect()
    }

    fn bootstrap_entry(&mut self, scope: Scope) {
        if self.entry.is_some() {
            return;
        }
        let Some(first) = self.tree.scope_pages(scope).first().copied() else {
            return;
        };
        let eligible = self
            .tree
            .page(first)
            .map_or(false, |page| page.picked && page.parent.is_none());
        if eligible {
            self.set_entry(first);
        }
    }
}
