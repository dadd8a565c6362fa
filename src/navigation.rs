use crate::model::FilterResult;

/// Where a navigation action wants to go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavTarget {
    Next,
    Prev,
    NextMatch,
    PrevMatch,
    GoTo(u32),
}

/// Cursor over the page catalog. Both page-number lists are strictly
/// ascending with unique elements and are rebuilt wholesale from every new
/// `FilterResult`, never patched incrementally.
#[derive(Debug, Default, Clone)]
pub struct NavigationState {
    current: Option<u32>,
    all_pages: Vec<u32>,
    matching_pages: Vec<u32>,
}

impl NavigationState {
    pub fn from_filter_result(result: &FilterResult) -> Self {
        let mut all_pages: Vec<u32> = result.pages.iter().map(|p| p.page_number).collect();
        all_pages.sort_unstable();
        all_pages.dedup();

        let mut matching_pages: Vec<u32> = result
            .pages
            .iter()
            .filter(|p| p.is_match())
            .map(|p| p.page_number)
            .collect();
        matching_pages.sort_unstable();
        matching_pages.dedup();

        Self {
            current: None,
            all_pages,
            matching_pages,
        }
    }

    pub fn current(&self) -> Option<u32> {
        self.current
    }

    pub fn all_pages(&self) -> &[u32] {
        &self.all_pages
    }

    pub fn matching_pages(&self) -> &[u32] {
        &self.matching_pages
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.all_pages.clear();
        self.matching_pages.clear();
    }

    fn position_in(list: &[u32], page: u32) -> Option<usize> {
        list.binary_search(&page).ok()
    }

    /// Resolve a target to the page it would land on, without moving.
    /// `None` means the action is a no-op from the current position.
    pub fn resolve(&self, target: NavTarget) -> Option<u32> {
        let current = self.current;
        match target {
            NavTarget::Next => {
                let pos = Self::position_in(&self.all_pages, current?)?;
                self.all_pages.get(pos + 1).copied()
            }
            NavTarget::Prev => {
                let pos = Self::position_in(&self.all_pages, current?)?;
                pos.checked_sub(1).and_then(|p| self.all_pages.get(p)).copied()
            }
            NavTarget::NextMatch => {
                let current = current?;
                match Self::position_in(&self.matching_pages, current) {
                    // Current page is itself a match: step within the match list.
                    Some(pos) => self.matching_pages.get(pos + 1).copied(),
                    // Otherwise jump to the nearest match strictly after.
                    None => self
                        .matching_pages
                        .iter()
                        .filter(|p| **p > current)
                        .min()
                        .copied(),
                }
            }
            NavTarget::PrevMatch => {
                let current = current?;
                match Self::position_in(&self.matching_pages, current) {
                    Some(pos) => pos
                        .checked_sub(1)
                        .and_then(|p| self.matching_pages.get(p))
                        .copied(),
                    None => self
                        .matching_pages
                        .iter()
                        .filter(|p| **p < current)
                        .max()
                        .copied(),
                }
            }
            NavTarget::GoTo(page) => {
                Self::position_in(&self.all_pages, page)?;
                Some(page)
            }
        }
    }

    /// Pure enablement check for navigation affordances; recomputed after
    /// every move, never cached.
    pub fn can_apply(&self, target: NavTarget) -> bool {
        self.resolve(target).is_some()
    }

    /// Move the cursor. Returns the new current page, or `None` if the
    /// action did not apply (cursor unchanged).
    pub fn apply(&mut self, target: NavTarget) -> Option<u32> {
        let destination = self.resolve(target)?;
        self.current = Some(destination);
        Some(destination)
    }

    /// Select a page directly (initial selection after a filter run).
    pub fn select(&mut self, page: u32) -> bool {
        if Self::position_in(&self.all_pages, page).is_some() {
            self.current = Some(page);
            true
        } else {
            false
        }
    }
}
