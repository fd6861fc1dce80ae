//! Remote cursor pagination and local offset pagination behind one interface.

use super::favorites::FavoritesCache;
use super::source::ListRequest;
use crate::state::data::{Item, Page};
use crate::state::filters::Filters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationMode {
    /// Cursor-driven remote stream
    Remote,
    /// Offset-driven slices of the favorites cache
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteProgress {
    /// Nothing requested yet
    Fresh,
    /// Last page had this many items after filtering
    Advanced { last_page_len: usize },
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorState {
    Remote { token: Option<String>, progress: RemoteProgress },
    Local {
        offset: usize,
        /// Filtered favorites count, known once the first slice was taken
        filtered_len: Option<usize>,
        failed: bool,
    },
}

impl CursorState {
    fn fresh(mode: PaginationMode) -> Self {
        match mode {
            PaginationMode::Remote => CursorState::Remote { token: None, progress: RemoteProgress::Fresh },
            PaginationMode::Local => CursorState::Local { offset: 0, filtered_len: None, failed: false },
        }
    }
}

/// One slice of the favorites cache
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSlice {
    pub items: Vec<Item>,
    /// Filtered favorites left after this slice
    pub remaining: usize,
}

#[derive(Debug, Clone)]
pub struct PaginationController {
    cursor: CursorState,
    videos_time_budget_ms: u64,
}

impl PaginationController {
    pub fn new(mode: PaginationMode, videos_time_budget_ms: u64) -> Self {
        Self { cursor: CursorState::fresh(mode), videos_time_budget_ms }
    }

    /// Start over in `mode`
    pub fn reset(&mut self, mode: PaginationMode) {
        self.cursor = CursorState::fresh(mode);
    }

    pub fn mode(&self) -> PaginationMode {
        match self.cursor {
            CursorState::Remote { .. } => PaginationMode::Remote,
            CursorState::Local { .. } => PaginationMode::Local,
        }
    }

    pub fn cursor(&self) -> &CursorState {
        &self.cursor
    }

    pub fn has_more(&self) -> bool {
        match &self.cursor {
            CursorState::Remote { progress: RemoteProgress::Fresh, .. } => true,
            CursorState::Remote { token, progress: RemoteProgress::Advanced { last_page_len } } => {
                token.is_some() && *last_page_len > 0
            }
            CursorState::Remote { progress: RemoteProgress::Failed, .. } => false,
            CursorState::Local { failed: true, .. } => false,
            CursorState::Local { offset, filtered_len, .. } => filtered_len.map_or(true, |len| *offset < len),
        }
    }

    /// Request for the next remote page, if the remote stream has more
    pub fn remote_request(&self, filters: &Filters) -> Option<ListRequest> {
        match &self.cursor {
            CursorState::Remote { token, .. } if self.has_more() => {
                Some(ListRequest::new(filters.clone(), token.clone(), self.videos_time_budget_ms))
            }
            _ => None,
        }
    }

    /// Apply a remote page: filter it unless the server already did, then
    /// advance the token. Returns the surviving items.
    pub fn complete_remote(&mut self, page: Page, filters: &Filters) -> Vec<Item> {
        let mut items = page.items;
        if !page.pre_filtered {
            filters.retain(&mut items);
        }

        if let CursorState::Remote { token, progress } = &mut self.cursor {
            *token = page.continuation;
            *progress = RemoteProgress::Advanced { last_page_len: items.len() };
        }
        items
    }

    /// Take the next slice of the filtered favorites. `None` outside local mode.
    pub fn next_local_page(&mut self, favorites: &mut FavoritesCache, filters: &Filters) -> Option<LocalSlice> {
        let CursorState::Local { offset, filtered_len, .. } = &mut self.cursor else {
            return None;
        };

        let filtered: Vec<&Item> = favorites.materialize().iter().filter(|item| filters.admits(item)).collect();
        let batch = filters.effective_batch_size() as usize;

        let start = (*offset).min(filtered.len());
        let end = (start + batch).min(filtered.len());
        let items: Vec<Item> = filtered[start..end].iter().map(|item| (*item).clone()).collect();

        *offset = start + items.len();
        *filtered_len = Some(filtered.len());

        Some(LocalSlice { remaining: filtered.len() - *offset, items })
    }

    /// Record a failed request; the active source is exhausted until reset
    pub fn fail(&mut self) {
        match &mut self.cursor {
            CursorState::Remote { progress, .. } => *progress = RemoteProgress::Failed,
            CursorState::Local { failed, .. } => *failed = true,
        }
    }
}
