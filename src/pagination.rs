//! Pagination controller for listing views
//!
//! Pure functions map `(page, page_size, filters)` to canonical request
//! parameters and server totals to a clamped [`PaginationWindow`].
//! [`ListingState`] is the per-view owned state that drives them.

use crate::config::MAX_PAGE_SIZE;
use crate::resource::{QueryParams, ResourceKey, ResourceKind};

/// Filters applied to a listing. Only a free-text term is supported by the
/// backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Filters {
    search: Option<String>,
}

impl Filters {
    pub fn none() -> Self {
        Self::default()
    }

    /// Whitespace-only terms mean "no filter".
    pub fn search(term: &str) -> Self {
        let term = term.trim();
        Self {
            search: (!term.is_empty()).then(|| term.to_string()),
        }
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.search.is_none()
    }
}

pub fn clamp_page_size(page_size: u32) -> u32 {
    page_size.clamp(1, MAX_PAGE_SIZE)
}

/// Canonical parameters for one page. Out-of-range inputs are clamped, never
/// rejected: page 0 becomes 1 and the size is limited to `1..=100`.
pub fn build_request(page: u32, page_size: u32, filters: &Filters) -> QueryParams {
    let mut params = QueryParams::new()
        .with("page", page.max(1))
        .with("limit", clamp_page_size(page_size));
    if let Some(term) = filters.search_term() {
        params.insert("search", term);
    }
    params
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationWindow {
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

impl PaginationWindow {
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.total_pages
    }

    /// 1-based range of items on this page, `None` when the listing is empty.
    pub fn item_range(&self) -> Option<(u64, u64)> {
        if self.total_items == 0 {
            return None;
        }
        let first = u64::from(self.page - 1) * u64::from(self.page_size) + 1;
        let last = (first + u64::from(self.page_size) - 1).min(self.total_items);
        Some((first, last))
    }
}

/// Derive the window for a server-reported total.
/// `derive_window(47, 20, 10)` lands on page 3 of 3.
pub fn derive_window(total_items: u64, page_size: u32, requested_page: u32) -> PaginationWindow {
    let page_size = clamp_page_size(page_size);
    let total_pages = total_items.div_ceil(u64::from(page_size));
    let last_page = total_pages.max(1);
    // Bounded by `requested_page`, so it fits back into a u32.
    let page = u64::from(requested_page.max(1)).min(last_page) as u32;
    PaginationWindow {
        page,
        page_size,
        total_items,
        total_pages,
    }
}

/// What a view must do after a [`ListingState`] transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingChange {
    /// The request changed; subscribe to the new key.
    pub key_changed: bool,
    /// Cached data for the new key must not be shown; force a fresh fetch.
    pub invalidate: bool,
    pub scroll_to_top: bool,
}

impl ListingChange {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Owned paging state of one listing view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingState {
    kind: ResourceKind,
    page: u32,
    page_size: u32,
    filters: Filters,
    total: Option<u64>,
}

impl ListingState {
    pub fn new(kind: ResourceKind, page_size: u32) -> Self {
        Self {
            kind,
            page: 1,
            page_size: clamp_page_size(page_size),
            filters: Filters::none(),
            total: None,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.kind, build_request(self.page, self.page_size, &self.filters))
    }

    /// Window for the last observed total; `None` until a page has loaded.
    pub fn window(&self) -> Option<PaginationWindow> {
        self.total
            .map(|total| derive_window(total, self.page_size, self.page))
    }

    pub fn go_to(&mut self, page: u32) -> ListingChange {
        let target = match self.total {
            Some(total) => derive_window(total, self.page_size, page).page,
            None => page.max(1),
        };
        if target == self.page {
            return ListingChange::default();
        }
        self.page = target;
        ListingChange {
            key_changed: true,
            invalidate: false,
            scroll_to_top: true,
        }
    }

    pub fn next_page(&mut self) -> ListingChange {
        self.go_to(self.page.saturating_add(1))
    }

    pub fn prev_page(&mut self) -> ListingChange {
        self.go_to(self.page.saturating_sub(1))
    }

    pub fn set_page_size(&mut self, page_size: u32) -> ListingChange {
        let page_size = clamp_page_size(page_size);
        if page_size == self.page_size {
            return ListingChange::default();
        }
        self.page_size = page_size;
        self.page = 1;
        ListingChange {
            key_changed: true,
            invalidate: false,
            scroll_to_top: true,
        }
    }

    pub fn set_filters(&mut self, filters: Filters) -> ListingChange {
        if filters == self.filters {
            return ListingChange::default();
        }
        self.filters = filters;
        self.page = 1;
        self.total = None;
        ListingChange {
            key_changed: true,
            invalidate: true,
            scroll_to_top: true,
        }
    }

    /// Record the server total from a loaded page. If the listing shrank
    /// below the current page, moves to the last page.
    pub fn observe_total(&mut self, total: u64) -> ListingChange {
        self.total = Some(total);
        let clamped = derive_window(total, self.page_size, self.page).page;
        if clamped == self.page {
            return ListingChange::default();
        }
        self.page = clamped;
        ListingChange {
            key_changed: true,
            invalidate: false,
            scroll_to_top: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_window_clamps_past_end() {
        let w = derive_window(47, 20, 10);
        assert_eq!(w.page, 3);
        assert_eq!(w.total_pages, 3);
        assert_eq!(w.item_range(), Some((41, 47)));
        assert!(!w.has_next());
        assert!(w.has_prev());
    }

    #[test]
    fn test_derive_window_empty_listing() {
        let w = derive_window(0, 20, 5);
        assert_eq!(w.page, 1);
        assert_eq!(w.total_pages, 0);
        assert_eq!(w.item_range(), None);
        assert!(!w.has_next());
        assert!(!w.has_prev());
    }

    #[test]
    fn test_derive_window_page_zero() {
        assert_eq!(derive_window(100, 10, 0).page, 1);
        assert_eq!(derive_window(100, 0, 1).page_size, 1);
    }

    #[test]
    fn test_build_request_is_canonical() {
        let params = build_request(0, 500, &Filters::search("  abc "));
        assert_eq!(params.to_string(), "limit=100&page=1&search=abc");
        assert_eq!(build_request(2, 20, &Filters::search("   ")).to_string(), "limit=20&page=2");
    }

    #[test]
    fn test_page_size_change_resets_page() {
        let mut state = ListingState::new(ResourceKind::Blocks, 20);
        state.go_to(4);
        let change = state.set_page_size(50);
        assert!(change.key_changed);
        assert!(!change.invalidate);
        assert_eq!(state.page(), 1);
        assert!(state.set_page_size(50).is_noop());
    }

    #[test]
    fn test_filter_change_resets_and_invalidates() {
        let mut state = ListingState::new(ResourceKind::Blocks, 20);
        state.observe_total(200);
        state.go_to(5);
        let change = state.set_filters(Filters::search("0xab"));
        assert!(change.invalidate);
        assert_eq!(state.page(), 1);
        assert_eq!(state.window(), None);
        assert_eq!(state.key().params.get("search"), Some("0xab"));
        assert!(state.set_filters(Filters::search(" 0xab ")).is_noop());
    }

    #[test]
    fn test_navigation_scrolls_to_top() {
        let mut state = ListingState::new(ResourceKind::Transactions, 20);
        state.observe_total(47);
        assert!(state.next_page().scroll_to_top);
        assert!(state.next_page().scroll_to_top);
        // already on the last page
        assert!(state.next_page().is_noop());
        assert_eq!(state.page(), 3);
        assert!(state.prev_page().scroll_to_top);
        assert_eq!(state.page(), 2);
    }

    #[test]
    fn test_shrinking_total_clamps_page() {
        let mut state = ListingState::new(ResourceKind::Blocks, 10);
        state.observe_total(100);
        state.go_to(10);
        let change = state.observe_total(35);
        assert!(change.key_changed);
        assert_eq!(state.page(), 4);
    }
}
