//! Page navigation and the sliding window of page buttons.

/// Maximum number of page numbers shown at once.
pub const MAX_VISIBLE_PAGES: u32 = 5;

/// Pages on each side of the current page in a centered window.
const WINDOW_RADIUS: u32 = MAX_VISIBLE_PAGES / 2;

/// Current page and page count of a paged listing.
///
/// `current_page` always lies within `[1, max(total_pages, 1)]`. Every
/// mutator re-establishes that, including [`set_total_pages`](Self::set_total_pages),
/// so a total that shrinks out-of-band pulls the current page down with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
  current_page: u32,
  total_pages: u32,
}

impl Default for PaginationState {
  fn default() -> Self {
    Self::new(0)
  }
}

impl PaginationState {
  /// Start on the first page.
  pub fn new(total_pages: u32) -> Self {
    Self {
      current_page: 1,
      total_pages,
    }
  }

  pub fn current_page(&self) -> u32 {
    self.current_page
  }

  pub fn total_pages(&self) -> u32 {
    self.total_pages
  }

  /// Update the page count, clamping the current page if it fell off the end.
  pub fn set_total_pages(&mut self, total_pages: u32) {
    self.total_pages = total_pages;
    if self.current_page > self.last_valid_page() {
      self.current_page = self.last_valid_page();
    }
  }

  /// Jump to `target`, silently clamped into the valid range.
  pub fn go_to_page(&mut self, target: i64) {
    self.current_page = self.clamp(target);
  }

  pub fn next_page(&mut self) {
    if self.has_next_page() {
      self.current_page += 1;
    }
  }

  pub fn prev_page(&mut self) {
    if self.has_prev_page() {
      self.current_page -= 1;
    }
  }

  pub fn has_next_page(&self) -> bool {
    self.current_page < self.total_pages
  }

  pub fn has_prev_page(&self) -> bool {
    self.current_page > 1
  }

  /// Page numbers to render as buttons.
  ///
  /// Shows every page when there are at most [`MAX_VISIBLE_PAGES`]. Otherwise
  /// the window stays pinned to either edge until the current page is more
  /// than two pages away from it, then slides keeping the current page in the
  /// middle.
  pub fn visible_pages(&self) -> Vec<u32> {
    let total = self.total_pages;
    let current = self.current_page;

    let first = if total <= MAX_VISIBLE_PAGES || current <= WINDOW_RADIUS + 1 {
      1
    } else if current >= total - WINDOW_RADIUS {
      total - MAX_VISIBLE_PAGES + 1
    } else {
      current - WINDOW_RADIUS
    };
    let last = (first + MAX_VISIBLE_PAGES - 1).min(total);

    (first..=last).collect()
  }

  /// Zero-based index of the first item on the current page.
  pub fn offset(&self, per_page: u32) -> u64 {
    u64::from(self.current_page - 1) * u64::from(per_page)
  }

  /// Clamp an arbitrary page request into the valid range.
  pub fn clamp(&self, target: i64) -> u32 {
    target.clamp(1, i64::from(self.last_valid_page())) as u32
  }

  fn last_valid_page(&self) -> u32 {
    self.total_pages.max(1)
  }
}
