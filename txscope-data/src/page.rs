use serde::{Deserialize, Serialize};

use crate::error::DataError;

const DEFAULT_PER_PAGE: u64 = 20;

/// Pagination parameters. Pages are numbered from 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pageable {
    pub page: u64,
    pub per_page: u64,
    /// Cap applied to `per_page`.
    pub max_per_page: Option<u64>,
    /// Reject out-of-range input instead of clamping it.
    pub error_out: bool,
    /// Compute `total` and `pages`. When off, one extra row is fetched to
    /// decide `has_next`.
    pub count: bool,
}

impl Default for Pageable {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            max_per_page: None,
            error_out: false,
            count: true,
        }
    }
}

impl Pageable {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page,
            per_page,
            ..Self::default()
        }
    }

    pub fn without_count(mut self) -> Self {
        self.count = false;
        self
    }

    pub fn error_out(mut self) -> Self {
        self.error_out = true;
        self
    }

    pub fn max_per_page(mut self, max: u64) -> Self {
        self.max_per_page = Some(max);
        self
    }

    /// Validated `(page, per_page)`.
    pub(crate) fn normalized(&self) -> Result<(u64, u64), DataError> {
        let mut per_page = match self.max_per_page {
            Some(max) => self.per_page.min(max),
            None => self.per_page,
        };
        let mut page = self.page;
        if page < 1 {
            if self.error_out {
                return Err(DataError::Other("page must be >= 1".into()));
            }
            page = 1;
        }
        if per_page < 1 {
            if self.error_out {
                return Err(DataError::Other("per_page must be >= 1".into()));
            }
            per_page = DEFAULT_PER_PAGE;
        }
        Ok((page, per_page))
    }
}

/// A page of results with pagination metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    /// `None` when the page was fetched without counting.
    pub total: Option<u64>,
    pub pages: u64,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_num: Option<u64>,
    pub next_num: Option<u64>,
}

impl<T> Page<T> {
    /// Page over a fully counted result set.
    pub(crate) fn counted(items: Vec<T>, page: u64, per_page: u64, total: u64) -> Self {
        let pages = if total > 0 { total.div_ceil(per_page) } else { 0 };
        let has_next = page < pages;
        Self {
            items,
            page,
            per_page,
            total: Some(total),
            pages,
            has_prev: page > 1,
            has_next,
            prev_num: (page > 1).then(|| page - 1),
            next_num: has_next.then(|| page + 1),
        }
    }

    /// Page built from a `per_page + 1` lookahead fetch, without a count.
    pub(crate) fn uncounted(mut batch: Vec<T>, page: u64, per_page: u64) -> Self {
        let has_next = batch.len() as u64 > per_page && page < u64::MAX;
        batch.truncate(usize::try_from(per_page).unwrap_or(usize::MAX));
        Self {
            items: batch,
            page,
            per_page,
            total: None,
            pages: 0,
            has_prev: page > 1,
            has_next,
            prev_num: (page > 1).then(|| page - 1),
            next_num: has_next.then(|| page + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counted_page_metadata() {
        let page = Page::counted(vec![3, 4], 2, 2, 5);
        assert_eq!(page.pages, 3);
        assert!(page.has_prev && page.has_next);
        assert_eq!(page.prev_num, Some(1));
        assert_eq!(page.next_num, Some(3));

        let last = Page::counted(vec![5], 3, 2, 5);
        assert!(!last.has_next);
        assert_eq!(last.next_num, None);
    }

    #[test]
    fn empty_result_has_no_pages() {
        let page = Page::<i32>::counted(vec![], 1, 20, 0);
        assert_eq!(page.pages, 0);
        assert!(!page.has_prev && !page.has_next);
    }

    #[test]
    fn lookahead_detects_next_page() {
        let page = Page::uncounted(vec![1, 2, 3], 1, 2);
        assert_eq!(page.items, vec![1, 2]);
        assert!(page.has_next);
        assert_eq!(page.total, None);
    }

    #[test]
    fn uncounted_last_page_number_has_no_next() {
        let page = Page::uncounted(vec![1, 2], u64::MAX, 1);
        assert_eq!(page.items, vec![1]);
        assert!(!page.has_next);
        assert_eq!(page.next_num, None);
        assert_eq!(page.prev_num, Some(u64::MAX - 1));
    }

    #[test]
    fn out_of_range_input_is_clamped_or_rejected() {
        assert_eq!(Pageable::new(0, 0).normalized().unwrap(), (1, 20));
        assert_eq!(Pageable::new(2, 500).max_per_page(50).normalized().unwrap(), (2, 50));
        assert!(Pageable::new(0, 10).error_out().normalized().is_err());
    }
}
