use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based.
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Slices `items` into the requested 1-based page. Page 0 is treated as page 1
/// and pages past the end clamp to the last page.
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);

    let start = (page - 1) * per_page;
    let end = (start + per_page).min(total_items);

    Page {
        items: items[start..end].to_vec(),
        page,
        total_pages,
        total_items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_pages_of_five() {
        let items: Vec<u32> = (1..=12).collect();

        let first = paginate(&items, 1, DEFAULT_PAGE_SIZE);
        assert_eq!(first.items, vec![1, 2, 3, 4, 5]);
        assert_eq!(first.total_pages, 3);
        assert!(first.has_next());
        assert!(!first.has_previous());

        let last = paginate(&items, 3, DEFAULT_PAGE_SIZE);
        assert_eq!(last.items, vec![11, 12]);
        assert!(!last.has_next());
    }

    #[test]
    fn out_of_range_pages_clamp() {
        let items = vec!["a", "b", "c"];
        assert_eq!(paginate(&items, 0, 2).page, 1);
        let past_end = paginate(&items, 9, 2);
        assert_eq!(past_end.page, 2);
        assert_eq!(past_end.items, vec!["c"]);
    }

    #[test]
    fn empty_input_has_one_empty_page() {
        let page = paginate::<u8>(&[], 1, 5);
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.total_items, 0);
    }
}
