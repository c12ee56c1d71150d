use crate::models::ContentPage;

/// Number of pages needed for `count` items, rounding up. Zero items need zero pages.
pub fn total_pages(count: usize, per_page: usize) -> usize {
    if per_page == 0 {
        return 0;
    }
    count.div_ceil(per_page)
}

/// Items of the 1-based `page`. Pages outside the range are empty.
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Vec<T> {
    if page == 0 || per_page == 0 {
        return Vec::new();
    }
    let start = (page - 1).saturating_mul(per_page);
    if start >= items.len() {
        return Vec::new();
    }
    let end = start.saturating_add(per_page).min(items.len());
    items[start..end].to_vec()
}

impl<T: Clone> ContentPage<T> {
    /// Cut `page` out of `items` and record the page count
    pub fn new(items: &[T], page: usize, per_page: usize) -> Self {
        Self {
            data: paginate(items, page, per_page),
            total_pages: total_pages(items.len(), per_page),
            current_page: page,
        }
    }
}
