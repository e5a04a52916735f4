/// One page of a filtered list.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a, T> {
    pub items: Vec<&'a T>,
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl<T> Page<'_, T> {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Client-side filtering and pagination over a fully fetched list.
#[derive(Debug, Clone)]
pub struct FilteredCollection<T> {
    items: Vec<T>,
    page_size: usize,
}

impl<T> Default for FilteredCollection<T> {
    fn default() -> Self {
        Self::new(Vec::new(), 10)
    }
}

impl<T> FilteredCollection<T> {
    pub fn new(items: Vec<T>, page_size: usize) -> Self {
        Self {
            items,
            page_size: page_size.max(1),
        }
    }

    pub fn replace(&mut self, items: Vec<T>) {
        self.items = items;
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut Vec<T> {
        &mut self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<&T> {
        self.items.iter().find(|item| predicate(item))
    }

    pub fn find_mut(&mut self, predicate: impl Fn(&T) -> bool) -> Option<&mut T> {
        self.items.iter_mut().find(|item| predicate(item))
    }

    pub fn remove_where(&mut self, predicate: impl Fn(&T) -> bool) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !predicate(item));
        before - self.items.len()
    }

    /// Filters with `predicate` and returns page `page` (1-based, clamped).
    pub fn page(&self, predicate: impl Fn(&T) -> bool, page: usize) -> Page<'_, T> {
        let matching: Vec<&T> = self.items.iter().filter(|item| predicate(item)).collect();
        let total_items = matching.len();
        let total_pages = total_items.div_ceil(self.page_size).max(1);
        let page = page.clamp(1, total_pages);
        let items = matching
            .into_iter()
            .skip((page - 1) * self.page_size)
            .take(self.page_size)
            .collect();
        Page {
            items,
            page,
            total_pages,
            total_items,
        }
    }
}

/// Case-insensitive substring match of `needle` against any haystack.
/// A blank needle matches everything.
pub fn matches_text<'a>(haystacks: impl IntoIterator<Item = &'a str>, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    haystacks
        .into_iter()
        .any(|haystack| haystack.to_lowercase().contains(&needle))
}
