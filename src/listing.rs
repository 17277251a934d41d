use std::ops::RangeInclusive;

use serde::Serialize;

use crate::models::{Course, UserRecord};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_BUTTONS: usize = 5;

/// Fields a list search looks at, plus the value the category filter matches.
pub trait Searchable {
    fn search_fields(&self) -> Vec<&str>;
    fn category(&self) -> &str;
}

impl Searchable for UserRecord {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.email.as_str(), self.roll_number.as_str()]
    }

    fn category(&self) -> &str {
        &self.department
    }
}

impl Searchable for Course {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.code.as_str()]
    }

    fn category(&self) -> &str {
        &self.department
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    pub fn parse(value: &str) -> Self {
        if value == "all" {
            Self::All
        } else {
            Self::Only(value.to_string())
        }
    }

    pub fn matches(&self, category: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == category,
        }
    }
}

pub fn matches_search<T: Searchable>(item: &T, search: &str) -> bool {
    if search.is_empty() {
        return true;
    }
    let needle = search.to_lowercase();
    item.search_fields()
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

/// Items matching both the search and the category filter, in input order.
pub fn filter_items<'a, T: Searchable>(
    items: &'a [T],
    search: &str,
    category: &CategoryFilter,
) -> Vec<&'a T> {
    items
        .iter()
        .filter(|item| category.matches(item.category()) && matches_search(*item, search))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginationInfo {
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: PaginationInfo,
}

pub fn total_pages(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1))
}

/// 1-indexed page `items[(page-1)*size .. page*size]`, clamped to the list.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let start = (page - 1).saturating_mul(page_size).min(items.len());
    let end = page.saturating_mul(page_size).min(items.len());

    Page {
        items: items[start..end].to_vec(),
        pagination: PaginationInfo {
            page,
            page_size,
            total: items.len(),
            total_pages: total_pages(items.len(), page_size),
        },
    }
}

/// Page numbers to render as buttons: at most five, centred on `current`
/// and clamped at both ends.
pub fn page_window(current: usize, total_pages: usize) -> RangeInclusive<usize> {
    if total_pages <= MAX_PAGE_BUTTONS {
        return 1..=total_pages;
    }
    let half = MAX_PAGE_BUTTONS / 2;
    let current = current.clamp(1, total_pages);

    if current <= half + 1 {
        1..=MAX_PAGE_BUTTONS
    } else if current + half >= total_pages {
        (total_pages - MAX_PAGE_BUTTONS + 1)..=total_pages
    } else {
        (current - half)..=(current + half)
    }
}

/// Search, filter and page state of one list screen.
#[derive(Debug, Clone, PartialEq)]
pub struct ListView {
    search: String,
    category: CategoryFilter,
    page: usize,
    page_size: usize,
}

impl Default for ListView {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl ListView {
    pub fn new(page_size: usize) -> Self {
        Self {
            search: String::new(),
            category: CategoryFilter::All,
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
        self.page = 1;
    }

    pub fn set_category(&mut self, category: CategoryFilter) {
        self.category = category;
        self.page = 1;
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    pub fn apply<'a, T: Searchable>(&self, items: &'a [T]) -> Page<&'a T> {
        let filtered = filter_items(items, &self.search, &self.category);
        paginate(&filtered, self.page, self.page_size)
    }

    pub fn buttons<T: Searchable>(&self, items: &[T]) -> RangeInclusive<usize> {
        let filtered = filter_items(items, &self.search, &self.category);
        page_window(self.page, total_pages(filtered.len(), self.page_size))
    }
}
