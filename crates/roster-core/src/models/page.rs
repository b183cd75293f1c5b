use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use super::student::StudentSummary;

/// A 1-indexed page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Page(NonZeroU32);

impl Page {
    pub const FIRST: Page = Page(NonZeroU32::MIN);

    pub fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Page)
    }

    /// Page from a `page` query-string value. Absent, non-numeric and zero
    /// values all fall back to the first page.
    pub fn from_query(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().parse::<u32>().ok())
            .and_then(Page::new)
            .unwrap_or(Page::FIRST)
    }

    pub fn get(&self) -> u32 {
        self.0.get()
    }

    pub fn previous(&self) -> Option<Page> {
        Page::new(self.get() - 1)
    }

    pub fn next(&self) -> Page {
        Page(self.0.saturating_add(1))
    }

    pub fn has_previous(&self) -> bool {
        self.get() > 1
    }

    pub fn has_next(&self, total_pages: u32) -> bool {
        self.get() < total_pages
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::FIRST
    }
}

impl std::fmt::Display for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One page of the list endpoint together with the collection size reported
/// by the `x-total-count` header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentsPage {
    pub students: Vec<StudentSummary>,
    pub total_count: u64,
}

impl StudentsPage {
    pub fn total_pages(&self, page_size: u32) -> u32 {
        total_pages(self.total_count, page_size)
    }

    /// Page numbers to render as links, `1..=total_pages`.
    pub fn page_links(&self, page_size: u32) -> impl Iterator<Item = Page> {
        (1..=self.total_pages(page_size)).filter_map(Page::new)
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }
}

/// Parse the `x-total-count` header value, defaulting to 0 when the header is
/// missing or not a number.
pub fn total_count_from_header(value: Option<&str>) -> u64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

/// `ceil(total_count / page_size)`; 0 when there is nothing to page through.
pub fn total_pages(total_count: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total_count.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}
