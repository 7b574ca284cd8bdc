#![forbid(unsafe_code)]

use crate::error::TreeError;
use crate::filter::LeafFilter;
use crate::model::ReportNode;

/// Zero-based page index with a positive page size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    page_size: u32,
}

impl PageRequest {
    pub fn new(page: u64, page_size: u32) -> Result<Self, TreeError> {
        if page_size == 0 {
            return Err(TreeError::InvalidInput("page size must be positive"));
        }
        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Index of the first item; `None` when the page lies beyond any addressable item.
    pub fn offset(&self) -> Option<u64> {
        self.page.checked_mul(u64::from(self.page_size))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogQuery {
    pub filter: LeafFilter,
    pub page: PageRequest,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogPage {
    pub items: Vec<ReportNode>,
    /// Size of the filtered set, independent of the requested page.
    pub total_count: u64,
    pub page: PageRequest,
}

impl LogPage {
    pub fn empty(page: PageRequest) -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
            page,
        }
    }

    pub fn has_more(&self) -> bool {
        self.page
            .offset()
            .map(|offset| offset + (self.items.len() as u64) < self.total_count)
            .unwrap_or(false)
    }
}

/// Filters leaf rows (already ascending by order) and cuts one page out of the result.
pub fn paginate_leaves<'a, I>(rows: I, filter: &LeafFilter, page: PageRequest) -> LogPage
where
    I: IntoIterator<Item = &'a ReportNode>,
{
    let offset = page.offset();
    let page_size = page.page_size() as usize;
    let mut items = Vec::new();
    let mut total_count = 0u64;
    for row in rows {
        if !filter.matches(row) {
            continue;
        }
        if let Some(offset) = offset
            && total_count >= offset
            && items.len() < page_size
        {
            items.push(row.clone());
        }
        total_count += 1;
    }
    LogPage {
        items,
        total_count,
        page,
    }
}
