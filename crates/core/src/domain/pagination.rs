use serde::Serialize;

/// `has_more` is always `current_page < total_pages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationState {
    current_page: u32,
    total_pages: u32,
    total_items: u64,
    page_size: u32,
    has_more: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageMeta {
    pub pages: Option<u32>,
    pub total: Option<u64>,
}

impl PaginationState {
    pub fn new(page_size: u32) -> Self {
        Self::from_parts(1, 0, 0, page_size)
    }

    fn from_parts(current_page: u32, total_pages: u32, total_items: u64, page_size: u32) -> Self {
        Self {
            current_page,
            total_pages,
            total_items,
            page_size,
            has_more: current_page < total_pages,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn total_items(&self) -> u64 {
        self.total_items
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn after_load(&self, meta: PageMeta, item_count: usize) -> Self {
        let total_pages = meta.pages.filter(|&p| p > 0).unwrap_or(1);
        let total_items = meta
            .total
            .filter(|&t| t > 0)
            .unwrap_or(item_count as u64);
        Self::from_parts(self.current_page, total_pages, total_items, self.page_size)
    }
}

impl Default for PaginationState {
    fn default() -> Self {
        Self::new(100)
    }
}
