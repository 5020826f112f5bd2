use serde::Serialize;

pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
}

impl Page {
    pub fn new(offset: Option<i64>, limit: Option<i64>) -> Self {
        let offset = offset.unwrap_or(0).max(0) as u64;
        let limit = limit
            .map(|l| l.clamp(1, MAX_LIMIT as i64) as u64)
            .unwrap_or(DEFAULT_LIMIT);
        Self { offset, limit }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDto<T: Serialize> {
    pub offset: u64,
    pub limit: u64,
    pub total_items: u64,
    pub items: Vec<T>,
}

impl<T: Serialize> PageDto<T> {
    pub fn new(page: Page, total_items: u64, items: Vec<T>) -> Self {
        Self {
            offset: page.offset,
            limit: page.limit,
            total_items,
            items,
        }
    }
}
