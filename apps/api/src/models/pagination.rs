use serde::{Deserialize, Serialize};

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

/// `?page=&limit=` query parameters with the original API's defaults.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl PageQuery {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) as i64 - 1) * self.limit as i64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageMeta {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

/// `{data, meta}` envelope used by all paginated list endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, query: PageQuery) -> Self {
        let limit = query.limit.max(1);
        Self {
            data,
            meta: PageMeta {
                total,
                page: query.page.max(1),
                limit,
                total_pages: (total + limit as i64 - 1) / limit as i64,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_for_first_page_is_zero() {
        let q = PageQuery { page: 1, limit: 10 };
        assert_eq!(q.offset(), 0);
    }

    #[test]
    fn test_offset_for_later_pages() {
        let q = PageQuery { page: 3, limit: 25 };
        assert_eq!(q.offset(), 50);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let p = Paginated::new(vec![1, 2, 3], 21, PageQuery { page: 1, limit: 10 });
        assert_eq!(p.meta.total_pages, 3);
    }

    #[test]
    fn test_total_pages_exact_division() {
        let p = Paginated::new(vec![0u8; 10], 20, PageQuery { page: 2, limit: 10 });
        assert_eq!(p.meta.total_pages, 2);
        assert_eq!(p.meta.page, 2);
    }

    #[test]
    fn test_empty_result_has_zero_pages() {
        let p: Paginated<u8> = Paginated::new(vec![], 0, PageQuery { page: 1, limit: 10 });
        assert_eq!(p.meta.total_pages, 0);
        assert_eq!(p.meta.total, 0);
    }
}
