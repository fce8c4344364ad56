//! Common API utilities and shared types

use serde::Deserialize;

use crate::models::ListParams;

pub fn default_page() -> u32 {
    1
}

pub fn default_page_size() -> u32 {
    10
}

/// `?page=&page_size=`; out-of-range values are clamped, not rejected.
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for PaginationQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PaginationQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.page_size)
    }
}

/// Trimmed, non-empty query string value
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_query_clamps() {
        let query = PaginationQuery {
            page: 0,
            page_size: 500,
        };
        let params = query.params();
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some(" rust ".into())).as_deref(), Some("rust"));
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(None), None);
    }
}
