//! Route modules.

pub mod health;
pub mod presets;
pub mod tasks;
pub mod webhooks;
pub mod ws;

use serde::Deserialize;

use crate::database::models::Pagination;

/// `?page=&perPage=` list parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_per_page() -> u32 {
    100
}

impl PageParams {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page.clamp(1, 1000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_defaults() {
        let params: PageParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.page, 0);
        assert_eq!(params.per_page, 100);
    }

    #[test]
    fn test_page_params_camel_case() {
        let params: PageParams = serde_json::from_str(r#"{"page": 2, "perPage": 10}"#).unwrap();
        let p = params.pagination();
        assert_eq!(p.offset(), 20);
        assert_eq!(p.limit(), 10);
    }
}
