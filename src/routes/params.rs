use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::models::OrderStatus;

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    /// `(page, per_page, offset)` with page >= 1 and per_page in 1..=100.
    /// Out-of-range pages saturate instead of overflowing.
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1).saturating_mul(per_page);
        (page, per_page, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

// Query strings do not survive `#[serde(flatten)]` for numeric fields, so
// pagination is spelled out here.
#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<OrderStatus>,
    pub sort_order: Option<SortOrder>,
}

impl OrderListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_inputs() {
        let p = Pagination { page: Some(0), per_page: Some(1000) };
        assert_eq!(p.normalize(), (1, 100, 0));
        let p = Pagination { page: Some(3), per_page: None };
        assert_eq!(p.normalize(), (3, 20, 40));
    }

    #[test]
    fn huge_page_saturates_offset() {
        let p = Pagination { page: Some(i64::MAX), per_page: Some(100) };
        assert_eq!(p.normalize(), (i64::MAX, 100, i64::MAX));
        let p = Pagination { page: Some(i64::MIN), per_page: Some(-5) };
        assert_eq!(p.normalize(), (1, 1, 0));
    }

    #[test]
    fn order_query_parses_status_filter() {
        let q: OrderListQuery =
            serde_json::from_str(r#"{"page":2,"status":"paid","sort_order":"asc"}"#).unwrap();
        assert_eq!(q.status, Some(OrderStatus::Paid));
        assert_eq!(q.pagination().normalize(), (2, 20, 20));
        assert!(matches!(q.sort_order, Some(SortOrder::Asc)));
    }
}
