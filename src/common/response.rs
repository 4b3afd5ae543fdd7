// src/common/response.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

/// Success envelope: `{ "success": true, "data": ..., "message": ... }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, message: None, data, status: StatusCode::OK }
    }

    pub fn created(data: T) -> Self {
        Self { success: true, message: None, data, status: StatusCode::CREATED }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

// ---
// Pagination
// ---

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageParams {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page())
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * i64::from(self.per_page())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub last_page: u32,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, params: &PageParams) -> Self {
        let per_page = params.per_page();
        let total_pages = (total.max(0) as u64).div_ceil(u64::from(per_page));
        Self {
            items,
            total,
            page: params.page(),
            per_page,
            last_page: u32::try_from(total_pages).unwrap_or(u32::MAX).max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, None, 1, 20, 0)]
    #[case(Some(0), Some(10), 1, 10, 0)]
    #[case(Some(3), Some(10), 3, 10, 20)]
    #[case(Some(2), Some(1000), 2, 100, 100)]
    fn page_params_are_clamped(
        #[case] page: Option<u32>,
        #[case] per_page: Option<u32>,
        #[case] expected_page: u32,
        #[case] expected_per_page: u32,
        #[case] expected_offset: i64,
    ) {
        let params = PageParams { page, per_page };
        assert_eq!(params.page(), expected_page);
        assert_eq!(params.per_page(), expected_per_page);
        assert_eq!(params.offset(), expected_offset);
    }

    #[test]
    fn last_page_rounds_up_and_is_at_least_one() {
        let params = PageParams { page: None, per_page: Some(20) };
        assert_eq!(Paginated::<u8>::new(vec![], 41, &params).last_page, 3);
        assert_eq!(Paginated::<u8>::new(vec![], 0, &params).last_page, 1);
    }

    #[test]
    fn envelope_has_success_flag() {
        let body = serde_json::to_value(ApiResponse::ok(vec![1, 2])).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], serde_json::json!([1, 2]));
        assert!(body.get("message").is_none());
    }
}
