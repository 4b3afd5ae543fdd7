// src/middleware/tenancy.rs

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use uuid::Uuid;

use crate::{
    common::{error::ApiError, i18n::I18nStore},
    middleware::i18n::Locale,
};

pub const TENANT_ID_HEADER: &str = "x-tenant-id";

/// The store a request targets, from the `X-Tenant-ID` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext(pub Uuid);

impl TenantContext {
    pub fn from_parts(parts: &Parts) -> Result<Self, ApiError> {
        let store = I18nStore::global();
        let reject = |code: &str| {
            let locale = Locale::from_headers(&parts.headers, store);
            ApiError::new(StatusCode::BAD_REQUEST, code, store.translate(&locale.0, code, &[]))
        };

        let value = parts
            .headers
            .get(TENANT_ID_HEADER)
            .ok_or_else(|| reject("TENANT_HEADER_MISSING"))?;
        let raw = value.to_str().map_err(|_| reject("TENANT_HEADER_INVALID"))?;
        let tenant_id = Uuid::parse_str(raw.trim()).map_err(|_| reject("TENANT_HEADER_INVALID"))?;
        Ok(TenantContext(tenant_id))
    }
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // The tenant guard already resolved it for back-office routes.
        if let Some(tenant) = parts.extensions.get::<TenantContext>() {
            return Ok(*tenant);
        }
        TenantContext::from_parts(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(tenant: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = tenant {
            builder = builder.header(TENANT_ID_HEADER, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn reads_the_header() {
        let id = Uuid::new_v4();
        let ctx = TenantContext::from_parts(&parts(Some(&id.to_string()))).unwrap();
        assert_eq!(ctx, TenantContext(id));
    }

    #[test]
    fn missing_and_invalid_headers_are_rejected() {
        let missing = TenantContext::from_parts(&parts(None)).unwrap_err();
        assert_eq!(missing.status, StatusCode::BAD_REQUEST);
        assert_eq!(missing.code, "TENANT_HEADER_MISSING");

        let invalid = TenantContext::from_parts(&parts(Some("store-1"))).unwrap_err();
        assert_eq!(invalid.code, "TENANT_HEADER_INVALID");
    }
}
