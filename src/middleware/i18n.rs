// src/middleware/i18n.rs

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};

use crate::common::i18n::{I18nStore, DEFAULT_LANGUAGE};

/// Language of the caller, from `Accept-Language`. Only languages with a catalog are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(pub String);

impl Default for Locale {
    fn default() -> Self {
        Locale(DEFAULT_LANGUAGE.to_string())
    }
}

impl Locale {
    pub fn from_headers(headers: &HeaderMap, store: &I18nStore) -> Self {
        headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| {
                accept_language::parse(raw)
                    .into_iter()
                    // "es-MX" -> "es"
                    .map(|tag| tag.split('-').next().unwrap_or(tag.as_str()).to_lowercase())
                    .find(|lang| store.supports(lang))
            })
            .map(Locale)
            .unwrap_or_default()
    }
}

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Locale::from_headers(&parts.headers, I18nStore::global()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use rstest::rstest;

    #[rstest]
    #[case(Some("es-MX,es;q=0.9,en;q=0.8"), "es")]
    #[case(Some("de-DE,es;q=0.5"), "es")]
    #[case(Some("fr"), "en")]
    #[case(None, "en")]
    fn picks_first_supported_language(#[case] header: Option<&str>, #[case] expected: &str) {
        let mut headers = HeaderMap::new();
        if let Some(value) = header {
            headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_str(value).unwrap());
        }
        let store = I18nStore::load().unwrap();
        assert_eq!(Locale::from_headers(&headers, &store), Locale(expected.to_string()));
    }
}
