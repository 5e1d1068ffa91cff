// src/middleware/i18n.rs

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};

const DEFAULT_LANG: &str = "en";

// Extrator de idioma: primeira língua do Accept-Language, sem região.
#[derive(Debug, Clone)]
pub struct Locale(pub String);

impl Default for Locale {
    fn default() -> Self {
        Locale(DEFAULT_LANG.to_string())
    }
}

impl Locale {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|header_value| header_value.to_str().ok())
            .and_then(|header_str| {
                accept_language::parse(header_str).first().map(|tag| {
                    // "pt-BR" -> "pt"
                    tag.split('-').next().unwrap_or(tag).to_lowercase()
                })
            })
            .map(Locale)
            .unwrap_or_default()
    }
}

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Locale::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn picks_the_preferred_language_without_region() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("fr-FR,fr;q=0.9,en;q=0.5"));
        assert_eq!(Locale::from_headers(&headers).0, "fr");
        assert_eq!(Locale::from_headers(&HeaderMap::new()).0, "en");
    }
}
