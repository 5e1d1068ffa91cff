use std::borrow::Cow;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query,
    },
    Json,
};
use validator::{ValidationError, ValidationErrors};

use crate::{
    common::error::{ApiError, AppError},
    middleware::i18n::Locale,
};

pub mod auth;
pub mod counterparties;
pub mod dashboard;
pub mod history;
pub mod inventory;
pub mod products;

// Rejeições do axum viram o mesmo VALIDATION_ERROR dos payloads
fn rejected(field: &'static str, detail: String, locale: &Locale) -> ApiError {
    let mut errors = ValidationErrors::new();
    errors.add(field, ValidationError::new("parse").with_message(Cow::Owned(detail)));
    AppError::ValidationError(errors).to_api_error(locale)
}

pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>, locale: &Locale) -> Result<T, ApiError> {
    body.map(|Json(payload)| payload)
        .map_err(|e| rejected("body", e.body_text(), locale))
}

pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>, locale: &Locale) -> Result<T, ApiError> {
    query
        .map(|Query(params)| params)
        .map_err(|e| rejected("query", e.body_text(), locale))
}
