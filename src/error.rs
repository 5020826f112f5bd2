use actix_web::{http::StatusCode, ResponseError};
use log::error;
use sea_orm::{DbErr, TransactionError};
use thiserror::Error;

use crate::response::response_from_error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Bad credentials at login.
    #[error("{0}")]
    AuthenticationFailed(String),
    /// Missing, invalid or expired token.
    #[error("{0}")]
    Unauthenticated(String),
    /// Valid caller, wrong principal.
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn param_error(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn authentication_failed() -> Self {
        Self::AuthenticationFailed("incorrect username or password".to_string())
    }

    pub fn need_login() -> Self {
        Self::Unauthenticated("please login first".to_string())
    }

    pub fn invalid_token() -> Self {
        Self::Unauthenticated("could not validate credentials".to_string())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn system_exception() -> Self {
        Self::Internal("system_exception".to_string())
    }

    /// Maps a failed write to `Conflict` when a unique constraint rejected it.
    pub fn conflict_on_unique(err: DbErr, msg: impl Into<String>) -> Self {
        if is_unique_violation(&err) {
            return Self::Conflict(msg.into());
        }
        err.into()
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::BadRequest(_) => 1,
            Self::Conflict(_) => 2,
            Self::AuthenticationFailed(_) | Self::Unauthenticated(_) => 3,
            Self::Forbidden(_) => 4,
            Self::NotFound(_) => 5,
            Self::Internal(_) => 99,
        }
    }

    pub fn msg(&self) -> &str {
        match self {
            Self::AuthenticationFailed(msg)
            | Self::Unauthenticated(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::BadRequest(msg)
            | Self::Internal(msg) => msg,
        }
    }
}

pub fn is_unique_violation(err: &DbErr) -> bool {
    let msg = err.to_string();
    msg.contains("UNIQUE") || msg.contains("Duplicate")
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        error!("storage failure: {}", err);
        Self::system_exception()
    }
}

impl From<TransactionError<AppError>> for AppError {
    fn from(err: TransactionError<AppError>) -> Self {
        match err {
            TransactionError::Connection(db) => db.into(),
            TransactionError::Transaction(app) => app,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthenticationFailed(_) | Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        response_from_error(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_kinds_map_to_distinct_statuses() {
        assert_eq!(AppError::need_login().status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::authentication_failed().status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::forbidden("no").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::not_found("no").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::conflict("no").status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::param_error("no").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::system_exception().status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unique_violation_becomes_conflict() {
        let err = DbErr::Custom("UNIQUE constraint failed: posts.slug".to_string());
        let mapped = AppError::conflict_on_unique(err, "slug already exists");
        assert!(matches!(mapped, AppError::Conflict(ref m) if m == "slug already exists"));

        let other = DbErr::Custom("disk I/O error".to_string());
        assert!(matches!(
            AppError::conflict_on_unique(other, "slug already exists"),
            AppError::Internal(_)
        ));
    }
}
