use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::response::ApiResponse;

/// One line that cannot be satisfied by current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StockShortage {
    pub product_id: Uuid,
    pub requested: i32,
    pub available: i32,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("{0}")]
    StateConflict(String),

    #[error("{0}")]
    VersionConflict(String),

    #[error("Insufficient stock for one or more items")]
    StockConflict(Vec<StockShortage>),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    SignatureInvalid(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        AppError::StateConflict(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::StateConflict(_)
            | AppError::VersionConflict(_)
            | AppError::StockConflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::SignatureInvalid(_) => StatusCode::UNAUTHORIZED,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Human readable one-liner, e.g. for logs and error detail strings.
pub fn summarize_shortages(shortages: &[StockShortage]) -> String {
    shortages
        .iter()
        .map(|s| {
            format!(
                "Product {}: requested {}, available {}",
                s.product_id, s.requested, s.available
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    conflicts: Option<Vec<StockShortage>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::DbError(err) => tracing::error!(error = %err, "database error"),
            AppError::OrmError(err) => tracing::error!(error = %err, "orm error"),
            AppError::Internal(err) => tracing::error!(error = %err, "internal error"),
            _ => {}
        }

        let (error, conflicts) = match &self {
            AppError::StockConflict(shortages) => {
                (summarize_shortages(shortages), Some(shortages.clone()))
            }
            _ => (self.to_string(), None),
        };

        let body = ApiResponse::failure(self.to_string(), ErrorData { error, conflicts });

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_map_to_409() {
        assert_eq!(AppError::state("x").status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::VersionConflict("x".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::StockConflict(vec![]).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::validation("x").status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            AppError::SignatureInvalid("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn summarizes_every_shortage() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let text = summarize_shortages(&[
            StockShortage { product_id: a, requested: 3, available: 1 },
            StockShortage { product_id: b, requested: 2, available: 0 },
        ]);
        assert_eq!(
            text,
            format!("Product {a}: requested 3, available 1; Product {b}: requested 2, available 0")
        );
    }
}
