use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::response::ApiResponse;

/// One cart line that cannot be fulfilled from current stock.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StockShortage {
    pub product_id: Uuid,
    pub name: String,
    pub requested: i32,
    pub available: i32,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request: {0}")]
    BadRequest(String),

    /// A request field failed validation; the message names the field.
    #[error("{0}")]
    Validation(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Insufficient stock for {}", shortage_names(.0))]
    InsufficientStock(Vec<StockShortage>),

    #[error("Forbidden")]
    Forbidden,

    /// The checkout transaction failed for a reason the buyer cannot fix.
    /// Everything was rolled back; the detail stays in the server log.
    #[error("Checkout failed")]
    CheckoutFailed(#[source] sea_orm::DbErr),

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("Database error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

fn shortage_names(shortages: &[StockShortage]) -> String {
    shortages
        .iter()
        .map(|s| format!("{} (requested {}, available {})", s.name, s.requested, s.available))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    shortages: Option<Vec<StockShortage>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Validation(_) | AppError::EmptyCart => {
                StatusCode::BAD_REQUEST
            }
            AppError::InsufficientStock(_) => StatusCode::CONFLICT,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::CheckoutFailed(_)
            | AppError::DbError(_)
            | AppError::OrmError(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // 5xx detail is logged server-side only; the client sees the generic
        // display message.
        match &self {
            AppError::CheckoutFailed(err) => tracing::error!(error = %err, "checkout failed"),
            AppError::DbError(err) => tracing::error!(error = %err, "database error"),
            AppError::OrmError(err) => tracing::error!(error = %err, "orm error"),
            AppError::Internal(err) => tracing::error!(error = %err, "internal error"),
            _ => {}
        }

        let shortages = match &self {
            AppError::InsufficientStock(items) => Some(items.clone()),
            _ => None,
        };

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(ErrorData {
                error: self.to_string(),
                shortages,
            }),
            meta: None,
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
