use crate::application::lifecycle::{ErrorKind, LifecycleError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーに加え、ハンドラー自身が判定する
/// 「対象が見つからない」「リクエストが不正」を表す。
#[derive(Debug)]
pub enum ApiError {
    Lifecycle(LifecycleError),
    LoanNotFound(i64),
    ReservationNotFound(i64),
    BadRequest(String),
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        ApiError::Lifecycle(err)
    }
}

impl ApiError {
    /// ErrorKindからHTTPステータスを決める
    fn status_for(kind: ErrorKind) -> StatusCode {
        match kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            // 派生状態の不整合はサーバー側の問題
            ErrorKind::Validation | ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn error_code(err: &LifecycleError) -> &'static str {
    match err {
        LifecycleError::UserNotFound(_) => "USER_NOT_FOUND",
        LifecycleError::BookNotFound(_) => "BOOK_NOT_FOUND",
        LifecycleError::BookNotAvailable { .. } => "BOOK_NOT_AVAILABLE",
        LifecycleError::PendingReservation(_) => "PENDING_RESERVATION",
        LifecycleError::OpenLoanExists { .. } => "OPEN_LOAN_EXISTS",
        LifecycleError::DuplicateReservation { .. } => "DUPLICATE_RESERVATION",
        LifecycleError::InvalidReservationState(_) => "INVALID_RESERVATION_STATE",
        LifecycleError::ReservationHoldsBook { .. } => "RESERVATION_HOLDS_BOOK",
        LifecycleError::EmailTaken(_) => "EMAIL_TAKEN",
        LifecycleError::InvalidInput(_) => "INVALID_INPUT",
        LifecycleError::Validation(_) => "VALIDATION_ERROR",
        LifecycleError::CatalogError(_) => "CATALOG_ERROR",
        LifecycleError::IdentityError(_) => "IDENTITY_ERROR",
        LifecycleError::LoanStoreError(_) => "LOAN_STORE_ERROR",
        LifecycleError::ReservationStoreError(_) => "RESERVATION_STORE_ERROR",
        LifecycleError::UnitOfWorkError(_) => "UNIT_OF_WORK_ERROR",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Lifecycle(err) => {
                let kind = err.kind();
                let code = error_code(&err);
                let message = match kind {
                    // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
                    ErrorKind::Storage => {
                        match std::error::Error::source(&err) {
                            Some(source) => tracing::error!("{}: {}", err, source),
                            None => tracing::error!("{}", err),
                        }
                        "Storage failure".to_string()
                    }
                    ErrorKind::Validation => {
                        tracing::error!("{}", err);
                        err.to_string()
                    }
                    ErrorKind::NotFound | ErrorKind::Conflict | ErrorKind::InvalidInput => {
                        err.to_string()
                    }
                };
                (ApiError::status_for(kind), code, message)
            }
            ApiError::LoanNotFound(id) => (
                StatusCode::NOT_FOUND,
                "LOAN_NOT_FOUND",
                format!("Loan {} not found", id),
            ),
            ApiError::ReservationNotFound(id) => (
                StatusCode::NOT_FOUND,
                "RESERVATION_NOT_FOUND",
                format!("Reservation {} not found", id),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
        };

        let body = Json(ErrorResponse::new(code, message));
        (status, body).into_response()
    }
}
