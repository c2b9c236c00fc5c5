use thiserror::Error;

use crate::domain::{BookId, BookStatus, LoanId, ReservationId, UserId};

/// エラーの分類
///
/// API層はこの分類でHTTPステータスを決める。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 参照先が存在しない（クライアントエラー）
    NotFound,
    /// ビジネスルール違反（クライアントエラー）
    Conflict,
    /// クライアントが送った値が不正
    InvalidInput,
    /// 派生状態の不整合（サーバーエラー、黙って補正しない）
    Validation,
    /// 永続化層の障害
    Storage,
}

/// 貸出ライフサイクルのエラー
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// 利用者が存在しない
    #[error("User {0} not found")]
    UserNotFound(UserId),

    /// 書籍が存在しない
    #[error("Book {0} not found")]
    BookNotFound(BookId),

    /// 書籍が貸出可能な状態ではない
    #[error("Book {book_id} is not available for loan (status: {status})")]
    BookNotAvailable { book_id: BookId, status: BookStatus },

    /// 書籍に待っている予約がある
    #[error("Book {0} has a pending reservation")]
    PendingReservation(BookId),

    /// 書籍に有効な貸出が既にある
    #[error("Book {book_id} already has an open loan ({loan_id})")]
    OpenLoanExists { book_id: BookId, loan_id: LoanId },

    /// 同じ利用者の有効な予約が既にある
    #[error("User {user_id} already holds an active reservation for book {book_id}")]
    DuplicateReservation { book_id: BookId, user_id: UserId },

    /// 予約の状態が操作を許さない
    #[error("Invalid reservation state: {0}")]
    InvalidReservationState(String),

    /// 引き渡し待ちの書籍を確保している予約は取り消せない
    #[error("Reservation {reservation_id} holds book {book_id} for pickup")]
    ReservationHoldsBook {
        reservation_id: ReservationId,
        book_id: BookId,
    },

    /// メールアドレスが既に使われている
    #[error("Email {0} is already registered")]
    EmailTaken(String),

    /// 登録内容が不正
    #[error("{0}")]
    InvalidInput(String),

    /// 日付などの派生状態の不整合
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catalogのエラー
    #[error("Catalog error")]
    CatalogError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Identityのエラー
    #[error("Identity error")]
    IdentityError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// LoanRepositoryのエラー
    #[error("Loan store error")]
    LoanStoreError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// ReservationRepositoryのエラー
    #[error("Reservation store error")]
    ReservationStoreError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// UnitOfWorkのエラー
    #[error("Unit of work error")]
    UnitOfWorkError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::UserNotFound(_) | LifecycleError::BookNotFound(_) => {
                ErrorKind::NotFound
            }
            LifecycleError::BookNotAvailable { .. }
            | LifecycleError::PendingReservation(_)
            | LifecycleError::OpenLoanExists { .. }
            | LifecycleError::DuplicateReservation { .. }
            | LifecycleError::InvalidReservationState(_)
            | LifecycleError::ReservationHoldsBook { .. }
            | LifecycleError::EmailTaken(_) => ErrorKind::Conflict,
            LifecycleError::InvalidInput(_) => ErrorKind::InvalidInput,
            LifecycleError::Validation(_) => ErrorKind::Validation,
            LifecycleError::CatalogError(_)
            | LifecycleError::IdentityError(_)
            | LifecycleError::LoanStoreError(_)
            | LifecycleError::ReservationStoreError(_)
            | LifecycleError::UnitOfWorkError(_) => ErrorKind::Storage,
        }
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            LifecycleError::UserNotFound(UserId::new(1)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            LifecycleError::PendingReservation(BookId::new(6)).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            LifecycleError::ReservationHoldsBook {
                reservation_id: ReservationId::new(3),
                book_id: BookId::new(6),
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            LifecycleError::EmailTaken("ana@example.com".to_string()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            LifecycleError::InvalidInput("Author is required".to_string()).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            LifecycleError::Validation("bad dates".to_string()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            LifecycleError::LoanStoreError("connection reset".into()).kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn test_conflict_message_is_human_readable() {
        let err = LifecycleError::BookNotAvailable {
            book_id: BookId::new(5),
            status: BookStatus::Loaned,
        };
        assert_eq!(
            err.to_string(),
            "Book 5 is not available for loan (status: loaned)"
        );
    }
}
