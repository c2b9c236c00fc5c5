use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Book, BookId, BookQuery, BookStatus, Loan, LoanStatus, Reservation, User, UserId, UserQuery,
};
use crate::ports::LoanQuery;

/// 書籍登録リクエスト（POST /books）
///
/// 状態は受け付けない。登録された書籍は常にavailable。
#[derive(Debug, Deserialize)]
pub struct RegisterBookRequest {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub year: i32,
}

/// 利用者登録リクエスト（POST /users）
#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub name: String,
    pub email: String,
}

/// 書籍一覧取得のクエリパラメータ（書名・著者は完全一致）
#[derive(Debug, Default, Deserialize)]
pub struct ListBooksQuery {
    pub title: Option<String>,
    pub author: Option<String>,
    /// available, loaned, reserved
    pub status: Option<String>,
}

impl ListBooksQuery {
    pub fn to_query(self) -> Result<BookQuery, String> {
        let status = self
            .status
            .as_deref()
            .map(str::parse::<BookStatus>)
            .transpose()?;

        Ok(BookQuery {
            title: self.title,
            author: self.author,
            status,
        })
    }
}

/// 利用者一覧取得のクエリパラメータ（部分一致）
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl From<ListUsersQuery> for UserQuery {
    fn from(query: ListUsersQuery) -> Self {
        Self {
            name: query.name,
            email: query.email,
        }
    }
}

/// 貸出作成リクエスト（POST /loans）
#[derive(Debug, Deserialize)]
pub struct BorrowBookRequest {
    pub book_id: i64,
    pub user_id: i64,
}

/// 予約リクエスト（POST /reservations）
#[derive(Debug, Deserialize)]
pub struct PlaceReservationRequest {
    pub book_id: i64,
    pub user_id: i64,
}

/// 貸出一覧取得のクエリパラメータ
#[derive(Debug, Default, Deserialize)]
pub struct ListLoansQuery {
    pub user_id: Option<i64>,
    pub book_id: Option<i64>,
    /// active, overdue, returned, handed_to_reservation
    pub status: Option<String>,
}

impl ListLoansQuery {
    pub fn to_query(&self) -> Result<LoanQuery, String> {
        let status = self
            .status
            .as_deref()
            .map(parse_status_filter)
            .transpose()?;

        Ok(LoanQuery {
            user_id: self.user_id.map(UserId::new),
            book_id: self.book_id.map(BookId::new),
            status,
        })
    }
}

/// 書籍レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct BookResponse {
    pub book_id: i64,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub year: i32,
    pub status: String,
    pub status_code: i16,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            book_id: book.book_id.value(),
            isbn: book.isbn,
            title: book.title,
            author: book.author,
            year: book.year,
            status: book.status.as_str().to_string(),
            status_code: book.status.code(),
        }
    }
}

/// 利用者レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub user_id: i64,
    pub name: String,
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id.value(),
            name: user.name,
            email: user.email,
        }
    }
}

/// 貸出レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanResponse {
    pub loan_id: i64,
    pub book_id: i64,
    pub user_id: i64,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: String,
    pub status_code: i16,
}

impl From<Loan> for LoanResponse {
    fn from(loan: Loan) -> Self {
        Self {
            loan_id: loan.loan_id.value(),
            book_id: loan.book_id.value(),
            user_id: loan.user_id.value(),
            borrowed_at: loan.borrowed_at,
            due_at: loan.due_at,
            returned_at: loan.returned_at,
            status: loan.status.as_str().to_string(),
            status_code: loan.status.code(),
        }
    }
}

/// 予約レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ReservationResponse {
    pub reservation_id: i64,
    pub book_id: i64,
    pub user_id: i64,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: String,
    pub status_code: i16,
}

impl From<Reservation> for ReservationResponse {
    fn from(reservation: Reservation) -> Self {
        Self {
            reservation_id: reservation.reservation_id.value(),
            book_id: reservation.book_id.value(),
            user_id: reservation.user_id.value(),
            reserved_at: reservation.reserved_at,
            expires_at: reservation.expires_at,
            status: reservation.status.as_str().to_string(),
            status_code: reservation.status.code(),
        }
    }
}

/// エラーレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// ステータスクエリパラメータのパースとバリデーション
pub fn parse_status_filter(status: &str) -> Result<LoanStatus, String> {
    status.parse::<LoanStatus>()
}
