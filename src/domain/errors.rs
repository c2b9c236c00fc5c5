use chrono::{DateTime, Duration, Utc};

/// 貸出日付の不整合
///
/// 貸出の作成時と返却の記録時に検査する。
/// 正しく組み立てられた貸出では発生しない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoanDateError {
    /// 貸出日が未来
    BorrowedInFuture {
        borrowed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },
    /// 返却期限が貸出日以前
    DueNotAfterBorrow {
        borrowed_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
    },
    /// 返却日が貸出日より前
    ReturnedBeforeBorrow {
        borrowed_at: DateTime<Utc>,
        returned_at: DateTime<Utc>,
    },
}

/// 予約作成のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceReservationError {
    /// 予約日が未来
    ReservedInFuture {
        reserved_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },
    /// 有効期限が予約日以前
    ExpiryNotAfterReservation {
        reserved_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
    /// 予約日 + 確保期間が表現できる日時を超える
    ExpiryOutOfRange {
        reserved_at: DateTime<Utc>,
        hold: Duration,
    },
}

/// 予約取消のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReservationError {
    /// 既に貸出に結びついている
    AlreadyFulfilled,
    /// 既に期限切れとして確定している
    AlreadyExpired,
}

/// 書籍登録のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterBookError {
    /// 書名が3文字未満または200文字超
    TitleLength(usize),
    /// 著者が空
    MissingAuthor,
    /// 出版年が1900年より前
    YearTooEarly(i32),
    /// ISBNが13文字でない
    IsbnLength(usize),
}

impl std::fmt::Display for RegisterBookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisterBookError::TitleLength(len) => {
                write!(f, "Title must be 3 to 200 characters (got {})", len)
            }
            RegisterBookError::MissingAuthor => f.write_str("Author is required"),
            RegisterBookError::YearTooEarly(year) => {
                write!(f, "Year must be 1900 or later (got {})", year)
            }
            RegisterBookError::IsbnLength(len) => {
                write!(f, "ISBN must be exactly 13 characters (got {})", len)
            }
        }
    }
}

/// 利用者登録のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterUserError {
    /// 名前が3文字未満
    NameTooShort(usize),
    /// メールアドレスの形式が不正
    InvalidEmail(String),
    /// メールアドレスが200文字超
    EmailTooLong(usize),
}

impl std::fmt::Display for RegisterUserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisterUserError::NameTooShort(len) => {
                write!(f, "Name must be at least 3 characters (got {})", len)
            }
            RegisterUserError::InvalidEmail(email) => write!(f, "Invalid email: {}", email),
            RegisterUserError::EmailTooLong(len) => {
                write!(f, "Email must be at most 200 characters (got {})", len)
            }
        }
    }
}
