use serde::{Deserialize, Serialize};

use super::{BookId, RegisterBookError};

const TITLE_MIN_CHARS: usize = 3;
const TITLE_MAX_CHARS: usize = 200;
const MIN_YEAR: i32 = 1900;
const ISBN_CHARS: usize = 13;

/// 書籍の状態
///
/// 貸出・返却の副作用としてのみ変化する。クライアントが直接変更することはない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    /// 貸出可能
    Available,
    /// 貸出中
    Loaned,
    /// 予約者への引き渡し待ち
    Reserved,
}

impl BookStatus {
    /// 文字列表現を取得する
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "available",
            BookStatus::Loaned => "loaned",
            BookStatus::Reserved => "reserved",
        }
    }

    /// 境界で使う整数コード
    pub fn code(&self) -> i16 {
        match self {
            BookStatus::Available => 0,
            BookStatus::Loaned => 1,
            BookStatus::Reserved => 2,
        }
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(BookStatus::Available),
            "loaned" => Ok(BookStatus::Loaned),
            "reserved" => Ok(BookStatus::Reserved),
            _ => Err(format!("Invalid book status: {}", s)),
        }
    }
}

/// 書籍（カタログが所有する）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: BookId,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub year: i32,
    pub status: BookStatus,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.status == BookStatus::Available
    }
}

/// 採番前の書籍
///
/// 状態を持たない。登録された書籍は常にAvailableから始まる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBook {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub year: i32,
}

impl NewBook {
    pub fn into_book(self, book_id: BookId) -> Book {
        Book {
            book_id,
            isbn: self.isbn,
            title: self.title,
            author: self.author,
            year: self.year,
            status: BookStatus::Available,
        }
    }
}

/// 書籍一覧の絞り込み条件（書名・著者は完全一致）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookQuery {
    pub title: Option<String>,
    pub author: Option<String>,
    pub status: Option<BookStatus>,
}

impl BookQuery {
    pub fn matches(&self, book: &Book) -> bool {
        self.title.as_ref().is_none_or(|t| &book.title == t)
            && self.author.as_ref().is_none_or(|a| &book.author == a)
            && self.status.is_none_or(|s| book.status == s)
    }
}

/// 純粋関数：登録する書籍を検証する
///
/// 前後の空白は取り除く。
pub fn register_book(
    isbn: &str,
    title: &str,
    author: &str,
    year: i32,
) -> Result<NewBook, RegisterBookError> {
    let isbn = isbn.trim();
    let title = title.trim();
    let author = author.trim();

    let title_chars = title.chars().count();
    if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&title_chars) {
        return Err(RegisterBookError::TitleLength(title_chars));
    }

    if author.is_empty() {
        return Err(RegisterBookError::MissingAuthor);
    }

    if year < MIN_YEAR {
        return Err(RegisterBookError::YearTooEarly(year));
    }

    let isbn_chars = isbn.chars().count();
    if isbn_chars != ISBN_CHARS {
        return Err(RegisterBookError::IsbnLength(isbn_chars));
    }

    Ok(NewBook {
        isbn: isbn.to_string(),
        title: title.to_string(),
        author: author.to_string(),
        year,
    })
}
