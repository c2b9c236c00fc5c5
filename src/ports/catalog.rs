use crate::domain::{Book, BookId, BookQuery, NewBook};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// カタログポート
///
/// 書籍レコードを保持する。
/// 書籍の状態の変更は貸出・返却と同じ単位で行う必要があるため、
/// このポートには含めず`UnitOfWork`が担う。
#[async_trait]
pub trait Catalog: Send + Sync {
    /// 書籍を登録し、採番された書籍（Available）を返す
    async fn create_book(&self, book: NewBook) -> Result<Book>;

    /// IDで書籍を取得する
    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>>;

    /// 書籍が存在するか確認する
    async fn book_exists(&self, book_id: BookId) -> Result<bool>;

    /// 条件に合う書籍を書籍IDの昇順で取得する
    async fn list_books(&self, query: BookQuery) -> Result<Vec<Book>>;
}
