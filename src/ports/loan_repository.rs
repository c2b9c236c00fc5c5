use crate::domain::{BookId, Loan, LoanId, LoanStatus, UserId};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 貸出一覧の検索条件
///
/// 指定されたフィールドのみで絞り込む。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoanQuery {
    pub user_id: Option<UserId>,
    pub book_id: Option<BookId>,
    pub status: Option<LoanStatus>,
}

/// 貸出リポジトリポート
///
/// 貸出の作成と、書籍状態を伴う終了は`UnitOfWork`が担う。
#[async_trait]
pub trait LoanRepository: Send + Sync {
    /// IDで貸出を取得する
    async fn get_by_id(&self, loan_id: LoanId) -> Result<Option<Loan>>;

    /// 条件に合う貸出をID昇順で取得する
    async fn list(&self, query: LoanQuery) -> Result<Vec<Loan>>;

    /// 書籍を占有している貸出（Active または Overdue）を取得する
    ///
    /// 「1冊につき有効な貸出は1件まで」の検査に使用される。
    async fn find_open_for_book(&self, book_id: BookId) -> Result<Option<Loan>>;

    /// Active の貸出を Overdue にする
    ///
    /// 保存されている状態がまだ Active の場合のみ更新し、更新したかどうかを返す。
    /// 並行する返却を上書きしないための条件付き更新。
    async fn mark_overdue(&self, loan_id: LoanId) -> Result<bool>;
}
