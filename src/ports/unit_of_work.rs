use crate::domain::{BookStatus, Loan, LoanStatus, NewLoan};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 貸出確定の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BorrowCommit {
    /// 貸出を登録し、書籍をLoanedにした
    Committed(Loan),
    /// 確定時点で書籍がAvailableでなかった
    BookUnavailable(Option<BookStatus>),
    /// 確定時点で書籍に有効な貸出が存在した
    OpenLoanExists(Loan),
}

/// 返却確定の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnCommit {
    /// 貸出を終了し、書籍の状態を更新した
    Committed,
    /// 確定時点で貸出が既に終端状態だった（並行する返却に先を越された）
    AlreadyClosed(LoanStatus),
}

/// 書籍と貸出をまとめて更新するポート
///
/// どちらの操作も単一のアトミックな単位として実行される。
/// 途中の状態（貸出は終了したが書籍はLoanedのまま、など）が他の読み取りから見えてはならない。
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// 書籍をAvailableからLoanedにし、貸出を登録する
    ///
    /// 書籍の状態の比較と更新は同じ単位の中で行われる。
    /// 同じ書籍への並行した貸出は、どちらか一方だけが`Committed`になる。
    async fn commit_borrow(&self, new_loan: NewLoan) -> Result<BorrowCommit>;

    /// 貸出を終了状態で保存し、書籍の状態を設定する
    ///
    /// 保存されている貸出がまだ Active か Overdue の場合のみ更新する。
    async fn commit_return(&self, closed_loan: &Loan, book_status: BookStatus)
    -> Result<ReturnCommit>;
}
