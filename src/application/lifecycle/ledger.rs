//! 貸出台帳
//!
//! 貸出レコードの作成と変更を担い、貸出単体の不変条件を守る。
//! 書籍の状態には触れない。

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::domain::{self, BookId, Loan, NewLoan, UserId};
use crate::ports::LoanRepository;

use super::errors::{LifecycleError, Result};

/// 新しい貸出を組み立てる
///
/// 前提条件（利用者・書籍の存在、書籍がAvailable、予約なし、有効な貸出なし）は
/// オーケストレーターが検証済みであること。
pub fn create_loan(book_id: BookId, user_id: UserId, now: DateTime<Utc>) -> Result<NewLoan> {
    domain::loan::create_loan(book_id, user_id, now)
        .map_err(|e| LifecycleError::Validation(format!("{:?}", e)))
}

/// 返却日時を記録する
///
/// 終端状態の貸出は変更せずに返す。
pub fn record_return(loan: &Loan, now: DateTime<Utc>) -> Result<Loan> {
    domain::loan::record_return(loan, now)
        .map_err(|e| LifecycleError::Validation(format!("{:?}", e)))
}

/// 書籍を占有している貸出を探す
pub async fn find_active_loan_for_book(
    loans: &Arc<dyn LoanRepository>,
    book_id: BookId,
) -> Result<Option<Loan>> {
    loans
        .find_open_for_book(book_id)
        .await
        .map_err(LifecycleError::LoanStoreError)
}

/// 延滞状態を再計算し、遷移した場合は保存する
///
/// 読み取り時に実行され、保存も伴う（定期バッチではない）。
/// 保存時に既に終端状態へ進んでいた場合は、保存されている貸出を返す。
pub async fn refresh_overdue_status(
    loans: &Arc<dyn LoanRepository>,
    loan: Loan,
    now: DateTime<Utc>,
) -> Result<Loan> {
    let refreshed = domain::loan::refresh_overdue_status(&loan, now);
    if refreshed.status == loan.status {
        return Ok(loan);
    }

    let transitioned = loans
        .mark_overdue(loan.loan_id)
        .await
        .map_err(LifecycleError::LoanStoreError)?;

    if transitioned {
        tracing::debug!(
            loan_id = %loan.loan_id,
            due_at = %loan.due_at,
            "Loan became overdue"
        );
        return Ok(refreshed);
    }

    // 並行する返却に先を越された
    let stored = loans
        .get_by_id(loan.loan_id)
        .await
        .map_err(LifecycleError::LoanStoreError)?;

    Ok(stored.unwrap_or(refreshed))
}
