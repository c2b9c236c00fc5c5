//! ライフサイクル・オーケストレーター
//!
//! 貸出台帳・予約キュー・カタログを順序立てて呼び出し、
//! 書籍の状態・貸出の状態・予約の状態が食い違わないようにする。
//! 書籍の状態を変更できるのはこのモジュールだけ。

use chrono::{DateTime, Duration, Utc};
use futures::future::try_join_all;
use std::sync::Arc;

use crate::domain::{
    self, BookStatus, Loan, LoanId, ReturnOutcome, commands::*,
    reservation::DEFAULT_HOLD_DAYS,
};
use crate::ports::*;

use super::errors::{LifecycleError, Result};
use super::{ledger, reservation_queue};

/// サービスの依存関係
///
/// 振る舞い（メソッド）は持たず、各関数に明示的に渡す。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub catalog: Arc<dyn Catalog>,
    pub identity: Arc<dyn Identity>,
    pub loans: Arc<dyn LoanRepository>,
    pub reservations: Arc<dyn ReservationRepository>,
    pub unit_of_work: Arc<dyn UnitOfWork>,
    /// 予約の確保期間
    pub reservation_hold: Duration,
}

impl ServiceDependencies {
    /// すべてのポートを1つのストアで満たす場合のヘルパー
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: Catalog + Identity + LoanRepository + ReservationRepository + UnitOfWork + 'static,
    {
        Self {
            catalog: store.clone(),
            identity: store.clone(),
            loans: store.clone(),
            reservations: store.clone(),
            unit_of_work: store,
            reservation_hold: Duration::days(DEFAULT_HOLD_DAYS),
        }
    }

    pub fn with_reservation_hold(self, reservation_hold: Duration) -> Self {
        Self {
            reservation_hold,
            ..self
        }
    }
}

/// 書籍を借りる
///
/// ビジネスルール：
/// - 利用者が存在すること
/// - 書籍が存在すること
/// - 書籍がAvailableであること
/// - 書籍に有効な予約がないこと（名目上Availableでも予約があれば貸し出さない）
/// - 書籍に有効な貸出がないこと
///
/// # 一貫性保証
///
/// 書籍の状態の比較・更新と貸出の登録は`UnitOfWork::commit_borrow`で1つの単位として行う。
/// 同じ書籍への並行した貸出は1件だけが成功し、残りは`BookNotAvailable`になる。
pub async fn borrow_book(deps: &ServiceDependencies, cmd: BorrowBook) -> Result<Loan> {
    // 1. 利用者の存在確認
    deps.identity
        .get_user(cmd.user_id)
        .await
        .map_err(LifecycleError::IdentityError)?
        .ok_or(LifecycleError::UserNotFound(cmd.user_id))?;

    // 2. 書籍の存在確認
    let book = deps
        .catalog
        .get_book(cmd.book_id)
        .await
        .map_err(LifecycleError::CatalogError)?
        .ok_or(LifecycleError::BookNotFound(cmd.book_id))?;

    // 3. 書籍の状態確認
    if !book.is_available() {
        tracing::warn!(book_id = %book.book_id, status = %book.status, "Book is not available");
        return Err(LifecycleError::BookNotAvailable {
            book_id: book.book_id,
            status: book.status,
        });
    }

    // 4. 予約の確認
    if reservation_queue::has_active_reservation(&deps.reservations, cmd.book_id, cmd.requested_at)
        .await?
    {
        tracing::warn!(book_id = %cmd.book_id, "Book has a pending reservation");
        return Err(LifecycleError::PendingReservation(cmd.book_id));
    }

    // 5. 有効な貸出の確認（3.から導かれるはずだが念のため）
    if let Some(open) = ledger::find_active_loan_for_book(&deps.loans, cmd.book_id).await? {
        tracing::warn!(book_id = %cmd.book_id, loan_id = %open.loan_id, "Book already has an open loan");
        return Err(LifecycleError::OpenLoanExists {
            book_id: cmd.book_id,
            loan_id: open.loan_id,
        });
    }

    // 6. 貸出を作成し、書籍の状態と合わせて確定
    let new_loan = ledger::create_loan(cmd.book_id, cmd.user_id, cmd.requested_at)?;

    let commit = deps
        .unit_of_work
        .commit_borrow(new_loan)
        .await
        .map_err(LifecycleError::UnitOfWorkError)?;

    match commit {
        BorrowCommit::Committed(loan) => {
            tracing::info!(
                loan_id = %loan.loan_id,
                book_id = %loan.book_id,
                user_id = %loan.user_id,
                due_at = %loan.due_at,
                "Book borrowed"
            );
            Ok(loan)
        }
        BorrowCommit::BookUnavailable(Some(status)) => {
            tracing::warn!(book_id = %cmd.book_id, status = %status, "Lost borrow race");
            Err(LifecycleError::BookNotAvailable {
                book_id: cmd.book_id,
                status,
            })
        }
        BorrowCommit::BookUnavailable(None) => Err(LifecycleError::BookNotFound(cmd.book_id)),
        BorrowCommit::OpenLoanExists(open) => Err(LifecycleError::OpenLoanExists {
            book_id: cmd.book_id,
            loan_id: open.loan_id,
        }),
    }
}

/// 書籍を返却する
///
/// 貸出が存在しない場合は`None`（エラーではない）。
/// 終端状態の貸出はそのまま返す（冪等）。
///
/// 次の有効な予約があれば貸出はHandedToReservation、書籍はReservedになる。
/// 予約自体はここでは履行済みにしない。なければ貸出はReturned、書籍はAvailableになる。
pub async fn return_loan(deps: &ServiceDependencies, cmd: ReturnLoan) -> Result<Option<Loan>> {
    // 1. 貸出の取得
    let Some(loan) = deps
        .loans
        .get_by_id(cmd.loan_id)
        .await
        .map_err(LifecycleError::LoanStoreError)?
    else {
        return Ok(None);
    };

    // 2. 終端状態なら何もしない
    if loan.status.is_terminal() {
        return Ok(Some(loan));
    }

    // 3. 書籍の存在確認（欠けていればデータ不整合）
    let book_exists = deps
        .catalog
        .book_exists(loan.book_id)
        .await
        .map_err(LifecycleError::CatalogError)?;

    if !book_exists {
        tracing::error!(loan_id = %loan.loan_id, book_id = %loan.book_id, "Loan references a missing book");
        return Err(LifecycleError::BookNotFound(loan.book_id));
    }

    // 4. 返却日時の記録
    let returned = ledger::record_return(&loan, cmd.returned_at)?;

    // 5. 次の予約の確認
    let next =
        reservation_queue::next_eligible_reservation(&deps.reservations, loan.book_id, cmd.returned_at)
            .await?;

    let (outcome, book_status) = match &next {
        Some(_) => (ReturnOutcome::HandedToReservation, BookStatus::Reserved),
        None => (ReturnOutcome::Returned, BookStatus::Available),
    };
    let closed = domain::loan::close_loan(&returned, outcome);

    // 6. 貸出と書籍をまとめて確定
    let commit = deps
        .unit_of_work
        .commit_return(&closed, book_status)
        .await
        .map_err(LifecycleError::UnitOfWorkError)?;

    match commit {
        ReturnCommit::Committed => {
            match &next {
                Some(reservation) => tracing::info!(
                    loan_id = %closed.loan_id,
                    book_id = %closed.book_id,
                    reservation_id = %reservation.reservation_id,
                    "Book returned and held for reservation"
                ),
                None => tracing::info!(
                    loan_id = %closed.loan_id,
                    book_id = %closed.book_id,
                    "Book returned"
                ),
            }
            Ok(Some(closed))
        }
        ReturnCommit::AlreadyClosed(status) => {
            tracing::debug!(loan_id = %loan.loan_id, status = %status, "Loan was closed concurrently");
            deps.loans
                .get_by_id(loan.loan_id)
                .await
                .map_err(LifecycleError::LoanStoreError)
        }
    }
}

/// IDで貸出を取得する
///
/// 返す前に延滞状態を再計算し、遷移した場合は保存する。
pub async fn get_loan(
    deps: &ServiceDependencies,
    loan_id: LoanId,
    now: DateTime<Utc>,
) -> Result<Option<Loan>> {
    let loan = deps
        .loans
        .get_by_id(loan_id)
        .await
        .map_err(LifecycleError::LoanStoreError)?;

    match loan {
        Some(loan) => Ok(Some(
            ledger::refresh_overdue_status(&deps.loans, loan, now).await?,
        )),
        None => Ok(None),
    }
}

/// 条件に合う貸出の一覧を取得する
///
/// 各貸出の延滞状態を再計算してから状態で絞り込むため、
/// Activeで絞り込んだ結果にこの読み取りでOverdueになった貸出は含まれない。
pub async fn list_loans(
    deps: &ServiceDependencies,
    query: LoanQuery,
    now: DateTime<Utc>,
) -> Result<Vec<Loan>> {
    // Active/Overdueは再計算で入れ替わるため、終端状態のみストアで絞り込む
    let store_query = LoanQuery {
        status: query.status.filter(|s| s.is_terminal()),
        ..query
    };

    let loans = deps
        .loans
        .list(store_query)
        .await
        .map_err(LifecycleError::LoanStoreError)?;

    let refreshed = try_join_all(
        loans
            .into_iter()
            .map(|loan| ledger::refresh_overdue_status(&deps.loans, loan, now)),
    )
    .await?;

    Ok(match query.status {
        Some(status) => refreshed
            .into_iter()
            .filter(|loan| loan.status == status)
            .collect(),
        None => refreshed,
    })
}
