use crate::domain::{BookStatus, Loan, LoanStatus, NewLoan};
use crate::ports::unit_of_work::{
    BorrowCommit, ReturnCommit, Result, UnitOfWork as UnitOfWorkTrait,
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::str::FromStr;

use super::invalid_data;
use super::loan_repository::map_row_to_loan;

/// UnitOfWorkのPostgreSQL実装
///
/// 各操作を1つのトランザクションで実行する。
/// 書籍行・貸出行は`SELECT ... FOR UPDATE`でロックしてから検査するため、
/// 並行する貸出・返却は直列化される。
/// トランザクションはcommitされずにドロップされるとロールバックされる。
pub struct UnitOfWork {
    pool: PgPool,
}

impl UnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWorkTrait for UnitOfWork {
    async fn commit_borrow(&self, new_loan: NewLoan) -> Result<BorrowCommit> {
        let mut tx = self.pool.begin().await?;

        // 1. 書籍行をロックして状態を確認
        let book_status: Option<String> =
            sqlx::query_scalar("SELECT status FROM books WHERE id = $1 FOR UPDATE")
                .bind(new_loan.book_id.value())
                .fetch_optional(&mut *tx)
                .await?;

        let Some(book_status) = book_status else {
            return Ok(BorrowCommit::BookUnavailable(None));
        };
        let book_status = BookStatus::from_str(&book_status).map_err(invalid_data)?;
        if book_status != BookStatus::Available {
            return Ok(BorrowCommit::BookUnavailable(Some(book_status)));
        }

        // 2. 有効な貸出の確認（書籍行のロックで直列化済み）
        let open = sqlx::query(
            r#"
            SELECT id, book_id, user_id, borrowed_at, due_at, returned_at, status
            FROM loans
            WHERE book_id = $1
              AND status IN ('active', 'overdue')
            "#,
        )
        .bind(new_loan.book_id.value())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = open {
            return Ok(BorrowCommit::OpenLoanExists(map_row_to_loan(&row)?));
        }

        // 3. 貸出を登録
        let row = sqlx::query(
            r#"
            INSERT INTO loans (book_id, user_id, borrowed_at, due_at, returned_at, status)
            VALUES ($1, $2, $3, $4, NULL, $5)
            RETURNING id, book_id, user_id, borrowed_at, due_at, returned_at, status
            "#,
        )
        .bind(new_loan.book_id.value())
        .bind(new_loan.user_id.value())
        .bind(new_loan.borrowed_at)
        .bind(new_loan.due_at)
        .bind(LoanStatus::Active.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let loan = map_row_to_loan(&row)?;

        // 4. 書籍をLoanedに
        sqlx::query("UPDATE books SET status = $2 WHERE id = $1")
            .bind(new_loan.book_id.value())
            .bind(BookStatus::Loaned.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(BorrowCommit::Committed(loan))
    }

    async fn commit_return(
        &self,
        closed_loan: &Loan,
        book_status: BookStatus,
    ) -> Result<ReturnCommit> {
        let mut tx = self.pool.begin().await?;

        // 1. 貸出行をロックして現在の状態を確認
        let stored_status: Option<String> =
            sqlx::query_scalar("SELECT status FROM loans WHERE id = $1 FOR UPDATE")
                .bind(closed_loan.loan_id.value())
                .fetch_optional(&mut *tx)
                .await?;

        let stored_status = stored_status
            .ok_or_else(|| format!("Loan {} does not exist", closed_loan.loan_id))?;
        let stored_status = LoanStatus::from_str(&stored_status).map_err(invalid_data)?;

        if stored_status.is_terminal() {
            return Ok(ReturnCommit::AlreadyClosed(stored_status));
        }

        // 2. 貸出を終了状態で保存
        sqlx::query(
            r#"
            UPDATE loans
            SET status = $2,
                returned_at = $3
            WHERE id = $1
            "#,
        )
        .bind(closed_loan.loan_id.value())
        .bind(closed_loan.status.as_str())
        .bind(closed_loan.returned_at)
        .execute(&mut *tx)
        .await?;

        // 3. 書籍の状態を更新
        let result = sqlx::query("UPDATE books SET status = $2 WHERE id = $1")
            .bind(closed_loan.book_id.value())
            .bind(book_status.as_str())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            // txをドロップしてロールバック
            return Err(format!("Book {} does not exist", closed_loan.book_id).into());
        }

        tx.commit().await?;

        Ok(ReturnCommit::Committed)
    }
}
