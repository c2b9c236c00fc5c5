use crate::domain::{BookId, Loan, LoanId, LoanStatus, UserId};
use crate::ports::loan_repository::{LoanQuery, LoanRepository as LoanRepositoryTrait, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::str::FromStr;

use super::invalid_data;

/// PostgreSQLの行データをLoanに変換する
///
/// statusは文字列で保存されているため、変換できない値はInvalidDataとして扱う。
pub(super) fn map_row_to_loan(row: &PgRow) -> Result<Loan> {
    let status_str: &str = row.get("status");
    let status = LoanStatus::from_str(status_str).map_err(invalid_data)?;

    Ok(Loan {
        loan_id: LoanId::new(row.get("id")),
        book_id: BookId::new(row.get("book_id")),
        user_id: UserId::new(row.get("user_id")),
        borrowed_at: row.get("borrowed_at"),
        due_at: row.get("due_at"),
        returned_at: row.get("returned_at"),
        status,
    })
}

/// LoanRepositoryのPostgreSQL実装
pub struct LoanRepository {
    pool: PgPool,
}

impl LoanRepository {
    /// PostgreSQLコネクションプールから新しいLoanRepositoryを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanRepositoryTrait for LoanRepository {
    async fn get_by_id(&self, loan_id: LoanId) -> Result<Option<Loan>> {
        let row = sqlx::query(
            r#"
            SELECT id, book_id, user_id, borrowed_at, due_at, returned_at, status
            FROM loans
            WHERE id = $1
            "#,
        )
        .bind(loan_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_loan).transpose()
    }

    /// 条件に合う貸出を取得
    ///
    /// 指定されなかった条件はNULLとしてバインドし、SQL側で無視する。
    async fn list(&self, query: LoanQuery) -> Result<Vec<Loan>> {
        let rows = sqlx::query(
            r#"
            SELECT id, book_id, user_id, borrowed_at, due_at, returned_at, status
            FROM loans
            WHERE ($1::BIGINT IS NULL OR user_id = $1)
              AND ($2::BIGINT IS NULL OR book_id = $2)
              AND ($3::VARCHAR IS NULL OR status = $3)
            ORDER BY id ASC
            "#,
        )
        .bind(query.user_id.map(|id| id.value()))
        .bind(query.book_id.map(|id| id.value()))
        .bind(query.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_loan).collect()
    }

    async fn find_open_for_book(&self, book_id: BookId) -> Result<Option<Loan>> {
        let row = sqlx::query(
            r#"
            SELECT id, book_id, user_id, borrowed_at, due_at, returned_at, status
            FROM loans
            WHERE book_id = $1
              AND status IN ('active', 'overdue')
            "#,
        )
        .bind(book_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_loan).transpose()
    }

    /// 条件付きUPDATEで Active → Overdue に遷移させる
    ///
    /// 既に返却された行はWHERE句で除外されるため、影響行数が0になる。
    async fn mark_overdue(&self, loan_id: LoanId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE loans
            SET status = 'overdue'
            WHERE id = $1
              AND status = 'active'
            "#,
        )
        .bind(loan_id.value())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
