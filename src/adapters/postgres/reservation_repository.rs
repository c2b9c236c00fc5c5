use crate::domain::{BookId, NewReservation, Reservation, ReservationId, ReservationStatus, UserId};
use crate::ports::reservation_repository::{
    ReservationCreate, ReservationRepository as ReservationRepositoryTrait, Result,
};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::str::FromStr;

use super::invalid_data;

fn map_row_to_reservation(row: &PgRow) -> Result<Reservation> {
    let status_str: &str = row.get("status");
    let status = ReservationStatus::from_str(status_str).map_err(invalid_data)?;

    Ok(Reservation {
        reservation_id: ReservationId::new(row.get("id")),
        book_id: BookId::new(row.get("book_id")),
        user_id: UserId::new(row.get("user_id")),
        reserved_at: row.get("reserved_at"),
        expires_at: row.get("expires_at"),
        status,
    })
}

/// ReservationRepositoryのPostgreSQL実装
///
/// 同じ書籍・利用者のActiveな予約は部分一意インデックス
/// `reservations_one_active_per_user_book`で1件に制限される。
pub struct ReservationRepository {
    pool: PgPool,
}

impl ReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReservationRepositoryTrait for ReservationRepository {
    async fn create(&self, reservation: NewReservation) -> Result<ReservationCreate> {
        let row = sqlx::query(
            r#"
            INSERT INTO reservations (book_id, user_id, reserved_at, expires_at, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (book_id, user_id) WHERE status = 'active' DO NOTHING
            RETURNING id, book_id, user_id, reserved_at, expires_at, status
            "#,
        )
        .bind(reservation.book_id.value())
        .bind(reservation.user_id.value())
        .bind(reservation.reserved_at)
        .bind(reservation.expires_at)
        .bind(ReservationStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(ReservationCreate::Created(map_row_to_reservation(&row)?)),
            None => Ok(ReservationCreate::AlreadyActive),
        }
    }

    async fn transition(
        &self,
        reservation_id: ReservationId,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET status = $3
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(reservation_id.value())
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_by_id(&self, reservation_id: ReservationId) -> Result<Option<Reservation>> {
        let row = sqlx::query(
            r#"
            SELECT id, book_id, user_id, reserved_at, expires_at, status
            FROM reservations
            WHERE id = $1
            "#,
        )
        .bind(reservation_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_reservation).transpose()
    }

    async fn find_by_book(
        &self,
        book_id: BookId,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<Reservation>> {
        let rows = sqlx::query(
            r#"
            SELECT id, book_id, user_id, reserved_at, expires_at, status
            FROM reservations
            WHERE book_id = $1
              AND ($2::VARCHAR IS NULL OR status = $2)
            ORDER BY reserved_at ASC, id ASC
            "#,
        )
        .bind(book_id.value())
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_reservation).collect()
    }
}
