//! 予約キュー
//!
//! 書籍ごとの有効な予約を優先順位順に扱う。貸出や書籍の状態は変更しない。
//!
//! 予約の状態の保存はすべて条件付き（`transition`）。
//! 条件が外れた場合は並行する更新が勝ったものとして読み直す。

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::domain::{
    self, BookId, BookStatus, Reservation, ReservationId, ReservationStatus, commands::*,
};
use crate::ports::{ReservationCreate, ReservationRepository};

use super::errors::{LifecycleError, Result};
use super::orchestrator::ServiceDependencies;

async fn active_reservations(
    reservations: &Arc<dyn ReservationRepository>,
    book_id: BookId,
) -> Result<Vec<Reservation>> {
    reservations
        .find_by_book(book_id, Some(ReservationStatus::Active))
        .await
        .map_err(LifecycleError::ReservationStoreError)
}

/// 書籍に有効な予約（Activeかつ期限前）があるか
pub async fn has_active_reservation(
    reservations: &Arc<dyn ReservationRepository>,
    book_id: BookId,
    now: DateTime<Utc>,
) -> Result<bool> {
    let active = active_reservations(reservations, book_id).await?;
    Ok(active.iter().any(|r| r.is_active_at(now)))
}

/// 次に引き渡すべき予約を取得する
///
/// `reserved_at`が最も早い有効な予約。同時刻なら予約IDが小さいもの。
pub async fn next_eligible_reservation(
    reservations: &Arc<dyn ReservationRepository>,
    book_id: BookId,
    now: DateTime<Utc>,
) -> Result<Option<Reservation>> {
    let active = active_reservations(reservations, book_id).await?;
    Ok(domain::reservation::next_eligible(&active, now).cloned())
}

/// 保存されている予約を読み直す
async fn reload(
    reservations: &Arc<dyn ReservationRepository>,
    fallback: Reservation,
) -> Result<Reservation> {
    let stored = reservations
        .get_by_id(fallback.reservation_id)
        .await
        .map_err(LifecycleError::ReservationStoreError)?;

    Ok(stored.unwrap_or(fallback))
}

/// 予約を履行済みにする
///
/// 既に別の状態へ遷移していた場合は保存されている予約を返す。
pub async fn mark_fulfilled(
    reservations: &Arc<dyn ReservationRepository>,
    reservation: &Reservation,
) -> Result<Reservation> {
    let fulfilled = domain::reservation::mark_fulfilled(reservation);
    if fulfilled.status == reservation.status {
        return Ok(fulfilled);
    }

    let transitioned = reservations
        .transition(
            reservation.reservation_id,
            reservation.status,
            fulfilled.status,
        )
        .await
        .map_err(LifecycleError::ReservationStoreError)?;

    if !transitioned {
        return reload(reservations, reservation.clone()).await;
    }

    tracing::info!(
        reservation_id = %fulfilled.reservation_id,
        book_id = %fulfilled.book_id,
        "Reservation fulfilled"
    );
    Ok(fulfilled)
}

/// 期限切れを反映し、遷移した場合は保存する
async fn refresh_expiry(
    reservations: &Arc<dyn ReservationRepository>,
    reservation: Reservation,
    now: DateTime<Utc>,
) -> Result<Reservation> {
    let refreshed = domain::reservation::refresh_expiry(&reservation, now);
    if refreshed.status == reservation.status {
        return Ok(reservation);
    }

    let expired = reservations
        .mark_expired(reservation.reservation_id)
        .await
        .map_err(LifecycleError::ReservationStoreError)?;

    if expired {
        tracing::debug!(
            reservation_id = %refreshed.reservation_id,
            expires_at = %refreshed.expires_at,
            "Reservation expired"
        );
        return Ok(refreshed);
    }

    // 並行する取り消し・履行に先を越された
    reload(reservations, refreshed).await
}

/// 引き渡し待ちの書籍を確保している予約か
///
/// 書籍がReservedで、この予約が次に引き渡す予約である場合。
async fn holds_book_for_pickup(
    deps: &ServiceDependencies,
    reservation: &Reservation,
    now: DateTime<Utc>,
) -> Result<bool> {
    let book = deps
        .catalog
        .get_book(reservation.book_id)
        .await
        .map_err(LifecycleError::CatalogError)?;

    if !book.is_some_and(|b| b.status == BookStatus::Reserved) {
        return Ok(false);
    }

    let next = next_eligible_reservation(&deps.reservations, reservation.book_id, now).await?;
    Ok(next.is_some_and(|n| n.reservation_id == reservation.reservation_id))
}

/// 書籍を予約する
///
/// ビジネスルール：
/// - 利用者が存在すること
/// - 書籍が存在すること
/// - 同じ利用者が同じ書籍に有効な予約を持っていないこと
///
/// 同じ書籍・利用者のActiveな予約はストアが1件に制限するため、
/// 並行した予約は1件だけが成功し、残りは`DuplicateReservation`になる。
pub async fn place_reservation(
    deps: &ServiceDependencies,
    cmd: PlaceReservation,
) -> Result<Reservation> {
    // 1. 利用者の存在確認
    deps.identity
        .get_user(cmd.user_id)
        .await
        .map_err(LifecycleError::IdentityError)?
        .ok_or(LifecycleError::UserNotFound(cmd.user_id))?;

    // 2. 書籍の存在確認
    let book_exists = deps
        .catalog
        .book_exists(cmd.book_id)
        .await
        .map_err(LifecycleError::CatalogError)?;

    if !book_exists {
        return Err(LifecycleError::BookNotFound(cmd.book_id));
    }

    // 3. 重複予約の確認（期限の過ぎた自分の予約は期限切れとして確定させる）
    let duplicate = LifecycleError::DuplicateReservation {
        book_id: cmd.book_id,
        user_id: cmd.user_id,
    };
    let active = active_reservations(&deps.reservations, cmd.book_id).await?;
    for own in active.into_iter().filter(|r| r.user_id == cmd.user_id) {
        if own.is_active_at(cmd.reserved_at) {
            tracing::warn!(book_id = %cmd.book_id, user_id = %cmd.user_id, "Duplicate reservation");
            return Err(duplicate);
        }
        refresh_expiry(&deps.reservations, own, cmd.reserved_at).await?;
    }

    // 4. ドメイン層の純粋関数を呼び出し
    let new_reservation = domain::reservation::place_reservation(
        cmd.book_id,
        cmd.user_id,
        cmd.reserved_at,
        deps.reservation_hold,
    )
    .map_err(|e| LifecycleError::Validation(format!("{:?}", e)))?;

    // 5. 保存（重複の確認と登録はストアで分割されない）
    let created = deps
        .reservations
        .create(new_reservation)
        .await
        .map_err(LifecycleError::ReservationStoreError)?;

    let reservation = match created {
        ReservationCreate::Created(reservation) => reservation,
        ReservationCreate::AlreadyActive => {
            tracing::warn!(book_id = %cmd.book_id, user_id = %cmd.user_id, "Lost reservation race");
            return Err(duplicate);
        }
    };

    tracing::info!(
        reservation_id = %reservation.reservation_id,
        book_id = %reservation.book_id,
        user_id = %reservation.user_id,
        expires_at = %reservation.expires_at,
        "Reservation placed"
    );

    Ok(reservation)
}

/// 予約を取り消す
///
/// 予約が存在しない場合は`None`。取り消し済みの予約はそのまま返す。
/// 引き渡し待ち（Reserved）の書籍を確保している予約は取り消せない。
/// 取り消すと書籍がReservedのまま誰にも貸し出せなくなるため。
pub async fn cancel_reservation(
    deps: &ServiceDependencies,
    cmd: CancelReservation,
) -> Result<Option<Reservation>> {
    let Some(reservation) = deps
        .reservations
        .get_by_id(cmd.reservation_id)
        .await
        .map_err(LifecycleError::ReservationStoreError)?
    else {
        return Ok(None);
    };

    let cancelled = domain::reservation::cancel_reservation(&reservation)
        .map_err(|e| LifecycleError::InvalidReservationState(format!("{:?}", e)))?;

    if cancelled.status == reservation.status {
        return Ok(Some(cancelled));
    }

    if holds_book_for_pickup(deps, &reservation, cmd.cancelled_at).await? {
        tracing::warn!(
            reservation_id = %reservation.reservation_id,
            book_id = %reservation.book_id,
            "Reservation holds a reserved book"
        );
        return Err(LifecycleError::ReservationHoldsBook {
            reservation_id: reservation.reservation_id,
            book_id: reservation.book_id,
        });
    }

    let transitioned = deps
        .reservations
        .transition(
            reservation.reservation_id,
            reservation.status,
            cancelled.status,
        )
        .await
        .map_err(LifecycleError::ReservationStoreError)?;

    if !transitioned {
        // 並行して取り消し・期限切れ・履行になった
        let current = reload(&deps.reservations, reservation).await?;
        return domain::reservation::cancel_reservation(&current)
            .map(Some)
            .map_err(|e| LifecycleError::InvalidReservationState(format!("{:?}", e)));
    }

    tracing::info!(
        reservation_id = %cancelled.reservation_id,
        cancelled_at = %cmd.cancelled_at,
        "Reservation cancelled"
    );

    Ok(Some(cancelled))
}

/// IDで予約を取得する（期限切れを反映）
pub async fn get_reservation(
    deps: &ServiceDependencies,
    reservation_id: ReservationId,
    now: DateTime<Utc>,
) -> Result<Option<Reservation>> {
    let reservation = deps
        .reservations
        .get_by_id(reservation_id)
        .await
        .map_err(LifecycleError::ReservationStoreError)?;

    match reservation {
        Some(reservation) => Ok(Some(
            refresh_expiry(&deps.reservations, reservation, now).await?,
        )),
        None => Ok(None),
    }
}

/// 書籍の予約一覧を取得する（期限切れを反映）
pub async fn list_reservations_for_book(
    deps: &ServiceDependencies,
    book_id: BookId,
    now: DateTime<Utc>,
) -> Result<Vec<Reservation>> {
    let reservations = deps
        .reservations
        .find_by_book(book_id, None)
        .await
        .map_err(LifecycleError::ReservationStoreError)?;

    let mut refreshed = Vec::with_capacity(reservations.len());
    for reservation in reservations {
        refreshed.push(refresh_expiry(&deps.reservations, reservation, now).await?);
    }

    Ok(refreshed)
}
