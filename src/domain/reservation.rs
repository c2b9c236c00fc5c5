use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, CancelReservationError, PlaceReservationError, ReservationId, UserId};

/// 予約の確保期間の既定値（日数）
pub const DEFAULT_HOLD_DAYS: i64 = 7;

/// 予約の確保期間の上限（日数）
pub const MAX_HOLD_DAYS: i64 = 365;

/// 予約の状態
///
/// Activeは`expires_at`が未来の間だけ意味を持つ。期限切れは読み取り時に遅延評価する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// 有効
    Active,
    /// 貸出に結びついた
    Fulfilled,
    /// 取り消し
    Cancelled,
    /// 期限切れ
    Expired,
}

impl ReservationStatus {
    /// 文字列表現を取得する
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "active",
            ReservationStatus::Fulfilled => "fulfilled",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Expired => "expired",
        }
    }

    /// 境界で使う整数コード
    pub fn code(&self) -> i16 {
        match self {
            ReservationStatus::Active => 0,
            ReservationStatus::Fulfilled => 1,
            ReservationStatus::Cancelled => 2,
            ReservationStatus::Expired => 3,
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ReservationStatus::Active),
            "fulfilled" => Ok(ReservationStatus::Fulfilled),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            "expired" => Ok(ReservationStatus::Expired),
            _ => Err(format!("Invalid reservation status: {}", s)),
        }
    }
}

/// 採番前の予約
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReservation {
    pub book_id: BookId,
    pub user_id: UserId,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewReservation {
    pub fn into_reservation(self, reservation_id: ReservationId) -> Reservation {
        Reservation {
            reservation_id,
            book_id: self.book_id,
            user_id: self.user_id,
            reserved_at: self.reserved_at,
            expires_at: self.expires_at,
            status: ReservationStatus::Active,
        }
    }
}

/// 予約 - 利用者が書籍の次の順番を待つ申し込み
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: ReservationId,
    pub book_id: BookId,
    pub user_id: UserId,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: ReservationStatus,
}

impl Reservation {
    /// 指定時刻において有効な予約か（Activeかつ期限前）
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Active && self.expires_at > now
    }
}

/// 純粋関数：予約を作成する
///
/// ビジネスルール：
/// - 予約日は現在時刻
/// - 有効期限は予約日 + 確保期間
pub fn place_reservation(
    book_id: BookId,
    user_id: UserId,
    now: DateTime<Utc>,
    hold: Duration,
) -> Result<NewReservation, PlaceReservationError> {
    let reserved_at = now;
    let expires_at = reserved_at
        .checked_add_signed(hold)
        .ok_or(PlaceReservationError::ExpiryOutOfRange { reserved_at, hold })?;

    if reserved_at > now {
        return Err(PlaceReservationError::ReservedInFuture { reserved_at, now });
    }

    if expires_at <= reserved_at {
        return Err(PlaceReservationError::ExpiryNotAfterReservation {
            reserved_at,
            expires_at,
        });
    }

    Ok(NewReservation {
        book_id,
        user_id,
        reserved_at,
        expires_at,
    })
}

/// 純粋関数：次に引き渡すべき予約を選ぶ
///
/// 有効な予約のうち`reserved_at`が最も早いもの。同時刻の場合は予約IDが小さいもの。
pub fn next_eligible<'a, I>(reservations: I, now: DateTime<Utc>) -> Option<&'a Reservation>
where
    I: IntoIterator<Item = &'a Reservation>,
{
    reservations
        .into_iter()
        .filter(|r| r.is_active_at(now))
        .min_by_key(|r| (r.reserved_at, r.reservation_id))
}

/// 純粋関数：予約を履行済みにする
///
/// Active以外は変更しない。
pub fn mark_fulfilled(reservation: &Reservation) -> Reservation {
    if reservation.status != ReservationStatus::Active {
        return reservation.clone();
    }

    Reservation {
        status: ReservationStatus::Fulfilled,
        ..reservation.clone()
    }
}

/// 純粋関数：予約を取り消す
///
/// 取り消し済みはそのまま返す（冪等）。
pub fn cancel_reservation(reservation: &Reservation) -> Result<Reservation, CancelReservationError> {
    match reservation.status {
        ReservationStatus::Active => Ok(Reservation {
            status: ReservationStatus::Cancelled,
            ..reservation.clone()
        }),
        ReservationStatus::Cancelled => Ok(reservation.clone()),
        ReservationStatus::Fulfilled => Err(CancelReservationError::AlreadyFulfilled),
        ReservationStatus::Expired => Err(CancelReservationError::AlreadyExpired),
    }
}

/// 純粋関数：期限切れを反映する
///
/// Activeかつ`expires_at <= now`ならExpiredへ遷移する。
pub fn refresh_expiry(reservation: &Reservation, now: DateTime<Utc>) -> Reservation {
    if reservation.status == ReservationStatus::Active && reservation.expires_at <= now {
        Reservation {
            status: ReservationStatus::Expired,
            ..reservation.clone()
        }
    } else {
        reservation.clone()
    }
}
