use crate::domain::{BookId, NewReservation, Reservation, ReservationId, ReservationStatus};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 予約登録の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationCreate {
    /// 登録できた
    Created(Reservation),
    /// 同じ利用者の同じ書籍へのActiveな予約が既にある
    AlreadyActive,
}

/// 予約リポジトリポート
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// 予約を登録し、採番された予約を返す
    ///
    /// 同じ書籍・利用者のActiveな予約の有無の確認と登録は分割されない。
    async fn create(&self, reservation: NewReservation) -> Result<ReservationCreate>;

    /// 状態が`from`のときだけ`to`へ遷移させる
    ///
    /// 遷移した場合はtrue。予約がない、または状態が変わっていた場合はfalse。
    async fn transition(
        &self,
        reservation_id: ReservationId,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<bool>;

    /// Activeのときだけ期限切れにする
    async fn mark_expired(&self, reservation_id: ReservationId) -> Result<bool> {
        self.transition(
            reservation_id,
            ReservationStatus::Active,
            ReservationStatus::Expired,
        )
        .await
    }

    /// IDで予約を取得する
    async fn get_by_id(&self, reservation_id: ReservationId) -> Result<Option<Reservation>>;

    /// 書籍の予約を状態で絞り込んで取得する
    ///
    /// `status`がNoneの場合はすべての予約。予約日時、予約IDの昇順。
    async fn find_by_book(
        &self,
        book_id: BookId,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<Reservation>>;
}
