use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, LoanDateError, LoanId, UserId};

/// 貸出期間（日数）
pub const LOAN_PERIOD_DAYS: i64 = 30;

/// 貸出の状態
///
/// 状態遷移：
/// - Active → Overdue（読み取り時に時刻で判定）
/// - Active | Overdue → Returned（待っている予約がない）
/// - Active | Overdue → HandedToReservation（待っている予約がある）
///
/// Returned と HandedToReservation は終端状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// 貸出中
    Active,
    /// 延滞中
    Overdue,
    /// 返却済み
    Returned,
    /// 返却済み（予約者へ引き渡し）
    HandedToReservation,
}

impl LoanStatus {
    /// 文字列表現を取得する
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Returned => "returned",
            LoanStatus::HandedToReservation => "handed_to_reservation",
        }
    }

    /// 境界で使う整数コード
    pub fn code(&self) -> i16 {
        match self {
            LoanStatus::Active => 0,
            LoanStatus::Overdue => 1,
            LoanStatus::Returned => 2,
            LoanStatus::HandedToReservation => 3,
        }
    }

    /// 書籍を占有している状態か（Active または Overdue）
    pub fn is_open(&self) -> bool {
        matches!(self, LoanStatus::Active | LoanStatus::Overdue)
    }

    /// 終端状態か
    pub fn is_terminal(&self) -> bool {
        !self.is_open()
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LoanStatus::Active),
            "overdue" => Ok(LoanStatus::Overdue),
            "returned" => Ok(LoanStatus::Returned),
            "handed_to_reservation" => Ok(LoanStatus::HandedToReservation),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

/// 返却の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnOutcome {
    /// 書籍は貸出可能に戻る
    Returned,
    /// 書籍は次の予約者のために確保される
    HandedToReservation,
}

/// 採番前の貸出
///
/// IDはストアが挿入時に割り当てる。状態は常にActiveで始まる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLoan {
    pub book_id: BookId,
    pub user_id: UserId,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

impl NewLoan {
    /// 採番されたIDでLoanを組み立てる
    pub fn into_loan(self, loan_id: LoanId) -> Loan {
        Loan {
            loan_id,
            book_id: self.book_id,
            user_id: self.user_id,
            borrowed_at: self.borrowed_at,
            due_at: self.due_at,
            returned_at: None,
            status: LoanStatus::Active,
        }
    }
}

/// Loan集約 - 1冊の書籍の1回の貸出
///
/// 削除されることはない。終端状態に達した後も履歴として残る。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub user_id: UserId,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: LoanStatus,
}

/// 純粋関数：貸出を作成する
///
/// ビジネスルール：
/// - 貸出期間は30日間
/// - 貸出日は現在時刻
///
/// 利用者・書籍の存在や書籍の空き状況は呼び出し側（オーケストレーター）が検証済みであること。
pub fn create_loan(
    book_id: BookId,
    user_id: UserId,
    now: DateTime<Utc>,
) -> Result<NewLoan, LoanDateError> {
    let borrowed_at = now;
    let due_at = borrowed_at + Duration::days(LOAN_PERIOD_DAYS);

    validate_loan_dates(borrowed_at, due_at, None, now)?;

    Ok(NewLoan {
        book_id,
        user_id,
        borrowed_at,
        due_at,
    })
}

/// 純粋関数：貸出日付の整合性を検査する
///
/// - 返却日（あれば）は貸出日以降
/// - 貸出日は現在時刻以前
/// - 返却期限は貸出日より後
pub fn validate_loan_dates(
    borrowed_at: DateTime<Utc>,
    due_at: DateTime<Utc>,
    returned_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), LoanDateError> {
    if let Some(returned_at) = returned_at.filter(|r| *r < borrowed_at) {
        return Err(LoanDateError::ReturnedBeforeBorrow {
            borrowed_at,
            returned_at,
        });
    }

    if borrowed_at > now {
        return Err(LoanDateError::BorrowedInFuture { borrowed_at, now });
    }

    if due_at <= borrowed_at {
        return Err(LoanDateError::DueNotAfterBorrow {
            borrowed_at,
            due_at,
        });
    }

    Ok(())
}

/// 純粋関数：返却日時を記録する
///
/// 終端状態の貸出はそのまま返す（返却は冪等）。
/// 状態の確定は`close_loan`で行う。
pub fn record_return(loan: &Loan, now: DateTime<Utc>) -> Result<Loan, LoanDateError> {
    if loan.status.is_terminal() {
        return Ok(loan.clone());
    }

    validate_loan_dates(loan.borrowed_at, loan.due_at, Some(now), now)?;

    Ok(Loan {
        returned_at: Some(now),
        ..loan.clone()
    })
}

/// 純粋関数：返却結果に応じて貸出を終端状態にする
///
/// 既に終端状態の貸出は変更しない。
pub fn close_loan(loan: &Loan, outcome: ReturnOutcome) -> Loan {
    if loan.status.is_terminal() {
        return loan.clone();
    }

    let status = match outcome {
        ReturnOutcome::Returned => LoanStatus::Returned,
        ReturnOutcome::HandedToReservation => LoanStatus::HandedToReservation,
    };

    Loan {
        status,
        ..loan.clone()
    }
}

/// 純粋関数：延滞判定
pub fn is_overdue(loan: &Loan, now: DateTime<Utc>) -> bool {
    loan.status == LoanStatus::Active && now > loan.due_at
}

/// 純粋関数：延滞状態を再計算する
///
/// Activeかつ返却期限を過ぎていればOverdueへ遷移する。それ以外は変更なし。
/// 読み取り経路で毎回適用される（定期バッチは存在しない）。
pub fn refresh_overdue_status(loan: &Loan, now: DateTime<Utc>) -> Loan {
    if is_overdue(loan, now) {
        Loan {
            status: LoanStatus::Overdue,
            ..loan.clone()
        }
    } else {
        loan.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_loan(borrowed_at: DateTime<Utc>) -> Loan {
        create_loan(BookId::new(5), UserId::new(1), borrowed_at)
            .unwrap()
            .into_loan(LoanId::new(1))
    }

    // TDD: create_loan() のテスト
    #[test]
    fn test_create_loan_sets_due_date_thirty_days_later() {
        let now = Utc::now();

        let new_loan = create_loan(BookId::new(5), UserId::new(1), now).unwrap();

        assert_eq!(new_loan.borrowed_at, now);
        assert_eq!(new_loan.due_at, now + Duration::days(30));
        assert_eq!(new_loan.book_id, BookId::new(5));
        assert_eq!(new_loan.user_id, UserId::new(1));
    }

    #[test]
    fn test_new_loan_starts_active_without_return() {
        let loan = active_loan(Utc::now());

        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(loan.returned_at, None);
        assert_eq!(loan.loan_id, LoanId::new(1));
    }

    #[test]
    fn test_validate_loan_dates_rejects_future_borrow() {
        let now = Utc::now();
        let borrowed_at = now + Duration::minutes(1);

        let result = validate_loan_dates(borrowed_at, borrowed_at + Duration::days(30), None, now);
        assert_eq!(
            result,
            Err(LoanDateError::BorrowedInFuture { borrowed_at, now })
        );
    }

    #[test]
    fn test_validate_loan_dates_rejects_due_not_after_borrow() {
        let now = Utc::now();

        let result = validate_loan_dates(now, now, None, now);
        assert_eq!(
            result,
            Err(LoanDateError::DueNotAfterBorrow {
                borrowed_at: now,
                due_at: now,
            })
        );
    }

    #[test]
    fn test_validate_loan_dates_checks_return_date() {
        let borrowed_at = Utc::now();
        let due_at = borrowed_at + Duration::days(30);
        let returned_at = borrowed_at - Duration::hours(2);

        assert_eq!(
            validate_loan_dates(borrowed_at, due_at, Some(returned_at), borrowed_at),
            Err(LoanDateError::ReturnedBeforeBorrow {
                borrowed_at,
                returned_at,
            })
        );
        assert_eq!(
            validate_loan_dates(borrowed_at, due_at, Some(borrowed_at), borrowed_at),
            Ok(())
        );
    }

    // TDD: record_return() のテスト
    #[test]
    fn test_record_return_sets_returned_at() {
        let borrowed_at = Utc::now();
        let loan = active_loan(borrowed_at);
        let returned_at = borrowed_at + Duration::days(3);

        let returned = record_return(&loan, returned_at).unwrap();

        assert_eq!(returned.returned_at, Some(returned_at));
        // 状態の確定はclose_loanの責務
        assert_eq!(returned.status, LoanStatus::Active);
    }

    #[test]
    fn test_record_return_rejects_return_before_borrow() {
        let borrowed_at = Utc::now();
        let loan = active_loan(borrowed_at);
        let returned_at = borrowed_at - Duration::seconds(1);

        let result = record_return(&loan, returned_at);
        assert_eq!(
            result,
            Err(LoanDateError::ReturnedBeforeBorrow {
                borrowed_at,
                returned_at,
            })
        );
    }

    #[test]
    fn test_record_return_is_noop_for_terminal_loan() {
        let borrowed_at = Utc::now();
        let loan = active_loan(borrowed_at);
        let first_return = borrowed_at + Duration::days(1);
        let returned = close_loan(
            &record_return(&loan, first_return).unwrap(),
            ReturnOutcome::Returned,
        );

        let again = record_return(&returned, borrowed_at + Duration::days(2)).unwrap();

        assert_eq!(again, returned);
        assert_eq!(again.returned_at, Some(first_return));
    }

    #[test]
    fn test_record_return_accepts_overdue_loan() {
        let borrowed_at = Utc::now();
        let loan = refresh_overdue_status(&active_loan(borrowed_at), borrowed_at + Duration::days(40));
        assert_eq!(loan.status, LoanStatus::Overdue);

        let returned_at = borrowed_at + Duration::days(41);
        let returned = record_return(&loan, returned_at).unwrap();
        assert_eq!(returned.returned_at, Some(returned_at));
    }

    // TDD: close_loan() のテスト
    #[test]
    fn test_close_loan_without_reservation_is_returned() {
        let loan = active_loan(Utc::now());
        let closed = close_loan(&loan, ReturnOutcome::Returned);
        assert_eq!(closed.status, LoanStatus::Returned);
    }

    #[test]
    fn test_close_loan_with_reservation_is_handed_off() {
        let loan = active_loan(Utc::now());
        let closed = close_loan(&loan, ReturnOutcome::HandedToReservation);
        assert_eq!(closed.status, LoanStatus::HandedToReservation);
    }

    #[test]
    fn test_close_loan_keeps_terminal_state() {
        let loan = close_loan(&active_loan(Utc::now()), ReturnOutcome::HandedToReservation);
        let closed = close_loan(&loan, ReturnOutcome::Returned);
        assert_eq!(closed.status, LoanStatus::HandedToReservation);
    }

    // TDD: refresh_overdue_status() のテスト
    #[test]
    fn test_refresh_overdue_status_before_due_date_keeps_active() {
        let borrowed_at = Utc::now();
        let loan = active_loan(borrowed_at);

        let refreshed = refresh_overdue_status(&loan, borrowed_at + Duration::days(30));

        // 期限ちょうどはまだ延滞ではない
        assert_eq!(refreshed.status, LoanStatus::Active);
    }

    #[test]
    fn test_refresh_overdue_status_after_due_date_is_overdue() {
        let borrowed_at = Utc::now();
        let loan = active_loan(borrowed_at);

        let refreshed = refresh_overdue_status(
            &loan,
            borrowed_at + Duration::days(30) + Duration::seconds(1),
        );

        assert_eq!(refreshed.status, LoanStatus::Overdue);
    }

    #[test]
    fn test_refresh_overdue_status_is_monotonic() {
        let borrowed_at = Utc::now();
        let loan = active_loan(borrowed_at);

        let overdue = refresh_overdue_status(&loan, borrowed_at + Duration::days(31));
        // 過去の時刻で再評価しても戻らない
        let earlier = refresh_overdue_status(&overdue, borrowed_at + Duration::days(1));
        let later = refresh_overdue_status(&overdue, borrowed_at + Duration::days(90));

        assert_eq!(earlier.status, LoanStatus::Overdue);
        assert_eq!(later.status, LoanStatus::Overdue);
    }

    #[test]
    fn test_refresh_overdue_status_ignores_returned_loan() {
        let borrowed_at = Utc::now();
        let loan = close_loan(&active_loan(borrowed_at), ReturnOutcome::Returned);

        let refreshed = refresh_overdue_status(&loan, borrowed_at + Duration::days(90));
        assert_eq!(refreshed.status, LoanStatus::Returned);
    }

    #[test]
    fn test_loan_status_string_forms_roundtrip() {
        for status in [
            LoanStatus::Active,
            LoanStatus::Overdue,
            LoanStatus::Returned,
            LoanStatus::HandedToReservation,
        ] {
            assert_eq!(status.as_str().parse::<LoanStatus>(), Ok(status));
        }
        assert!("lost".parse::<LoanStatus>().is_err());
    }

    #[test]
    fn test_loan_status_open_and_terminal() {
        assert!(LoanStatus::Active.is_open());
        assert!(LoanStatus::Overdue.is_open());
        assert!(LoanStatus::Returned.is_terminal());
        assert!(LoanStatus::HandedToReservation.is_terminal());
    }
}
