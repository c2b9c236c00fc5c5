//! PostgreSQLアダプターのテスト
//!
//! DATABASE_URLで指定したデータベースが必要なため、通常は無視される。
//! `cargo test -- --ignored` で実行する。

mod common;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use library_lifecycle::adapters::postgres::{
    PostgresCatalog, PostgresIdentity, PostgresLoanRepository, PostgresReservationRepository,
    PostgresUnitOfWork, service_dependencies,
};
use library_lifecycle::application::lifecycle::{
    ErrorKind, LifecycleError, borrow_book, get_loan, list_loans, place_reservation,
    return_loan,
};
use library_lifecycle::domain::commands::*;
use library_lifecycle::domain::*;
use library_lifecycle::ports::{
    BorrowCommit, Catalog, Identity, LoanQuery, LoanRepository, ReservationCreate,
    ReservationRepository, ReturnCommit, UnitOfWork, UserCreate,
};
use serial_test::serial;

/// PostgreSQLの時刻精度（マイクロ秒）に合わせて丸める
///
/// TIMESTAMPTZはマイクロ秒精度だが、DateTime<Utc>はナノ秒精度を持つ。
fn truncate_to_micros(dt: DateTime<Utc>) -> DateTime<Utc> {
    let micros = dt.timestamp_micros();
    DateTime::from_timestamp_micros(micros).expect("Invalid timestamp")
}

fn now() -> DateTime<Utc> {
    truncate_to_micros(Utc::now())
}

fn new_reservation(book_id: BookId, user_id: UserId, reserved_at: DateTime<Utc>) -> NewReservation {
    NewReservation {
        book_id,
        user_id,
        reserved_at,
        expires_at: reserved_at + Duration::days(7),
    }
}

async fn created(
    reservations: &PostgresReservationRepository,
    reservation: NewReservation,
) -> Reservation {
    match reservations.create(reservation).await.unwrap() {
        ReservationCreate::Created(reservation) => reservation,
        ReservationCreate::AlreadyActive => panic!("Expected Created"),
    }
}

fn new_loan(book_id: BookId, user_id: UserId, borrowed_at: DateTime<Utc>) -> NewLoan {
    NewLoan {
        book_id,
        user_id,
        borrowed_at,
        due_at: borrowed_at + Duration::days(30),
    }
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_commit_borrow_and_return() {
    let pool = common::create_test_pool().await;
    common::cleanup_database(&pool).await;
    let book_id = common::add_book(&pool, "Dune").await;
    let user_id = common::add_user(&pool, "alice").await;

    let catalog = PostgresCatalog::new(pool.clone());
    let loans = PostgresLoanRepository::new(pool.clone());
    let unit_of_work = PostgresUnitOfWork::new(pool.clone());
    let borrowed_at = now();

    // 貸出の確定
    let commit = unit_of_work
        .commit_borrow(new_loan(book_id, user_id, borrowed_at))
        .await
        .expect("Failed to commit borrow");
    let loan = match commit {
        BorrowCommit::Committed(loan) => loan,
        other => panic!("Expected Committed, got {:?}", other),
    };
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(loan.borrowed_at, borrowed_at);

    let book = catalog.get_book(book_id).await.unwrap().unwrap();
    assert_eq!(book.status, BookStatus::Loaned);
    assert_eq!(
        loans.find_open_for_book(book_id).await.unwrap(),
        Some(loan.clone())
    );

    // 二重の貸出は拒否される
    let second = unit_of_work
        .commit_borrow(new_loan(book_id, user_id, borrowed_at))
        .await
        .unwrap();
    assert_eq!(second, BorrowCommit::BookUnavailable(Some(BookStatus::Loaned)));

    // 返却の確定
    let closed = Loan {
        returned_at: Some(borrowed_at + Duration::days(1)),
        status: LoanStatus::Returned,
        ..loan.clone()
    };
    let result = unit_of_work
        .commit_return(&closed, BookStatus::Available)
        .await
        .unwrap();
    assert_eq!(result, ReturnCommit::Committed);
    assert_eq!(loans.get_by_id(loan.loan_id).await.unwrap(), Some(closed.clone()));
    assert_eq!(
        catalog.get_book(book_id).await.unwrap().unwrap().status,
        BookStatus::Available
    );

    // 終了済みの貸出は上書きしない
    let result = unit_of_work
        .commit_return(&closed, BookStatus::Reserved)
        .await
        .unwrap();
    assert_eq!(result, ReturnCommit::AlreadyClosed(LoanStatus::Returned));
    assert_eq!(
        catalog.get_book(book_id).await.unwrap().unwrap().status,
        BookStatus::Available
    );
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_commit_borrow_unknown_book() {
    let pool = common::create_test_pool().await;
    common::cleanup_database(&pool).await;
    let user_id = common::add_user(&pool, "alice").await;

    let result = PostgresUnitOfWork::new(pool.clone())
        .commit_borrow(new_loan(BookId::new(4242), user_id, now()))
        .await
        .unwrap();

    assert_eq!(result, BorrowCommit::BookUnavailable(None));
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_mark_overdue_is_guarded() {
    let pool = common::create_test_pool().await;
    common::cleanup_database(&pool).await;
    let book_id = common::add_book(&pool, "Dune").await;
    let user_id = common::add_user(&pool, "alice").await;
    let loans = PostgresLoanRepository::new(pool.clone());
    let unit_of_work = PostgresUnitOfWork::new(pool.clone());

    let BorrowCommit::Committed(loan) = unit_of_work
        .commit_borrow(new_loan(book_id, user_id, now() - Duration::days(40)))
        .await
        .unwrap()
    else {
        panic!("Expected Committed");
    };

    assert!(loans.mark_overdue(loan.loan_id).await.unwrap());
    // 二度目は遷移しない
    assert!(!loans.mark_overdue(loan.loan_id).await.unwrap());

    let stored = loans.get_by_id(loan.loan_id).await.unwrap().unwrap();
    assert_eq!(stored.status, LoanStatus::Overdue);

    // 返却済みの貸出は延滞に戻らない
    let closed = Loan {
        returned_at: Some(now()),
        status: LoanStatus::Returned,
        ..stored
    };
    unit_of_work
        .commit_return(&closed, BookStatus::Available)
        .await
        .unwrap();
    assert!(!loans.mark_overdue(loan.loan_id).await.unwrap());
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_reservations_are_ordered() {
    let pool = common::create_test_pool().await;
    common::cleanup_database(&pool).await;
    let book_id = common::add_book(&pool, "Solaris").await;
    let alice = common::add_user(&pool, "alice").await;
    let bob = common::add_user(&pool, "bob").await;
    let reservations = PostgresReservationRepository::new(pool.clone());
    let base = now();

    let later = created(
        &reservations,
        new_reservation(book_id, alice, base + Duration::hours(1)),
    )
    .await;
    let earlier = created(&reservations, new_reservation(book_id, bob, base)).await;
    assert_eq!(earlier.status, ReservationStatus::Active);

    let all = reservations.find_by_book(book_id, None).await.unwrap();
    let ids: Vec<_> = all.iter().map(|r| r.reservation_id).collect();
    assert_eq!(ids, vec![earlier.reservation_id, later.reservation_id]);

    assert!(
        reservations
            .transition(
                earlier.reservation_id,
                ReservationStatus::Active,
                ReservationStatus::Cancelled,
            )
            .await
            .unwrap()
    );

    let active = reservations
        .find_by_book(book_id, Some(ReservationStatus::Active))
        .await
        .unwrap();
    assert_eq!(active, vec![later]);
    assert_eq!(
        reservations.get_by_id(earlier.reservation_id).await.unwrap(),
        Some(Reservation {
            status: ReservationStatus::Cancelled,
            ..earlier
        })
    );
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_reservation_transitions_are_guarded() {
    let pool = common::create_test_pool().await;
    common::cleanup_database(&pool).await;
    let book_id = common::add_book(&pool, "Solaris").await;
    let alice = common::add_user(&pool, "alice").await;
    let reservations = PostgresReservationRepository::new(pool.clone());

    let reservation = created(&reservations, new_reservation(book_id, alice, now())).await;
    assert!(
        reservations
            .transition(
                reservation.reservation_id,
                ReservationStatus::Active,
                ReservationStatus::Cancelled,
            )
            .await
            .unwrap()
    );

    // 取り消し済みの予約は期限切れで上書きされない
    assert!(!reservations.mark_expired(reservation.reservation_id).await.unwrap());
    assert_eq!(
        reservations
            .get_by_id(reservation.reservation_id)
            .await
            .unwrap()
            .unwrap()
            .status,
        ReservationStatus::Cancelled
    );
    assert!(!reservations.mark_expired(ReservationId::new(4242)).await.unwrap());
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_one_active_reservation_per_user_and_book() {
    let pool = common::create_test_pool().await;
    common::cleanup_database(&pool).await;
    let book_id = common::add_book(&pool, "Solaris").await;
    let alice = common::add_user(&pool, "alice").await;
    let reservations = PostgresReservationRepository::new(pool.clone());

    let first = created(&reservations, new_reservation(book_id, alice, now())).await;
    let second = reservations
        .create(new_reservation(book_id, alice, now()))
        .await
        .unwrap();
    assert_eq!(second, ReservationCreate::AlreadyActive);

    // Activeでなくなれば再び予約できる
    reservations.mark_expired(first.reservation_id).await.unwrap();
    created(&reservations, new_reservation(book_id, alice, now())).await;

    // 並行した予約も1件だけ成功する
    let bob = common::add_user(&pool, "bob").await;
    let deps = service_dependencies(pool.clone(), Duration::days(7));
    let attempts = (0..5).map(|_| {
        let deps = deps.clone();
        async move {
            place_reservation(
                &deps,
                PlaceReservation {
                    book_id,
                    user_id: bob,
                    reserved_at: now(),
                },
            )
            .await
        }
    });
    let results = join_all(attempts).await;
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, LifecycleError::DuplicateReservation { .. }))
    );
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_books_and_users_are_registered_through_adapters() {
    let pool = common::create_test_pool().await;
    common::cleanup_database(&pool).await;
    let catalog = PostgresCatalog::new(pool.clone());
    let identity = PostgresIdentity::new(pool.clone());

    let new_book = book::register_book("9788535914849", "Vidas Secas", "Graciliano Ramos", 1938)
        .unwrap();
    let vidas = catalog.create_book(new_book).await.unwrap();
    assert_eq!(vidas.status, BookStatus::Available);
    common::add_book(&pool, "Solaris").await;

    let by_author = catalog
        .list_books(BookQuery {
            author: Some("Graciliano Ramos".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_author, vec![vidas]);
    assert_eq!(catalog.list_books(BookQuery::default()).await.unwrap().len(), 2);

    let carla = user::register_user("Carla Dias", "carla@example.com").unwrap();
    assert!(matches!(
        identity.create_user(carla.clone()).await.unwrap(),
        UserCreate::Created(_)
    ));
    assert_eq!(
        identity.create_user(carla).await.unwrap(),
        UserCreate::EmailTaken
    );
    common::add_user(&pool, "Bruno").await;

    let names: Vec<_> = identity
        .list_users(UserQuery::default())
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.name)
        .collect();
    assert_eq!(names, vec!["Bruno", "Carla Dias"]);

    let filtered = identity
        .list_users(UserQuery {
            email: Some("carla@".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_lifecycle_over_postgres() {
    let pool = common::create_test_pool().await;
    common::cleanup_database(&pool).await;
    let book_id = common::add_book(&pool, "Neuromancer").await;
    let users = [
        common::add_user(&pool, "alice").await,
        common::add_user(&pool, "bob").await,
        common::add_user(&pool, "carol").await,
    ];
    let deps = service_dependencies(pool.clone(), Duration::days(7));
    let start = now();

    // 同じ書籍への並行した貸出は1件だけ成功する
    let attempts = users.iter().map(|&user_id| {
        let deps = deps.clone();
        async move {
            borrow_book(
                &deps,
                BorrowBook {
                    book_id,
                    user_id,
                    requested_at: start,
                },
            )
            .await
        }
    });
    let results = join_all(attempts).await;
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| e.kind() == ErrorKind::Conflict)
    );
    let loan = results.into_iter().find_map(Result::ok).unwrap();

    // 期限後の読み取りで延滞になる
    let overdue = get_loan(&deps, loan.loan_id, start + Duration::days(31))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(overdue.status, LoanStatus::Overdue);

    let listed = list_loans(
        &deps,
        LoanQuery {
            status: Some(LoanStatus::Overdue),
            ..Default::default()
        },
        start + Duration::days(31),
    )
    .await
    .unwrap();
    assert_eq!(listed, vec![overdue]);

    // 返却（冪等）
    let cmd = ReturnLoan {
        loan_id: loan.loan_id,
        returned_at: start + Duration::days(32),
    };
    let first = return_loan(&deps, cmd.clone()).await.unwrap().unwrap();
    let second = return_loan(&deps, cmd).await.unwrap().unwrap();
    assert_eq!(first.status, LoanStatus::Returned);
    assert_eq!(first, second);
    assert_eq!(
        deps.catalog.get_book(book_id).await.unwrap().unwrap().status,
        BookStatus::Available
    );
}
