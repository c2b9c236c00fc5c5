use crate::application::lifecycle::{
    LifecycleError, ServiceDependencies, borrow_book as execute_borrow_book,
    cancel_reservation as execute_cancel_reservation, get_book as execute_get_book,
    get_loan as execute_get_loan, get_reservation as execute_get_reservation,
    get_user as execute_get_user, list_books as execute_list_books,
    list_loans as execute_list_loans,
    list_reservations_for_book as execute_list_reservations_for_book,
    list_users as execute_list_users, place_reservation as execute_place_reservation,
    register_book as execute_register_book, register_user as execute_register_user,
    return_loan as execute_return_loan,
};
use crate::domain::commands::{
    BorrowBook, CancelReservation, PlaceReservation, RegisterBook, RegisterUser, ReturnLoan,
};
use crate::domain::{BookId, LoanId, ReservationId, UserId};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use std::sync::Arc;

use super::{
    error::ApiError,
    types::{
        BookResponse, BorrowBookRequest, ListBooksQuery, ListLoansQuery, ListUsersQuery,
        LoanResponse, PlaceReservationRequest, RegisterBookRequest, RegisterUserRequest,
        ReservationResponse, UserResponse,
    },
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
}

// ============================================================================
// Books
// ============================================================================

/// POST /books - 書籍を登録
///
/// 登録された書籍は常にavailableから始まる。
pub async fn register_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterBookRequest>,
) -> Result<(StatusCode, Json<BookResponse>), ApiError> {
    let cmd = RegisterBook {
        isbn: req.isbn,
        title: req.title,
        author: req.author,
        year: req.year,
    };

    let book = execute_register_book(&state.service_deps, cmd).await?;

    Ok((StatusCode::CREATED, Json(BookResponse::from(book))))
}

/// GET /books/:id
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<i64>,
) -> Result<Json<BookResponse>, ApiError> {
    let book_id = BookId::new(book_id);
    let book = execute_get_book(&state.service_deps, book_id)
        .await?
        .ok_or(LifecycleError::BookNotFound(book_id))?;

    Ok(Json(BookResponse::from(book)))
}

/// GET /books - 書籍一覧取得
///
/// クエリパラメータ（すべてオプション）:
/// - title, author（完全一致）
/// - status: available, loaned, reserved
pub async fn list_books(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListBooksQuery>,
) -> Result<Json<Vec<BookResponse>>, ApiError> {
    let query = query.to_query().map_err(ApiError::BadRequest)?;

    let books = execute_list_books(&state.service_deps, query).await?;

    Ok(Json(books.into_iter().map(BookResponse::from).collect()))
}

// ============================================================================
// Users
// ============================================================================

/// POST /users - 利用者を登録
///
/// メールアドレスが既に使われている場合は409。
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let cmd = RegisterUser {
        name: req.name,
        email: req.email,
    };

    let user = execute_register_user(&state.service_deps, cmd).await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// GET /users/:id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    let user_id = UserId::new(user_id);
    let user = execute_get_user(&state.service_deps, user_id)
        .await?
        .ok_or(LifecycleError::UserNotFound(user_id))?;

    Ok(Json(UserResponse::from(user)))
}

/// GET /users - 利用者一覧取得（名前順、name・emailは部分一致）
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = execute_list_users(&state.service_deps, query.into()).await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

// ============================================================================
// Loans
// ============================================================================

/// POST /loans - 書籍を借りる
///
/// 強制されるビジネスルール:
/// - 利用者と書籍が存在すること
/// - 書籍がAvailableで、待っている予約がないこと
/// - 書籍に有効な貸出がないこと
pub async fn borrow_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BorrowBookRequest>,
) -> Result<(StatusCode, Json<LoanResponse>), ApiError> {
    let cmd = BorrowBook {
        book_id: BookId::new(req.book_id),
        user_id: UserId::new(req.user_id),
        requested_at: Utc::now(),
    };

    let loan = execute_borrow_book(&state.service_deps, cmd).await?;

    Ok((StatusCode::CREATED, Json(LoanResponse::from(loan))))
}

/// POST /loans/:id/return - 書籍を返却
///
/// 返却済みの貸出に対しては保存されている貸出をそのまま返す。
pub async fn return_loan(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<i64>,
) -> Result<Json<LoanResponse>, ApiError> {
    let cmd = ReturnLoan {
        loan_id: LoanId::new(loan_id),
        returned_at: Utc::now(),
    };

    let loan = execute_return_loan(&state.service_deps, cmd)
        .await?
        .ok_or(ApiError::LoanNotFound(loan_id))?;

    Ok(Json(LoanResponse::from(loan)))
}

/// GET /loans/:id - 貸出詳細をIDで取得
pub async fn get_loan(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<i64>,
) -> Result<Json<LoanResponse>, ApiError> {
    let loan = execute_get_loan(&state.service_deps, LoanId::new(loan_id), Utc::now())
        .await?
        .ok_or(ApiError::LoanNotFound(loan_id))?;

    Ok(Json(LoanResponse::from(loan)))
}

/// GET /loans - 貸出一覧取得
///
/// クエリパラメータ（すべてオプション）:
/// - user_id, book_id
/// - status: active, overdue, returned, handed_to_reservation
pub async fn list_loans(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListLoansQuery>,
) -> Result<Json<Vec<LoanResponse>>, ApiError> {
    let query = query.to_query().map_err(ApiError::BadRequest)?;

    let loans = execute_list_loans(&state.service_deps, query, Utc::now()).await?;

    Ok(Json(loans.into_iter().map(LoanResponse::from).collect()))
}

// ============================================================================
// Reservations
// ============================================================================

/// POST /reservations - 書籍を予約
pub async fn place_reservation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlaceReservationRequest>,
) -> Result<(StatusCode, Json<ReservationResponse>), ApiError> {
    let cmd = PlaceReservation {
        book_id: BookId::new(req.book_id),
        user_id: UserId::new(req.user_id),
        reserved_at: Utc::now(),
    };

    let reservation = execute_place_reservation(&state.service_deps, cmd).await?;

    Ok((
        StatusCode::CREATED,
        Json(ReservationResponse::from(reservation)),
    ))
}

/// GET /reservations/:id
pub async fn get_reservation(
    State(state): State<Arc<AppState>>,
    Path(reservation_id): Path<i64>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let reservation = execute_get_reservation(
        &state.service_deps,
        ReservationId::new(reservation_id),
        Utc::now(),
    )
    .await?
    .ok_or(ApiError::ReservationNotFound(reservation_id))?;

    Ok(Json(ReservationResponse::from(reservation)))
}

/// GET /books/:id/reservations - 書籍の予約一覧（予約順）
pub async fn list_reservations_for_book(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<i64>,
) -> Result<Json<Vec<ReservationResponse>>, ApiError> {
    let reservations =
        execute_list_reservations_for_book(&state.service_deps, BookId::new(book_id), Utc::now())
            .await?;

    Ok(Json(
        reservations
            .into_iter()
            .map(ReservationResponse::from)
            .collect(),
    ))
}

/// POST /reservations/:id/cancel
///
/// 履行済み・期限切れの予約、引き渡し待ちの書籍を確保している予約は取り消せない（409）。
pub async fn cancel_reservation(
    State(state): State<Arc<AppState>>,
    Path(reservation_id): Path<i64>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let cmd = CancelReservation {
        reservation_id: ReservationId::new(reservation_id),
        cancelled_at: Utc::now(),
    };

    let reservation = execute_cancel_reservation(&state.service_deps, cmd)
        .await?
        .ok_or(ApiError::ReservationNotFound(reservation_id))?;

    Ok(Json(ReservationResponse::from(reservation)))
}
