use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, borrow_book, cancel_reservation, get_book, get_loan, get_reservation, get_user,
    list_books, list_loans, list_reservations_for_book, list_users, place_reservation,
    register_book, register_user, return_loan,
};

/// Creates the API router with the loan lifecycle endpoints
///
/// Books and users:
/// - POST /books - Register a book (always starts available)
/// - GET /books - List books with filters
/// - GET /books/:id - Get book details
/// - POST /users - Register a user
/// - GET /users - List users with filters
/// - GET /users/:id - Get user details
///
/// Loans:
/// - POST /loans - Borrow a book
/// - GET /loans - List loans with filters
/// - GET /loans/:id - Get loan details
/// - POST /loans/:id/return - Return a book
///
/// Reservations:
/// - POST /reservations - Reserve a book
/// - GET /reservations/:id - Get reservation details
/// - POST /reservations/:id/cancel - Cancel a reservation
/// - GET /books/:id/reservations - Reservation queue of a book
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .route("/books", post(register_book).get(list_books))
        .route("/books/:id", get(get_book))
        .route("/users", post(register_user).get(list_users))
        .route("/users/:id", get(get_user))
        .route("/loans", post(borrow_book).get(list_loans))
        .route("/loans/:id", get(get_loan))
        .route("/loans/:id/return", post(return_loan))
        .route("/reservations", post(place_reservation))
        .route("/reservations/:id", get(get_reservation))
        .route("/reservations/:id/cancel", post(cancel_reservation))
        .route("/books/:id/reservations", get(list_reservations_for_book))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
