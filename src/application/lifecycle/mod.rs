mod errors;
pub mod ledger;
mod orchestrator;
pub mod registry;
pub mod reservation_queue;

pub use errors::{ErrorKind, LifecycleError, Result};
pub use orchestrator::{ServiceDependencies, borrow_book, get_loan, list_loans, return_loan};
pub use registry::{get_book, get_user, list_books, list_users, register_book, register_user};
pub use reservation_queue::{
    cancel_reservation, get_reservation, list_reservations_for_book, place_reservation,
};
