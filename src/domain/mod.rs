pub mod book;
pub mod commands;
pub mod errors;
pub mod loan;
pub mod reservation;
pub mod user;
pub mod value_objects;

pub use book::*;
pub use errors::*;
pub use loan::{Loan, LoanStatus, NewLoan, ReturnOutcome};
pub use reservation::{NewReservation, Reservation, ReservationStatus};
pub use user::*;
pub use value_objects::*;
