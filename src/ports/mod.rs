pub mod catalog;
pub mod identity;
pub mod loan_repository;
pub mod reservation_repository;
pub mod unit_of_work;

pub use catalog::Catalog;
pub use identity::{Identity, UserCreate};
pub use loan_repository::{LoanQuery, LoanRepository};
pub use reservation_repository::{ReservationCreate, ReservationRepository};
pub use unit_of_work::{BorrowCommit, ReturnCommit, UnitOfWork};
