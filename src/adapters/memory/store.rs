use crate::domain::{
    Book, BookId, BookQuery, BookStatus, Loan, LoanId, LoanStatus, NewBook, NewLoan,
    NewReservation, NewUser, Reservation, ReservationId, ReservationStatus, User, UserId,
    UserQuery,
};
use crate::ports::{
    BorrowCommit, Catalog, Identity, LoanQuery, LoanRepository, ReservationCreate,
    ReservationRepository, ReturnCommit, UnitOfWork, UserCreate, catalog, identity,
    loan_repository, reservation_repository, unit_of_work,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// インメモリストアのエラー
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error("Loan {0} does not exist")]
    MissingLoan(LoanId),
    #[error("Book {0} does not exist")]
    MissingBook(BookId),
}

#[derive(Debug, Default)]
struct State {
    books: BTreeMap<BookId, Book>,
    users: HashMap<UserId, User>,
    loans: BTreeMap<LoanId, Loan>,
    reservations: BTreeMap<ReservationId, Reservation>,
    last_book_id: i64,
    last_user_id: i64,
    last_loan_id: i64,
    last_reservation_id: i64,
}

impl State {
    fn open_loan_for_book(&self, book_id: BookId) -> Option<&Loan> {
        self.loans
            .values()
            .find(|l| l.book_id == book_id && l.status.is_open())
    }
}

/// すべてのポートのインメモリ実装
///
/// 全エンティティを1つのMutexで保護するため、`UnitOfWork`の操作はそのままアトミックになる。
/// ロックをawaitをまたいで保持することはない。
/// テストと`LIBRARY_STORAGE=memory`での起動に使用される。
/// `insert_*`はIDを指定してデータを直接置くテスト用の入口。
#[derive(Debug, Default)]
pub struct InMemoryLibrary {
    state: Mutex<State>,
}

impl InMemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// IDを指定して書籍を登録・置換する
    pub fn insert_book(&self, book: Book) {
        let mut state = self.state();
        state.last_book_id = state.last_book_id.max(book.book_id.value());
        state.books.insert(book.book_id, book);
    }

    /// IDを指定して利用者を登録・置換する
    pub fn insert_user(&self, user: User) {
        let mut state = self.state();
        state.last_user_id = state.last_user_id.max(user.user_id.value());
        state.users.insert(user.user_id, user);
    }

    /// IDを指定して貸出を登録・置換する（書籍の状態は変更しない）
    pub fn insert_loan(&self, loan: Loan) {
        let mut state = self.state();
        state.last_loan_id = state.last_loan_id.max(loan.loan_id.value());
        state.loans.insert(loan.loan_id, loan);
    }

    /// IDを指定して予約を登録・置換する
    pub fn insert_reservation(&self, reservation: Reservation) {
        let mut state = self.state();
        state.last_reservation_id = state
            .last_reservation_id
            .max(reservation.reservation_id.value());
        state
            .reservations
            .insert(reservation.reservation_id, reservation);
    }
}

#[async_trait]
impl Catalog for InMemoryLibrary {
    async fn create_book(&self, book: NewBook) -> catalog::Result<Book> {
        let mut state = self.state();
        state.last_book_id += 1;
        let book = book.into_book(BookId::new(state.last_book_id));
        state.books.insert(book.book_id, book.clone());
        Ok(book)
    }

    async fn get_book(&self, book_id: BookId) -> catalog::Result<Option<Book>> {
        Ok(self.state().books.get(&book_id).cloned())
    }

    async fn book_exists(&self, book_id: BookId) -> catalog::Result<bool> {
        Ok(self.state().books.contains_key(&book_id))
    }

    async fn list_books(&self, query: BookQuery) -> catalog::Result<Vec<Book>> {
        Ok(self
            .state()
            .books
            .values()
            .filter(|b| query.matches(b))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Identity for InMemoryLibrary {
    async fn create_user(&self, user: NewUser) -> identity::Result<UserCreate> {
        let mut state = self.state();
        if state.users.values().any(|u| u.email == user.email) {
            return Ok(UserCreate::EmailTaken);
        }

        state.last_user_id += 1;
        let user = user.into_user(UserId::new(state.last_user_id));
        state.users.insert(user.user_id, user.clone());
        Ok(UserCreate::Created(user))
    }

    async fn get_user(&self, user_id: UserId) -> identity::Result<Option<User>> {
        Ok(self.state().users.get(&user_id).cloned())
    }

    async fn list_users(&self, query: UserQuery) -> identity::Result<Vec<User>> {
        let mut found: Vec<User> = self
            .state()
            .users
            .values()
            .filter(|u| query.matches(u))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name).then(a.user_id.cmp(&b.user_id)));
        Ok(found)
    }
}

#[async_trait]
impl LoanRepository for InMemoryLibrary {
    async fn get_by_id(&self, loan_id: LoanId) -> loan_repository::Result<Option<Loan>> {
        Ok(self.state().loans.get(&loan_id).cloned())
    }

    async fn list(&self, query: LoanQuery) -> loan_repository::Result<Vec<Loan>> {
        Ok(self
            .state()
            .loans
            .values()
            .filter(|l| query.user_id.is_none_or(|id| l.user_id == id))
            .filter(|l| query.book_id.is_none_or(|id| l.book_id == id))
            .filter(|l| query.status.is_none_or(|s| l.status == s))
            .cloned()
            .collect())
    }

    async fn find_open_for_book(&self, book_id: BookId) -> loan_repository::Result<Option<Loan>> {
        Ok(self.state().open_loan_for_book(book_id).cloned())
    }

    async fn mark_overdue(&self, loan_id: LoanId) -> loan_repository::Result<bool> {
        let mut state = self.state();
        match state.loans.get_mut(&loan_id) {
            Some(loan) if loan.status == LoanStatus::Active => {
                loan.status = LoanStatus::Overdue;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl ReservationRepository for InMemoryLibrary {
    async fn create(
        &self,
        reservation: NewReservation,
    ) -> reservation_repository::Result<ReservationCreate> {
        let mut state = self.state();

        let already_active = state.reservations.values().any(|r| {
            r.book_id == reservation.book_id
                && r.user_id == reservation.user_id
                && r.status == ReservationStatus::Active
        });
        if already_active {
            return Ok(ReservationCreate::AlreadyActive);
        }

        state.last_reservation_id += 1;
        let reservation =
            reservation.into_reservation(ReservationId::new(state.last_reservation_id));
        state
            .reservations
            .insert(reservation.reservation_id, reservation.clone());
        Ok(ReservationCreate::Created(reservation))
    }

    async fn transition(
        &self,
        reservation_id: ReservationId,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> reservation_repository::Result<bool> {
        let mut state = self.state();
        match state.reservations.get_mut(&reservation_id) {
            Some(reservation) if reservation.status == from => {
                reservation.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_by_id(
        &self,
        reservation_id: ReservationId,
    ) -> reservation_repository::Result<Option<Reservation>> {
        Ok(self.state().reservations.get(&reservation_id).cloned())
    }

    async fn find_by_book(
        &self,
        book_id: BookId,
        status: Option<ReservationStatus>,
    ) -> reservation_repository::Result<Vec<Reservation>> {
        let mut found: Vec<Reservation> = self
            .state()
            .reservations
            .values()
            .filter(|r| r.book_id == book_id)
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        found.sort_by_key(|r| (r.reserved_at, r.reservation_id));
        Ok(found)
    }
}

#[async_trait]
impl UnitOfWork for InMemoryLibrary {
    async fn commit_borrow(&self, new_loan: NewLoan) -> unit_of_work::Result<BorrowCommit> {
        let mut state = self.state();

        match state.books.get(&new_loan.book_id) {
            None => return Ok(BorrowCommit::BookUnavailable(None)),
            Some(book) if book.status != BookStatus::Available => {
                return Ok(BorrowCommit::BookUnavailable(Some(book.status)));
            }
            Some(_) => {}
        }

        if let Some(open) = state.open_loan_for_book(new_loan.book_id) {
            return Ok(BorrowCommit::OpenLoanExists(open.clone()));
        }

        state.last_loan_id += 1;
        let loan = new_loan.into_loan(LoanId::new(state.last_loan_id));
        state.loans.insert(loan.loan_id, loan.clone());
        if let Some(book) = state.books.get_mut(&loan.book_id) {
            book.status = BookStatus::Loaned;
        }

        Ok(BorrowCommit::Committed(loan))
    }

    async fn commit_return(
        &self,
        closed_loan: &Loan,
        book_status: BookStatus,
    ) -> unit_of_work::Result<ReturnCommit> {
        let mut state = self.state();

        let stored_status = state
            .loans
            .get(&closed_loan.loan_id)
            .map(|l| l.status)
            .ok_or(MemoryStoreError::MissingLoan(closed_loan.loan_id))?;

        if stored_status.is_terminal() {
            return Ok(ReturnCommit::AlreadyClosed(stored_status));
        }

        // 変更前に両方の存在を確認し、途中状態を残さない
        let book = state
            .books
            .get_mut(&closed_loan.book_id)
            .ok_or(MemoryStoreError::MissingBook(closed_loan.book_id))?;
        book.status = book_status;
        state.loans.insert(closed_loan.loan_id, closed_loan.clone());

        Ok(ReturnCommit::Committed)
    }
}
