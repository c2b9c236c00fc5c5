pub mod catalog;
pub mod identity;
pub mod loan_repository;
pub mod reservation_repository;
pub mod unit_of_work;

// パブリックに型を再エクスポート
pub use catalog::Catalog as PostgresCatalog;
pub use identity::Identity as PostgresIdentity;
pub use loan_repository::LoanRepository as PostgresLoanRepository;
pub use reservation_repository::ReservationRepository as PostgresReservationRepository;
pub use unit_of_work::UnitOfWork as PostgresUnitOfWork;

use crate::application::lifecycle::ServiceDependencies;
use chrono::Duration;
use sqlx::PgPool;
use std::sync::Arc;

/// 列の値をドメインの型に変換できなかった場合のエラー
pub(crate) fn invalid_data(message: String) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message))
}

/// 1つのコネクションプールからすべてのポートを組み立てる
pub fn service_dependencies(pool: PgPool, reservation_hold: Duration) -> ServiceDependencies {
    ServiceDependencies {
        catalog: Arc::new(PostgresCatalog::new(pool.clone())),
        identity: Arc::new(PostgresIdentity::new(pool.clone())),
        loans: Arc::new(PostgresLoanRepository::new(pool.clone())),
        reservations: Arc::new(PostgresReservationRepository::new(pool.clone())),
        unit_of_work: Arc::new(PostgresUnitOfWork::new(pool)),
        reservation_hold,
    }
}
