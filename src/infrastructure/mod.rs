//! Infrastructure layer - external concerns

pub mod crypto;
pub mod database;
pub mod notifications;
pub mod qr;
pub mod storage;

pub use database::{
    connect_and_migrate, init_database, run_migrations, DatabaseConfig, SeaOrmRepositoryProvider,
};
pub use notifications::LogNotificationSender;
pub use qr::PngQrEncoder;
pub use storage::InMemoryRepositoryProvider;
