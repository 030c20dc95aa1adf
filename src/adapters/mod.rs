// Adapters layer: concrete implementations of the domain ports (billing store, storage, mail).

pub mod postgres;
pub mod smtp;
pub mod storage;

pub use postgres::PgChargeSource;
pub use smtp::SmtpMailer;
pub use storage::LocalStorage;
