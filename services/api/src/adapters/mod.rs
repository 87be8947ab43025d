pub mod credentials;
pub mod db;

pub use credentials::Argon2Credentials;
pub use db::PgStore;
