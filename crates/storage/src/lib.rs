pub mod db;
pub mod error;
pub mod repositories;

pub use error::StorageError;
