#![forbid(unsafe_code)]

mod error;
mod local;
mod remote;
mod rows;

pub use error::StoreError;
pub use local::{LOCAL_DB_FILE, LocalStore};
pub use remote::{REMOTE_DB_FILE, SqliteLogStore};
