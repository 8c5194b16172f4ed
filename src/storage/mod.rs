//! Persistence gateway: sqlite-backed conversation history and the
//! customer-account URL cache.

mod error;
mod store;

pub use error::{StorageError, StorageResult};
pub use store::MessageStore;
