//! HTTP boundary: the chat route pair and CORS handling.

mod error;
mod routes;

pub use error::ApiError;
pub use routes::{router, AppState};
