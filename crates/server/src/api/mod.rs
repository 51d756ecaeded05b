pub mod cookie;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod queue;
pub mod response;
pub mod routes;

pub use error::ApiError;
pub use response::ApiResponse;
pub use routes::{create_router, gated};
