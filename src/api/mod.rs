pub mod analytics;
pub mod error;
pub mod handlers;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use handlers::AppState;
pub use routes::create_api_router;
