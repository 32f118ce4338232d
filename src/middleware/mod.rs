pub mod auth;
pub mod response;

pub use auth::{jwt_auth_middleware, TOKEN_INVALID, TOKEN_REQUIRED};
pub use response::{ApiResponse, ApiResult};
