//! API Layer
//!
//! HTTP endpoints, request admission and the middleware stack for the account
//! service.

pub mod admission;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod security_middleware;

// Re-export commonly used types
pub use admission::{admission_gate, AdmissionState};
pub use handlers::AppState;
pub use middleware::BearerToken;
pub use routes::{create_app, create_routes, RouterBuilder};
