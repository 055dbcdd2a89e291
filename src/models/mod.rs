//! Data Models Module
//!
//! Data structures used throughout the account service: accounts and
//! credentials, pending registrations, token claims and request payloads.

pub mod auth;
pub mod registration;
pub mod requests;
pub mod user;

// Re-export commonly used types
pub use auth::*;
pub use registration::*;
pub use requests::*;
pub use user::*;
