//! # Clinic Server
//!
//! JSON-over-HTTP front end for `clinic-core`.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - API key and staff header extraction
//! - Signature image storage
//! - Running store calls off the async workers, with a timeout
//!
//! All business rules live in `clinic-core`; handlers only translate
//! requests and map errors to status codes.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod signatures;
pub mod state;

pub use auth::StaffContext;
pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use routes::router;
pub use signatures::{FsSignatureStore, SignatureError, SignatureStore};
pub use state::AppState;
