//! Parley API crate - axum HTTP server and route handlers.
//!
//! Exposes conversation management, message posting, the model catalog,
//! session identity, and a health check as a JSON REST API.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use auth::SessionTable;
pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
