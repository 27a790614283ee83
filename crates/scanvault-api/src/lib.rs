//! Scanvault API Library
//!
//! HTTP handlers, error rendering, and application setup for the file quarantine
//! service.

mod api_doc;
pub mod constants;
pub mod error;
mod handlers;
pub mod models;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
