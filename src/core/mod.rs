//! Configuration, shared state and the service error type.

pub mod config;
pub mod error;
pub mod state;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
