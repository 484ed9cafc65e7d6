//! Loyalty accrual gateway.
//!
//! Users register, submit Luhn-valid order numbers, and spend accrued
//! bonuses as withdrawals. Each accepted order is forwarded to an external
//! accrual calculator and tracked to a terminal state by an asynchronous
//! pipeline.
//!
//! # Module structure
//!
//! ```text
//! src/
//! ├── core/      # configuration, shared state, the service error type
//! ├── api/       # HTTP routes and handlers
//! ├── auth/      # session-token middleware
//! ├── db/        # Postgres store, one module per table
//! ├── model/     # domain rows and wire shapes
//! ├── accrual/   # the asynchronous accrual pipeline (core engine)
//! └── util.rs    # Luhn, tokens, password hashing
//! ```

pub mod accrual;
pub mod api;
pub mod auth;
pub mod core;
pub mod db;
pub mod model;
pub mod util;

pub use crate::core::{AppError, AppResult, AppState, Config};
