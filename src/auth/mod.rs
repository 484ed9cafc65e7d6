//! Session-token authentication.

mod middleware;

pub use middleware::{require_session, require_session_with_balance};
