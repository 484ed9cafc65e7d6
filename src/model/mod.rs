//! Domain rows and wire shapes shared between the HTTP layer, the store and
//! the accrual pipeline.

pub mod order;
pub mod serde_helpers;
pub mod user;
pub mod withdrawal;

pub use order::{Order, OrderStatus, QueueOrder};
pub use user::{AuthSession, Balance, User};
pub use withdrawal::Withdrawal;
