//! Orders and their pipeline envelope.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order lifecycle state, stored numerically.
///
/// Legal transitions: NEW→PROCESSING, NEW→INVALID, PROCESSING→PROCESSED,
/// PROCESSING→INVALID. PROCESSED and INVALID are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(into = "i32", try_from = "i32")]
#[repr(i32)]
pub enum OrderStatus {
    New = 1,
    Processing = 2,
    Processed = 3,
    Invalid = 4,
}

impl OrderStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Processed => "PROCESSED",
            OrderStatus::Invalid => "INVALID",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Processed | OrderStatus::Invalid)
    }
}

impl From<OrderStatus> for i32 {
    fn from(status: OrderStatus) -> Self {
        status as i32
    }
}

/// Error when converting an out-of-range value to [`OrderStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidStatus(pub i32);

impl fmt::Display for InvalidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid order status: {}", self.0)
    }
}

impl std::error::Error for InvalidStatus {}

impl TryFrom<i32> for OrderStatus {
    type Error = InvalidStatus;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(OrderStatus::New),
            2 => Ok(OrderStatus::Processing),
            3 => Ok(OrderStatus::Processed),
            4 => Ok(OrderStatus::Invalid),
            other => Err(InvalidStatus(other)),
        }
    }
}

/// An order as returned by `GET /api/user/orders`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    #[serde(serialize_with = "super::serde_helpers::i64_as_string")]
    pub number: i64,
    #[serde(serialize_with = "super::serde_helpers::status_name")]
    pub status: OrderStatus,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "rust_decimal::serde::float_option::serialize"
    )]
    pub accrual: Option<Decimal>,
    pub uploaded_at: DateTime<Utc>,
}

/// The envelope travelling through the pipeline. Never authoritative: the
/// store owns the durable row, this is in-flight state only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueueOrder {
    pub number: i64,
    pub status: OrderStatus,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub accrual: Option<Decimal>,
}

impl QueueOrder {
    /// A freshly accepted order, before its first upstream post.
    pub fn new(number: i64) -> Self {
        Self {
            number,
            status: OrderStatus::New,
            accrual: None,
        }
    }
}
