//! Withdrawals against the accrued balance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// A withdrawal as returned by `GET /api/user/balance/withdrawals`.
///
/// The order number is a Luhn-valid identifier supplied by the user; it does
/// not have to reference a stored order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Withdrawal {
    #[serde(
        rename = "order",
        serialize_with = "super::serde_helpers::i64_as_string"
    )]
    pub order_number: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
    pub uploaded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn withdrawal_json_shape() {
        let withdrawal = Withdrawal {
            order_number: 2377225624,
            sum: dec!(400),
            uploaded_at: "2024-03-01T10:00:00Z".parse().unwrap(),
        };
        let json = serde_json::to_value(&withdrawal).unwrap();
        assert_eq!(json["order"], "2377225624");
        assert_eq!(json["sum"], 400.0);
        assert_eq!(json["uploaded_at"], "2024-03-01T10:00:00Z");
    }
}
