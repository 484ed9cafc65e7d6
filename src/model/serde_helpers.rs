//! Field-level serializers for API responses.

use serde::Serializer;

use super::order::OrderStatus;

/// Order identifiers go over the wire as decimal strings.
pub fn i64_as_string<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

/// Statuses go over the wire by name (`"NEW"`, `"PROCESSING"`, ...).
pub fn status_name<S: Serializer>(value: &OrderStatus, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value.as_str())
}
