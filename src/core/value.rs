use serde_json::Value;

/// A single field read from a loosely typed store record.
///
/// The store gives no type guarantees, so every consumed field is decoded
/// into one of three states instead of being coerced.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<T> {
    Present(T),
    /// The field exists but does not have the expected type.
    Invalid(Value),
    /// The field is missing or null.
    Absent,
}

impl<T> FieldValue<T> {
    pub fn present(&self) -> Option<&T> {
        match self {
            Self::Present(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl FieldValue<i64> {
    /// Decodes an integer field.
    ///
    /// Any JSON number is present. Whole numbers within `i64` are exact;
    /// fractions round away from zero and out-of-range values saturate, so
    /// the sign of the stored number always survives (`0.5` reads as `1`,
    /// `-0.5` as `-1`). JSON exporters are free to write `3.0` for `3`.
    pub fn integer(raw: Option<&Value>) -> Self {
        match raw {
            None | Some(Value::Null) => Self::Absent,
            Some(Value::Number(number)) => {
                if let Some(int) = number.as_i64() {
                    return Self::Present(int);
                }
                if number.is_u64() {
                    return Self::Present(i64::MAX);
                }
                match number.as_f64() {
                    Some(float) if float.is_finite() => {
                        let rounded = if float > 0.0 { float.ceil() } else { float.floor() };
                        // `as` saturates at the i64 bounds.
                        Self::Present(rounded as i64)
                    }
                    _ => Self::Invalid(Value::Number(number.clone())),
                }
            }
            Some(other) => Self::Invalid(other.clone()),
        }
    }
}

impl FieldValue<String> {
    pub fn string(raw: Option<&Value>) -> Self {
        match raw {
            None | Some(Value::Null) => Self::Absent,
            Some(Value::String(text)) => Self::Present(text.clone()),
            Some(other) => Self::Invalid(other.clone()),
        }
    }
}

/// The fields of a lobby record that retirement depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct LobbyRecord {
    pub occupancy: FieldValue<i64>,
    pub created_at: FieldValue<i64>,
}

impl LobbyRecord {
    /// Decodes a lobby record.
    ///
    /// A record that is not an object at all has an invalid occupancy, so
    /// the predicate treats it as empty.
    pub fn decode(raw: &Value, occupancy_field: &str, created_at_field: &str) -> Self {
        match raw {
            Value::Object(fields) => Self {
                occupancy: FieldValue::integer(fields.get(occupancy_field)),
                created_at: FieldValue::integer(fields.get(created_at_field)),
            },
            other => Self {
                occupancy: FieldValue::Invalid(other.clone()),
                created_at: FieldValue::Absent,
            },
        }
    }
}
