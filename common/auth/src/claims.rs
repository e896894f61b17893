use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::error::{AuthError, AuthResult};

/// Verified claim set of a token, reduced to what the auth checks look at.
#[derive(Debug, Clone)]
pub struct Claims {
    pub expires_at: Option<DateTime<Utc>>,
    pub not_before: Option<DateTime<Utc>>,
    pub issued_at: Option<DateTime<Utc>>,
    pub audience: Option<Value>,
    pub raw: Map<String, Value>,
}

impl Claims {
    /// String value of an arbitrary claim, `None` when absent or not a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.raw.get(name).and_then(Value::as_str)
    }

    /// True when the token carries an `aud` that is not exactly `expected`.
    pub fn audience_differs(&self, expected: Option<&str>) -> bool {
        match (&self.audience, expected) {
            (None, _) => false,
            (Some(Value::String(aud)), Some(expected)) => aud != expected,
            (Some(_), _) => true,
        }
    }
}

fn timestamp_claim(name: &'static str, value: &Value) -> AuthResult<DateTime<Utc>> {
    let seconds = value
        .as_i64()
        .or_else(|| value.as_f64().map(|secs| secs.trunc() as i64))
        .ok_or_else(|| AuthError::InvalidClaim(name, value.to_string()))?;
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| AuthError::InvalidClaim(name, value.to_string()))
}

fn optional_timestamp(
    raw: &Map<String, Value>,
    name: &'static str,
) -> AuthResult<Option<DateTime<Utc>>> {
    raw.get(name)
        .map(|value| timestamp_claim(name, value))
        .transpose()
}

impl TryFrom<Value> for Claims {
    type Error = AuthError;

    fn try_from(value: Value) -> AuthResult<Self> {
        let raw = match value {
            Value::Object(map) => map,
            other => {
                return Err(AuthError::Malformed(format!(
                    "claim set is not an object: {other}"
                )))
            }
        };

        // exp/nbf of the wrong type are skipped by the decoder, so they fail here
        let expires_at = optional_timestamp(&raw, "exp")?;
        let not_before = optional_timestamp(&raw, "nbf")?;
        let issued_at = optional_timestamp(&raw, "iat")?;
        let audience = raw.get("aud").filter(|aud| !aud.is_null()).cloned();

        Ok(Self {
            expires_at,
            not_before,
            issued_at,
            audience,
            raw,
        })
    }
}
