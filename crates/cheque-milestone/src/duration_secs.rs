//! Serde adapter for optional [`chrono::Duration`] fields, stored as whole seconds.
//!
//! Use with `#[serde(default, with = "cheque_milestone::duration_secs")]`.

use chrono::Duration;
use serde::{Deserialize, Deserializer, Serializer};

/// Serialize an optional duration as its whole number of seconds
///
/// # Errors
/// Propagates serializer errors.
#[allow(clippy::ref_option)]
pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(d) => serializer.serialize_some(&d.num_seconds()),
        None => serializer.serialize_none(),
    }
}

/// Deserialize an optional duration from whole seconds
///
/// # Errors
/// Fails when the value is out of the representable range.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let secs: Option<i64> = Option::deserialize(deserializer)?;
    secs.map(|s| {
        Duration::try_seconds(s)
            .ok_or_else(|| serde::de::Error::custom(format!("duration out of range: {s}s")))
    })
    .transpose()
}

/// Adapter for non-optional duration fields.
///
/// Use with `#[serde(with = "cheque_milestone::duration_secs::required")]`.
pub mod required {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize a duration as whole seconds
    ///
    /// # Errors
    /// Propagates serializer errors.
    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(value.num_seconds())
    }

    /// Deserialize a duration from whole seconds
    ///
    /// # Errors
    /// Fails when the value is out of the representable range.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = i64::deserialize(deserializer)?;
        Duration::try_seconds(secs)
            .ok_or_else(|| serde::de::Error::custom(format!("duration out of range: {secs}s")))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Holder {
        #[serde(default, with = "super")]
        span: Option<Duration>,
    }

    #[test]
    fn reads_seconds_and_missing_field() {
        let h: Holder = serde_json::from_str(r#"{"span": 90}"#).unwrap();
        assert_eq!(h.span, Some(Duration::seconds(90)));

        let empty: Holder = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.span, None);
    }

    #[test]
    fn writes_seconds() {
        let h = Holder {
            span: Some(Duration::minutes(2)),
        };
        assert_eq!(serde_json::to_string(&h).unwrap(), r#"{"span":120}"#);
    }
}
