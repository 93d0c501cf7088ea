use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, de};

/// Deserialize a `String` as the desired type.
///
/// Binance delivers every numeric field as a decimal string.
pub fn de_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let data: String = Deserialize::deserialize(deserializer)?;
    data.parse::<T>().map_err(de::Error::custom)
}

/// Deserialize a `u64` millisecond epoch as a `DateTime<Utc>`.
pub fn de_u64_epoch_ms_as_datetime_utc<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let epoch_ms: u64 = Deserialize::deserialize(deserializer)?;
    DateTime::<Utc>::from_timestamp_millis(epoch_ms as i64)
        .ok_or_else(|| de::Error::custom(format!("epoch millis out of range: {epoch_ms}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "de_str")]
        price: f64,
        #[serde(deserialize_with = "de_u64_epoch_ms_as_datetime_utc")]
        time: DateTime<Utc>,
    }

    #[test]
    fn test_de_str_and_epoch_ms() {
        let input = r#"{"price":"63250.10","time":1735689600000}"#;
        let actual = serde_json::from_str::<Probe>(input).unwrap();
        assert_eq!(actual.price, 63250.10);
        assert_eq!(actual.time.timestamp_millis(), 1735689600000);
    }

    #[test]
    fn test_de_str_rejects_garbage() {
        let input = r#"{"price":"not-a-number","time":0}"#;
        assert!(serde_json::from_str::<Probe>(input).is_err());
    }
}
