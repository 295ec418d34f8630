//! Time Utilities

use chrono::{DateTime, SecondsFormat, Utc};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Fractional days from `earlier` to `now`, never negative
pub fn elapsed_days(earlier: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - earlier).num_milliseconds().max(0) as f64;
    millis / 1000.0 / SECONDS_PER_DAY
}

/// Exponential recency in (0, 1]: 1.0 at `now`, 0.5 after `half_life_days`
pub fn half_decay(last: DateTime<Utc>, now: DateTime<Utc>, half_life_days: f64) -> f64 {
    0.5_f64.powf(elapsed_days(last, now) / half_life_days)
}

/// RFC 3339 with a fixed nine-digit fraction, so text order matches time order
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Serde adapter writing timestamps with [`format_timestamp`]. Any RFC 3339
/// precision is accepted on read.
pub mod fixed_rfc3339 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_timestamp(dt))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        DateTime::<Utc>::deserialize(deserializer)
    }
}
