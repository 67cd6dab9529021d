//! Deterministic artifact keys

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub file_name: String,
    /// Full object key, `file_name` under a `year/month/day/` prefix
    pub key: String,
}

/// Key for an artifact of `table` whose newest row has `watermark`
///
/// Fields are not zero padded, e.g.
/// `2025/6/1/currency_2025-6-1_10-30-0_0.parquet`. The same inputs always
/// produce the same key, so re-staging an unchanged watermark overwrites
/// the earlier artifact instead of adding a second one.
pub fn artifact_key(table: &str, watermark: NaiveDateTime, extension: &str) -> ArtifactKey {
    let (y, mo, d) = (watermark.year(), watermark.month(), watermark.day());
    let file_name = format!(
        "{}_{}-{}-{}_{}-{}-{}_{}.{}",
        table,
        y,
        mo,
        d,
        watermark.hour(),
        watermark.minute(),
        watermark.second(),
        watermark.nanosecond() / 1_000,
        extension
    );
    let key = format!("{}/{}/{}/{}", y, mo, d, file_name);
    ArtifactKey { file_name, key }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    #[test]
    fn test_artifact_key_format() {
        let ts = NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_micro_opt(10, 30, 5, 42)
            .unwrap();

        let key = artifact_key("sales_order", ts, "parquet");
        assert_eq!(key.file_name, "sales_order_2025-6-1_10-30-5_42.parquet");
        assert_eq!(key.key, "2025/6/1/sales_order_2025-6-1_10-30-5_42.parquet");
    }

    proptest! {
        #[test]
        fn prop_artifact_key_is_deterministic(
            secs in 0i64..4_102_444_800,
            micros in 0u32..1_000_000,
            table in "[a-z_]{1,20}",
        ) {
            let ts = chrono::DateTime::from_timestamp(secs, micros * 1_000).unwrap().naive_utc();
            prop_assert_eq!(artifact_key(&table, ts, "parquet"), artifact_key(&table, ts, "parquet"));
        }

        #[test]
        fn prop_distinct_seconds_give_distinct_keys(secs in 0i64..4_102_444_800, delta in 1i64..86_400) {
            let a = chrono::DateTime::from_timestamp(secs, 0).unwrap().naive_utc();
            let b = chrono::DateTime::from_timestamp(secs + delta, 0).unwrap().naive_utc();
            prop_assert_ne!(artifact_key("design", a, "parquet").key, artifact_key("design", b, "parquet").key);
        }
    }
}
