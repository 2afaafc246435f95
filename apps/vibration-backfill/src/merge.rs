use chrono::DateTime;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Observation {
    pub t: i64,
    #[serde(default)]
    pub v: Option<f64>,
}

/// Per-signal observations for one device/window, in the order CoNNXT sent
/// the signals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSignalSeries {
    signals: Vec<(String, Vec<Observation>)>,
}

impl RawSignalSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, observations: Vec<Observation>) {
        self.signals.push((name.into(), observations));
    }

    pub fn is_empty(&self) -> bool {
        self.signals.iter().all(|(_, obs)| obs.is_empty())
    }

    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Observation])> {
        self.signals
            .iter()
            .map(|(name, obs)| (name.as_str(), obs.as_slice()))
    }
}

impl<'de> Deserialize<'de> for RawSignalSeries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SeriesVisitor;

        impl<'de> Visitor<'de> for SeriesVisitor {
            type Value = RawSignalSeries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of signal name to [{t, v}] lists")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut series = RawSignalSeries::new();
                while let Some((name, observations)) =
                    map.next_entry::<String, Option<Vec<Observation>>>()?
                {
                    series.push(name, observations.unwrap_or_default());
                }
                Ok(series)
            }
        }

        deserializer.deserialize_map(SeriesVisitor)
    }
}

/// All signal values observed at one timestamp for one device.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub device_id: i64,
    pub timestamp: String,
    values: Vec<(String, f64)>,
}

impl MergedRow {
    pub fn value(&self, signal: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(name, _)| name == signal)
            .map(|(_, value)| *value)
    }

    #[cfg(test)]
    pub fn signals(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }
}

struct PendingRow {
    timestamp_ms: i64,
    values: Vec<(String, f64)>,
}

impl PendingRow {
    fn set(&mut self, signal: &str, value: f64) {
        match self.values.iter_mut().find(|(name, _)| name == signal) {
            Some(slot) => slot.1 = value,
            None => self.values.push((signal.to_string(), value)),
        }
    }
}

/// Pivot per-signal series into one row per distinct timestamp. Rows come
/// out in the order their timestamp was first seen, not sorted.
pub fn merge_rows(device_id: i64, raw: &RawSignalSeries) -> Vec<MergedRow> {
    let mut rows: Vec<PendingRow> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    for (signal, observations) in raw.iter() {
        for observation in observations {
            let Some(value) = observation.v else {
                continue;
            };
            let slot = *index.entry(observation.t).or_insert_with(|| {
                rows.push(PendingRow {
                    timestamp_ms: observation.t,
                    values: Vec::new(),
                });
                rows.len() - 1
            });
            rows[slot].set(signal, value);
        }
    }

    rows.into_iter()
        .filter_map(|row| match format_row_timestamp(row.timestamp_ms) {
            Some(timestamp) => Some(MergedRow {
                device_id,
                timestamp,
                values: row.values,
            }),
            None => {
                tracing::warn!(
                    device_id,
                    timestamp_ms = row.timestamp_ms,
                    "dropping observation with out-of-range timestamp"
                );
                None
            }
        })
        .collect()
}

/// Epoch milliseconds to `2024-09-11T00:00:00.000000Z`, the form Lizard
/// ingests.
pub fn format_row_timestamp(timestamp_ms: i64) -> Option<String> {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(t: i64, v: f64) -> Observation {
        Observation { t, v: Some(v) }
    }

    #[test]
    fn temperature_only_response_yields_one_row_per_timestamp() {
        let raw: RawSignalSeries = serde_json::from_str(
            r#"{"Temperature":[{"t":1726012800000,"v":20.1},{"t":1726013700000,"v":19.9}]}"#,
        )
        .expect("decoded");

        let rows = merge_rows(609, &raw);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].device_id, 609);
        assert_eq!(rows[0].timestamp, "2024-09-11T00:00:00.000000Z");
        assert_eq!(rows[0].value("Temperature"), Some(20.1));
        assert_eq!(rows[0].value("VRms"), None);
        assert_eq!(rows[1].timestamp, "2024-09-11T00:15:00.000000Z");
        assert_eq!(rows[1].value("Temperature"), Some(19.9));
    }

    #[test]
    fn signals_sharing_a_timestamp_land_in_one_row() {
        let mut raw = RawSignalSeries::new();
        raw.push("VRms", vec![obs(2_000, 1.5), obs(1_000, 1.0)]);
        raw.push("ARms", vec![obs(1_000, 0.2), obs(3_000, 0.4)]);

        let rows = merge_rows(610, &raw);
        let stamps: Vec<&str> = rows.iter().map(|r| r.timestamp.as_str()).collect();
        assert_eq!(
            stamps,
            vec![
                "1970-01-01T00:00:02.000000Z",
                "1970-01-01T00:00:01.000000Z",
                "1970-01-01T00:00:03.000000Z",
            ]
        );
        assert_eq!(rows[1].value("VRms"), Some(1.0));
        assert_eq!(rows[1].value("ARms"), Some(0.2));
        assert_eq!(rows[2].value("VRms"), None);
        assert!(rows.iter().all(|r| r.device_id == 610));

        let total: usize = rows.iter().map(|r| r.signals().count()).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn repeated_observation_keeps_the_last_value() {
        let mut raw = RawSignalSeries::new();
        raw.push("APeak", vec![obs(5_000, 1.0), obs(5_000, 2.0)]);

        let rows = merge_rows(1, &raw);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value("APeak"), Some(2.0));
    }

    #[test]
    fn empty_series_merge_to_no_rows() {
        assert!(merge_rows(609, &RawSignalSeries::new()).is_empty());

        let raw: RawSignalSeries =
            serde_json::from_str(r#"{"VRms":[],"Temperature":[],"ARms":null}"#).expect("decoded");
        assert!(raw.is_empty());
        assert_eq!(raw.signal_count(), 3);
        assert!(merge_rows(609, &raw).is_empty());
    }

    #[test]
    fn observations_without_value_create_no_row() {
        let raw: RawSignalSeries =
            serde_json::from_str(r#"{"VRms":[{"t":1000},{"t":2000,"v":null}]}"#).expect("decoded");
        assert!(merge_rows(609, &raw).is_empty());
    }

    #[test]
    fn decode_preserves_signal_order() {
        let raw: RawSignalSeries = serde_json::from_str(
            r#"{"VRms":[{"t":1,"v":1}],"APeak":[{"t":1,"v":2}],"ARms":[{"t":1,"v":3}]}"#,
        )
        .expect("decoded");
        let names: Vec<&str> = raw.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["VRms", "APeak", "ARms"]);

        let rows = merge_rows(609, &raw);
        assert_eq!(
            rows[0].signals().collect::<Vec<_>>(),
            vec!["VRms", "APeak", "ARms"]
        );
    }

    #[test]
    fn out_of_range_timestamps_are_dropped() {
        let mut raw = RawSignalSeries::new();
        raw.push("VRms", vec![obs(i64::MAX, 1.0), obs(0, 2.0)]);
        let rows = merge_rows(609, &raw);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, "1970-01-01T00:00:00.000000Z");
    }
}
