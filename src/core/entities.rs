use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// A completed timed interval. Once closed a lap never changes; `duration` is always exactly
/// `end_time - start_time`.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Lap {
    pub id: String,
    pub name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end_time: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

/// An in-progress interval. Kept as a separate type so that a lap without an end time cannot
/// appear in the completed list.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ActiveLap {
    pub id: String,
    pub name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
}

impl ActiveLap {
    pub fn close(self, at: DateTime<Utc>) -> Lap {
        Lap {
            id: self.id,
            name: self.name,
            start_time: self.start_time,
            end_time: at,
            duration: at - self.start_time,
        }
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        now - self.start_time
    }
}

/// The persisted and wire form of one day: completed laps newest first, plus at most one
/// active lap. This is exactly the JSON blob stored under `day:{dateKey}` on both sides.
#[derive(PartialEq, Eq, Debug, Default, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct DaySnapshot {
    pub laps: Vec<Lap>,
    pub active_lap: Option<ActiveLap>,
}

impl DaySnapshot {
    pub fn is_empty(&self) -> bool {
        self.laps.is_empty() && self.active_lap.is_none()
    }

    /// Max over every timestamp embedded in the snapshot. This is the value snapshots are
    /// compared by during sync; an empty snapshot has none and loses to anything.
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        let mut latest = self.active_lap.as_ref().map(|v| v.start_time);
        for lap in &self.laps {
            latest = latest.max(Some(lap.start_time)).max(Some(lap.end_time));
        }
        latest
    }
}

/// Lap ids mirror the original scheme: base-36 creation time in milliseconds plus a
/// disambiguating sequence number, so ids created within the same millisecond still differ.
pub fn fresh_id(at: DateTime<Utc>, seq: u64) -> String {
    format!(
        "{}-{}",
        to_base36(at.timestamp_millis().max(0) as u64),
        to_base36(seq)
    )
}

fn to_base36(mut v: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if v == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while v > 0 {
        out.push(DIGITS[(v % 36) as usize] as char);
        v /= 36;
    }
    out.iter().rev().collect()
}

mod duration_ms {
    use chrono::Duration;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_milliseconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = i64::deserialize(deserializer)?;
        Ok(Duration::milliseconds(ms))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn close_computes_duration_exactly() {
        let lap = ActiveLap {
            id: "a".into(),
            name: "work".into(),
            start_time: at(1_000),
        }
        .close(at(3_601_000));
        assert_eq!(lap.duration, Duration::milliseconds(3_600_000));
        assert_eq!(lap.end_time - lap.start_time, lap.duration);
    }

    #[test]
    fn wire_format_matches_original_keys() {
        let snapshot = DaySnapshot {
            laps: vec![ActiveLap {
                id: "a1".into(),
                name: "work".into(),
                start_time: at(0),
            }
            .close(at(60_000))],
            active_lap: Some(ActiveLap {
                id: "a2".into(),
                name: "lunch".into(),
                start_time: at(60_000),
            }),
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "laps": [{
                    "id": "a1",
                    "name": "work",
                    "startTime": 0,
                    "endTime": 60_000,
                    "duration": 60_000,
                }],
                "activeLap": {"id": "a2", "name": "lunch", "startTime": 60_000},
            })
        );

        let back: DaySnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let snapshot: DaySnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.latest_timestamp(), None);
    }

    #[test]
    fn latest_timestamp_scans_all_fields() {
        let mut snapshot = DaySnapshot {
            laps: vec![ActiveLap {
                id: "a1".into(),
                name: "work".into(),
                start_time: at(10),
            }
            .close(at(500))],
            active_lap: None,
        };
        assert_eq!(snapshot.latest_timestamp(), Some(at(500)));

        snapshot.active_lap = Some(ActiveLap {
            id: "a2".into(),
            name: "relax".into(),
            start_time: at(900),
        });
        assert_eq!(snapshot.latest_timestamp(), Some(at(900)));
    }

    #[test]
    fn ids_differ_within_one_millisecond() {
        let t = at(1_700_000_000_000);
        assert_ne!(fresh_id(t, 1), fresh_id(t, 2));
        assert_ne!(fresh_id(t, 1), fresh_id(at(1_700_000_000_001), 1));
    }
}
