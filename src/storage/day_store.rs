use std::{
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use fs4::tokio::AsyncFileExt;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::{debug, warn};

use crate::{
    core::entities::{DaySnapshot, Lap},
    utils::time::{date_key, parse_date_key},
};

/// A lap removed from the session, parked for the undo grace window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedLap {
    pub lap: Lap,
    pub index: usize,
    pub date_key: NaiveDate,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub deleted_at: DateTime<Utc>,
}

/// Interface for the durable local store. Values are opaque JSON blobs keyed by calendar day
/// plus two singleton keys (presets, undo stash).
pub trait DayStore: Send + Sync + 'static {
    fn load_day(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<DaySnapshot>>> + Send;

    fn save_day(
        &self,
        date: NaiveDate,
        snapshot: &DaySnapshot,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Days with stored data, newest first.
    fn list_days(&self) -> impl Future<Output = Result<Vec<NaiveDate>>> + Send;

    fn load_presets(&self) -> impl Future<Output = Result<Option<Vec<String>>>> + Send;

    fn save_presets(&self, presets: &[String]) -> impl Future<Output = Result<()>> + Send;

    fn stash_deleted(&self, deleted: &DeletedLap) -> impl Future<Output = Result<()>> + Send;

    /// Takes the stashed lap out of the store, leaving it empty.
    fn take_deleted(&self) -> impl Future<Output = Result<Option<DeletedLap>>> + Send;
}

/// The main realization of [DayStore]: one JSON file per day under `days/`, plus
/// `presets.json` and `undo.json`. Files are locked with fs4 because one-shot commands and a
/// running watch loop can touch the same day concurrently.
pub struct FileDayStore {
    days_dir: PathBuf,
    root: PathBuf,
}

impl FileDayStore {
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        let days_dir = root.join("days");
        std::fs::create_dir_all(&days_dir)?;
        Ok(Self { days_dir, root })
    }

    fn day_path(&self, date: NaiveDate) -> PathBuf {
        self.days_dir.join(format!("{}.json", date_key(date)))
    }

    async fn read_json<V: DeserializeOwned>(path: &Path) -> Result<Option<V>> {
        let mut file = match File::open(path).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        file.lock_shared()?;
        let mut raw = String::new();
        let read = file.read_to_string(&mut raw).await;
        file.unlock_async().await?;
        read?;

        match serde_json::from_str::<V>(&raw) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                // Corrupted data is as good as no data. Might happen after shutdowns.
                warn!("Could not parse {path:?}, treating it as absent: {e}");
                Ok(None)
            }
        }
    }

    async fn write_json<V: Serialize>(path: &Path, value: &V) -> Result<()> {
        debug!("Writing {path:?}");
        let mut file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await?;
        file.lock_exclusive()?;
        let result = async {
            file.write_all(&serde_json::to_vec(value)?).await?;
            file.flush().await?;
            Ok(())
        }
        .await;
        file.unlock_async().await?;
        result
    }
}

impl DayStore for FileDayStore {
    async fn load_day(&self, date: NaiveDate) -> Result<Option<DaySnapshot>> {
        Self::read_json(&self.day_path(date)).await
    }

    async fn save_day(&self, date: NaiveDate, snapshot: &DaySnapshot) -> Result<()> {
        Self::write_json(&self.day_path(date), snapshot).await
    }

    async fn list_days(&self) -> Result<Vec<NaiveDate>> {
        let mut days = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.days_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|v| v.strip_suffix(".json")) else {
                continue;
            };
            if let Some(date) = parse_date_key(stem) {
                days.push(date);
            }
        }
        days.sort_unstable();
        days.reverse();
        Ok(days)
    }

    async fn load_presets(&self) -> Result<Option<Vec<String>>> {
        Self::read_json(&self.root.join("presets.json")).await
    }

    async fn save_presets(&self, presets: &[String]) -> Result<()> {
        Self::write_json(&self.root.join("presets.json"), &presets).await
    }

    async fn stash_deleted(&self, deleted: &DeletedLap) -> Result<()> {
        Self::write_json(&self.root.join("undo.json"), deleted).await
    }

    async fn take_deleted(&self) -> Result<Option<DeletedLap>> {
        let path = self.root.join("undo.json");
        let deleted = Self::read_json(&path).await?;
        match tokio::fs::remove_file(&path).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use crate::core::entities::ActiveLap;

    use super::*;

    fn sample_snapshot() -> DaySnapshot {
        let start = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        DaySnapshot {
            laps: vec![ActiveLap {
                id: "a1".into(),
                name: "work".into(),
                start_time: start,
            }
            .close(start + chrono::Duration::minutes(30))],
            active_lap: Some(ActiveLap {
                id: "a2".into(),
                name: "lunch".into(),
                start_time: start + chrono::Duration::minutes(30),
            }),
        }
    }

    #[tokio::test]
    async fn day_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let store = FileDayStore::new(dir.path().to_owned())?;
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();

        assert_eq!(store.load_day(date).await?, None);

        let snapshot = sample_snapshot();
        store.save_day(date, &snapshot).await?;
        assert_eq!(store.load_day(date).await?, Some(snapshot));
        Ok(())
    }

    #[tokio::test]
    async fn malformed_day_is_treated_as_absent() -> Result<()> {
        let dir = tempdir()?;
        let store = FileDayStore::new(dir.path().to_owned())?;
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();

        std::fs::write(store.day_path(date), "{\"laps\": [truncated")?;
        assert_eq!(store.load_day(date).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn list_days_is_newest_first_and_skips_garbage() -> Result<()> {
        let dir = tempdir()?;
        let store = FileDayStore::new(dir.path().to_owned())?;
        let older = NaiveDate::from_ymd_opt(2026, 3, 6).unwrap();
        let newer = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();

        store.save_day(older, &DaySnapshot::default()).await?;
        store.save_day(newer, &DaySnapshot::default()).await?;
        std::fs::write(dir.path().join("days/notes.txt"), "x")?;

        assert_eq!(store.list_days().await?, vec![newer, older]);
        Ok(())
    }

    #[tokio::test]
    async fn presets_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let store = FileDayStore::new(dir.path().to_owned())?;

        assert_eq!(store.load_presets().await?, None);
        let presets = vec!["work".to_string(), "lunch".to_string()];
        store.save_presets(&presets).await?;
        assert_eq!(store.load_presets().await?, Some(presets));
        Ok(())
    }

    #[tokio::test]
    async fn undo_stash_is_taken_once() -> Result<()> {
        let dir = tempdir()?;
        let store = FileDayStore::new(dir.path().to_owned())?;

        let deleted = DeletedLap {
            lap: sample_snapshot().laps.remove(0),
            index: 0,
            date_key: NaiveDate::from_ymd_opt(2026, 3, 7).unwrap(),
            deleted_at: Utc.timestamp_millis_opt(1_700_000_100_000).unwrap(),
        };
        store.stash_deleted(&deleted).await?;

        assert_eq!(store.take_deleted().await?, Some(deleted));
        assert_eq!(store.take_deleted().await?, None);
        Ok(())
    }
}
