//! Offline-first sync against the remote store. Divergence is resolved wholesale by the
//! largest timestamp embedded in the data: whichever snapshot saw activity most recently wins,
//! there is no per-lap merge. Two devices editing the same day inside one sync window can
//! therefore lose one side's laps; that is the accepted trade for a single-user workload.

pub mod client;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::core::entities::DaySnapshot;

use client::RemoteStore;

/// What a pull decided. `Adopted` carries the remote snapshot the caller must load and
/// persist; everything else leaves local state alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    NotConfigured,
    Unavailable,
    KeptLocal,
    Adopted(DaySnapshot),
}

pub struct SyncEngine {
    remote: Option<Arc<dyn RemoteStore>>,
    push_in_flight: Arc<AtomicBool>,
}

impl SyncEngine {
    pub fn new(remote: Option<Arc<dyn RemoteStore>>) -> Self {
        Self {
            remote,
            push_in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn local_only() -> Self {
        Self::new(None)
    }

    pub fn is_configured(&self) -> bool {
        self.remote.is_some()
    }

    /// Fetches the remote day and compares latest embedded timestamps. The remote snapshot is
    /// adopted only when strictly newer; local wins ties. Fetch failures degrade to "no remote
    /// data" and are never surfaced as errors.
    pub async fn pull_day(&self, date: NaiveDate, local: &DaySnapshot) -> PullOutcome {
        let Some(remote) = &self.remote else {
            return PullOutcome::NotConfigured;
        };

        let remote_snapshot = match remote.fetch_day(date).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Pull for {date} failed, continuing with local data: {e:#}");
                return PullOutcome::Unavailable;
            }
        };

        if remote_snapshot.latest_timestamp() > local.latest_timestamp() {
            info!("Remote snapshot for {date} is newer, adopting it");
            PullOutcome::Adopted(remote_snapshot)
        } else {
            PullOutcome::KeptLocal
        }
    }

    /// Sends the full day snapshot, replacing whatever the remote holds. At most one push is
    /// in flight; a push attempted while one is outstanding is dropped, the next mutation is
    /// the de facto retry. Returns whether a request was actually sent.
    pub async fn push_day(&self, date: NaiveDate, snapshot: DaySnapshot) -> bool {
        let Some(remote) = &self.remote else {
            return false;
        };

        if self
            .push_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("A push is already in flight, dropping this one");
            return false;
        }

        let result = remote.push_day(date, snapshot).await;
        self.push_in_flight.store(false, Ordering::Release);

        match result {
            Ok(_) => {
                debug!("Pushed {date}");
                true
            }
            Err(e) => {
                warn!("Push for {date} failed, local data is unaffected: {e:#}");
                false
            }
        }
    }

    /// Remote presets win whenever they exist and are non-empty, mirroring the original
    /// behavior; there is no timestamp to compare on a plain name list.
    pub async fn pull_presets(&self) -> Option<Vec<String>> {
        let remote = self.remote.as_ref()?;
        match remote.fetch_presets().await {
            Ok(presets) if !presets.is_empty() => Some(presets),
            Ok(_) => None,
            Err(e) => {
                warn!("Presets pull failed, keeping local list: {e:#}");
                None
            }
        }
    }

    pub async fn push_presets(&self, presets: Vec<String>) {
        let Some(remote) = &self.remote else {
            return;
        };
        if let Err(e) = remote.push_presets(presets).await {
            warn!("Presets push failed: {e:#}");
        }
    }
}
