pub mod watch;

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info};

use crate::{
    core::{
        entities::{DaySnapshot, Lap},
        machine::{self, Event, Outcome, SessionState},
        presets::PresetList,
    },
    storage::day_store::{DayStore, DeletedLap},
    sync::{PullOutcome, SyncEngine},
    utils::{clock::Clock, time::local_date},
};

/// How long a deleted lap stays recoverable.
pub const UNDO_GRACE: Duration = Duration::milliseconds(5000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    Restored(Lap),
    Expired,
    Nothing,
}

/// Bridges the pure session machine with the local store and the sync engine. Owns the live
/// state; every mutation runs the rollover check first, then persists, then pushes (pushes
/// are skipped for state changes that came from a sync pull).
pub struct Tracker<S: DayStore> {
    store: S,
    sync: SyncEngine,
    clock: Box<dyn Clock>,
    state: SessionState,
    presets: PresetList,
}

impl<S: DayStore> Tracker<S> {
    /// Loads today's session (or the most recent stale one so it can be rolled over), runs the
    /// rollover check, and performs the initial sync pull.
    pub async fn open(store: S, sync: SyncEngine, clock: Box<dyn Clock>) -> Result<Self> {
        let today = local_date(clock.time());

        let state = match store.load_day(today).await? {
            Some(snapshot) => SessionState::from_snapshot(today, snapshot),
            None => {
                let previous = store
                    .list_days()
                    .await?
                    .into_iter()
                    .find(|date| *date < today);
                match previous {
                    Some(date) => match store.load_day(date).await? {
                        // An older day left behind means the process was not running at
                        // midnight; loading it lets the rollover check archive it properly.
                        Some(snapshot) => SessionState::from_snapshot(date, snapshot),
                        None => SessionState::new(today),
                    },
                    None => SessionState::new(today),
                }
            }
        };

        let presets = store
            .load_presets()
            .await?
            .map(PresetList::from_names)
            .unwrap_or_else(PresetList::with_defaults);

        let mut tracker = Self {
            store,
            sync,
            clock,
            state,
            presets,
        };
        tracker.check_rollover().await?;
        tracker.pull().await?;
        Ok(tracker)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn presets(&self) -> &PresetList {
        &self.presets
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.time()
    }

    pub fn sync_configured(&self) -> bool {
        self.sync.is_configured()
    }

    pub async fn start(&mut self, name: &str) -> Result<()> {
        self.check_rollover().await?;
        self.dispatch(Event::Start {
            name: name.to_string(),
            at: self.clock.time(),
        })
        .await?;
        self.remember_preset(name).await
    }

    /// Closes the running lap and opens the next one. Returns the closed lap, if there was
    /// one; from idle this behaves like [Tracker::start].
    pub async fn record_lap(&mut self, name: &str) -> Result<Option<Lap>> {
        self.check_rollover().await?;
        let was_tracking = self.state.is_tracking();
        self.dispatch(Event::RecordLap {
            name: name.to_string(),
            at: self.clock.time(),
        })
        .await?;
        self.remember_preset(name).await?;
        Ok(if was_tracking {
            self.state.laps.first().cloned()
        } else {
            None
        })
    }

    pub async fn stop(&mut self) -> Result<Option<Lap>> {
        self.check_rollover().await?;
        let was_tracking = self.state.is_tracking();
        self.dispatch(Event::Stop {
            at: self.clock.time(),
        })
        .await?;
        Ok(if was_tracking {
            self.state.laps.first().cloned()
        } else {
            None
        })
    }

    /// Removes a completed lap. The lap is parked in the undo stash for [UNDO_GRACE]; unknown
    /// ids are a no-op. Returns whether anything was removed.
    pub async fn delete(&mut self, id: &str) -> Result<bool> {
        self.check_rollover().await?;
        let outcome = self
            .dispatch(Event::DeleteLap { id: id.to_string() })
            .await?;
        Ok(matches!(outcome, Outcome::Deleted { .. }))
    }

    /// Restores the most recently deleted lap at its original position, if the grace window
    /// has not passed and the session still belongs to the same day.
    pub async fn undo(&mut self) -> Result<UndoOutcome> {
        let Some(deleted) = self.store.take_deleted().await? else {
            return Ok(UndoOutcome::Nothing);
        };

        let now = self.clock.time();
        if now - deleted.deleted_at > UNDO_GRACE || deleted.date_key != self.state.date_key {
            debug!("Undo window for lap {} has passed", deleted.lap.id);
            return Ok(UndoOutcome::Expired);
        }

        let mut snapshot = self.state.snapshot();
        let index = deleted.index.min(snapshot.laps.len());
        snapshot.laps.insert(index, deleted.lap.clone());

        // Replacement goes through Load, but this is a genuine local mutation: persist and
        // push it like one.
        self.dispatch(Event::Load {
            date_key: self.state.date_key,
            snapshot,
        })
        .await?;
        self.push_current().await;
        Ok(UndoOutcome::Restored(deleted.lap))
    }

    /// Runs the day-boundary check. Returns whether a rollover happened.
    pub async fn check_rollover(&mut self) -> Result<bool> {
        let outcome = self
            .dispatch(Event::CheckRollover {
                now: self.clock.time(),
            })
            .await?;
        Ok(matches!(outcome, Outcome::RolledOver { .. }))
    }

    /// Sync pull for the current day plus the preset list. An adopted remote snapshot is
    /// loaded and persisted without triggering an echo push.
    pub async fn pull(&mut self) -> Result<()> {
        let date = self.state.date_key;
        match self.sync.pull_day(date, &self.state.snapshot()).await {
            PullOutcome::Adopted(snapshot) if self.state.date_key == date => {
                self.dispatch(Event::Load {
                    date_key: date,
                    snapshot,
                })
                .await?;
            }
            PullOutcome::Adopted(_) => {
                // The session moved to another day while the request was in flight.
                debug!("Discarding stale pull for {date}");
            }
            PullOutcome::NotConfigured
            | PullOutcome::Unavailable
            | PullOutcome::KeptLocal => {}
        }

        if let Some(remote_presets) = self.sync.pull_presets().await {
            let list = PresetList::from_names(remote_presets);
            if list != self.presets {
                self.presets = list;
                self.store.save_presets(self.presets.names()).await?;
            }
        }
        Ok(())
    }

    /// User-initiated refresh: pull, then push the resulting state so both sides converge.
    pub async fn refresh(&mut self) -> Result<bool> {
        if !self.sync.is_configured() {
            return Ok(false);
        }
        self.check_rollover().await?;
        self.pull().await?;
        self.sync
            .push_day(self.state.date_key, self.state.snapshot())
            .await;
        Ok(true)
    }

    pub async fn stored_day(&self, date: NaiveDate) -> Result<Option<DaySnapshot>> {
        self.store.load_day(date).await
    }

    pub async fn stored_days(&self) -> Result<Vec<NaiveDate>> {
        self.store.list_days().await
    }

    async fn dispatch(&mut self, event: Event) -> Result<Outcome> {
        let (next, outcome) = machine::apply(&self.state, event)?;
        self.state = next;

        match &outcome {
            Outcome::Noop => {}
            Outcome::Loaded => self.persist().await?,
            Outcome::Mutated => {
                self.persist().await?;
                self.push_current().await;
            }
            Outcome::Deleted { removed, index } => {
                self.store
                    .stash_deleted(&DeletedLap {
                        lap: removed.clone(),
                        index: *index,
                        date_key: self.state.date_key,
                        deleted_at: self.clock.time(),
                    })
                    .await?;
                self.persist().await?;
                self.push_current().await;
            }
            Outcome::RolledOver { outgoing } => {
                info!(
                    "Day rolled over from {} to {}",
                    outgoing.date_key, self.state.date_key
                );
                // Archive the outgoing day before the new one is first persisted. The two
                // steps are not atomic against process termination; accepted risk.
                self.store
                    .save_day(outgoing.date_key, &outgoing.snapshot)
                    .await?;
                self.sync
                    .push_day(outgoing.date_key, outgoing.snapshot.clone())
                    .await;
                self.persist().await?;
                self.push_current().await;
            }
        }
        Ok(outcome)
    }

    async fn persist(&self) -> Result<()> {
        self.store
            .save_day(self.state.date_key, &self.state.snapshot())
            .await
    }

    async fn push_current(&self) {
        self.sync
            .push_day(self.state.date_key, self.state.snapshot())
            .await;
    }

    async fn remember_preset(&mut self, name: &str) -> Result<()> {
        if self.presets.remember(name) {
            self.store.save_presets(self.presets.names()).await?;
            self.sync
                .push_presets(self.presets.names().to_vec())
                .await;
        }
        Ok(())
    }
}
