use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::utils::time::{local_date, local_midnight};

use super::entities::{fresh_id, ActiveLap, DaySnapshot, Lap};

/// The whole in-memory state of one tracked day. Completed laps are kept newest first and
/// every mutation goes through [apply]; nothing else touches the lap list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub date_key: NaiveDate,
    pub laps: Vec<Lap>,
    pub active: Option<ActiveLap>,
    /// Monotonic counter feeding lap id generation. Never reset, so ids are not reused within
    /// the observable history of a session even across loads.
    seq: u64,
}

impl SessionState {
    pub fn new(date_key: NaiveDate) -> Self {
        Self {
            date_key,
            laps: Vec::new(),
            active: None,
            seq: 0,
        }
    }

    pub fn from_snapshot(date_key: NaiveDate, snapshot: DaySnapshot) -> Self {
        Self {
            date_key,
            laps: snapshot.laps,
            active: snapshot.active_lap,
            seq: 0,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.active.is_some()
    }

    pub fn snapshot(&self) -> DaySnapshot {
        DaySnapshot {
            laps: self.laps.clone(),
            active_lap: self.active.clone(),
        }
    }

    fn open_lap(&mut self, name: &str, at: DateTime<Utc>) {
        self.active = Some(ActiveLap {
            id: fresh_id(at, self.seq),
            name: name.to_string(),
            start_time: at,
        });
        self.seq += 1;
    }

    fn close_active(&mut self, at: DateTime<Utc>) -> bool {
        match self.active.take() {
            Some(active) => {
                self.laps.insert(0, active.close(at));
                true
            }
            None => false,
        }
    }
}

/// Session events. Wall-clock instants travel inside the event so the transition function
/// stays a pure value-to-value mapping.
#[derive(Debug, Clone)]
pub enum Event {
    Start { name: String, at: DateTime<Utc> },
    RecordLap { name: String, at: DateTime<Utc> },
    Stop { at: DateTime<Utc> },
    DeleteLap { id: String },
    Load { date_key: NaiveDate, snapshot: DaySnapshot },
    CheckRollover { now: DateTime<Utc> },
}

/// What a transition did, beyond producing the next state. The caller uses this to decide
/// which side effects follow: persist, push, archive, or nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Noop,
    Mutated,
    /// A lap was removed. The removed lap and its position are reported so the caller can hold
    /// them for the undo grace window; the machine itself forgets the lap immediately.
    Deleted { removed: Lap, index: usize },
    /// State was replaced from an external snapshot. Persist, but do not push: the snapshot
    /// came from the remote in the first place.
    Loaded,
    /// The calendar day changed. `outgoing` is the finalized previous day, ready to archive.
    RolledOver { outgoing: ArchivedDay },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedDay {
    pub date_key: NaiveDate,
    pub snapshot: DaySnapshot,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("an activity is already being tracked; stop it or record a lap instead")]
    AlreadyTracking,
}

/// The transition function. Pure: no clock reads, no I/O, no hidden state.
pub fn apply(state: &SessionState, event: Event) -> Result<(SessionState, Outcome), EventError> {
    match event {
        Event::Start { name, at } => {
            if state.is_tracking() {
                return Err(EventError::AlreadyTracking);
            }
            let mut next = state.clone();
            next.open_lap(&name, at);
            Ok((next, Outcome::Mutated))
        }
        Event::RecordLap { name, at } => {
            let mut next = state.clone();
            next.close_active(at);
            next.open_lap(&name, at);
            Ok((next, Outcome::Mutated))
        }
        Event::Stop { at } => {
            let mut next = state.clone();
            if next.close_active(at) {
                Ok((next, Outcome::Mutated))
            } else {
                Ok((next, Outcome::Noop))
            }
        }
        Event::DeleteLap { id } => match state.laps.iter().position(|lap| lap.id == id) {
            Some(index) => {
                let mut next = state.clone();
                let removed = next.laps.remove(index);
                Ok((next, Outcome::Deleted { removed, index }))
            }
            None => Ok((state.clone(), Outcome::Noop)),
        },
        Event::Load { date_key, snapshot } => {
            let mut next = SessionState::from_snapshot(date_key, snapshot);
            next.seq = state.seq;
            Ok((next, Outcome::Loaded))
        }
        Event::CheckRollover { now } => {
            let today = local_date(now);
            if today == state.date_key {
                return Ok((state.clone(), Outcome::Noop));
            }

            // The boundary is always local midnight computed from the wall-clock date, never
            // the instant the check happens to run.
            let midnight = local_midnight(today);
            let carried_name = state.active.as_ref().map(|v| v.name.clone());

            let mut outgoing = state.clone();
            outgoing.close_active(midnight);

            let mut next = SessionState::new(today);
            next.seq = outgoing.seq;
            if let Some(name) = carried_name {
                next.open_lap(&name, midnight);
            }

            Ok((
                next,
                Outcome::RolledOver {
                    outgoing: ArchivedDay {
                        date_key: outgoing.date_key,
                        snapshot: outgoing.snapshot(),
                    },
                },
            ))
        }
    }
}
