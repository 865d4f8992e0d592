//!  The durable local store.
//!  The basic idea is:
//!   - There is an application state directory.
//!   - Each local calendar day is stored as one JSON snapshot file under `days/`.
//!   - The preset list and the undo stash are singleton JSON files next to it.
//!   - Values stay opaque to the store; corrupted ones count as absent.

pub mod day_store;
