//! Records named time intervals ("laps") for one day at a time, keeps them on disk, and
//! optionally syncs them with a small remote key-value store so the same log can be continued
//! from another device. Works fully offline; the remote is a convenience, not a requirement.

pub mod cli;
pub mod core;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod tracker;
pub mod utils;
