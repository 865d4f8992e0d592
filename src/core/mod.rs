//! The session core: data model, the pure state machine over it, and the preset list.
//! Nothing in here performs I/O; persistence and sync live on top.

pub mod entities;
pub mod machine;
pub mod presets;
