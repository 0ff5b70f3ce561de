//! Facade liveness, playback reporting and the live view.

pub mod frames;
pub mod handlers;
pub mod liveness;
pub mod retention;
