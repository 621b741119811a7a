//! Checkpoints for batch collection runs
//!
//! Persistent progress with atomic writes and advisory file locking.

pub mod checkpoint;
pub mod lock;
pub mod state;

pub use checkpoint::BatchCheckpoint;
pub use state::ResumeError;
