pub mod action;
pub mod checkpoint;
pub mod condition;
pub mod error;
pub mod executor;
pub mod record;
pub mod registry;
pub mod rollback;
pub mod sequencer;
pub mod session;

pub use action::SequenceKind;
pub use error::{Result, RolloutError};
