//! Wire types shared by every cadence component: command envelopes,
//! outcomes, synchronization messages and well-known nature names.

pub mod frames;
pub mod natures;
pub mod sync;

pub use frames::{Command, Nature, Outcome};
pub use sync::{SyncKind, SyncMessage};
