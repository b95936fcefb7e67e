//! Normalized activity storage.
//!
//! Feed responses nest activities differently: flat feeds return activities
//! at the top level, aggregated feeds return groups with an `activities`
//! array, and reposts embed whole activities under `object`. Records are kept
//! in an arena keyed by top-level id, and separate indices map each activity
//! id to every place it appears.

mod index;
pub mod reactions;
mod store;

pub use index::ActivityIndex;
pub use reactions::{apply_reaction_op, ReactionOp};
pub use store::{ActivityPath, ActivityStore, PathSegment};
