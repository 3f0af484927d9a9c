//! Plain data carried between weft's persistence layer and its resolvers.
//!
//! Nothing here performs I/O or holds synchronization state; entities with
//! lazily loaded relationships are built on top of these records in `weft`.

mod ids;
mod rating;
mod records;

pub use ids::{MovieId, PerformerId, SceneId, TagId};
pub use rating::rating100_to_5;
pub use records::{Movie, PerformerRecord, Scene, StashId, Tag};
