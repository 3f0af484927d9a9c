//! Request-scoped data loading for field resolvers.
//!
//! A query layer asks for arbitrary fields on arbitrary batches of entities.
//! `weft` keeps that from turning into one query per entity per field:
//!
//! - [`Loader`] coalesces the keys registered during a short window into one
//!   multi-key fetch and memoizes every key for the rest of the request.
//! - [`Slot`] holds a relationship of one entity, loaded on first access and
//!   immutable afterwards.
//! - [`ReadCoordinator`] wraps units of work in one consistent snapshot and
//!   reuses an active one instead of nesting.
//!
//! [`RequestContext`] ties these together for one request and is passed
//! explicitly to [`PerformerResolver`].

mod config;
mod context;
mod error;
mod loader;
mod performer;
mod registry;
mod repo;
mod resolver;
mod scope;
mod slot;
mod tracker;
mod url;

#[cfg(test)]
mod testing;

pub use config::LoaderConfig;
pub use context::RequestContext;
pub use error::{WeftError, WeftResult};
pub use loader::{BatchFn, LoadOutcome, Loader, LoaderStats};
pub use performer::Performer;
pub use registry::{BatchSource, Loaders, PerformerById, SceneCountByPerformer, TagById};
pub use repo::{
    GalleryReader, ImageReader, MovieReader, PerformerReader, Repository, SceneReader, TagReader,
};
pub use resolver::{FieldResults, FieldValue, PerformerField, PerformerResolver, UnknownField};
pub use scope::{ReadCoordinator, ReadScope, ScopeGuard, SnapshotSource};
pub use slot::{Slot, SlotState};
pub use tracker::{LookupGuard, LookupTracker};
pub use url::performer_image_url;

pub use weft_types as types;
