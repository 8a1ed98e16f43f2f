//! Durable storage for player records.
//!
//! A [`Player`] is a fixed-shape record keyed by a positive integer id. Every
//! backend implements the [`PlayerStore`] trait and persists the collection in
//! its own on-disk representation:
//!
//! - [`RandomAccessStore`] -- fixed-width 56-byte slots, updated in place
//! - [`StreamStore`] -- length-prefixed binary records, appended
//! - [`TextStore`] -- one human-readable line per record
//! - [`SnapshotStore`] -- the whole collection as one checksummed blob
//! - [`DocumentStore`] -- an XML document, one element per record
//! - [`InMemoryPlayerStore`] -- nothing persisted; for tests and embedding
//!
//! [`open_store`] picks a backend from a [`StoreConfig`].
//!
//! # Contract
//!
//! 1. Ids are unique among live records; `add` never overwrites.
//! 2. Records with `id <= 0` are never live and never returned.
//! 3. Not-found is a `false` / `None` result, never an error.
//! 4. Corrupt storage fails the whole read; partial results are never returned.
//! 5. All I/O errors are propagated, never silently ignored.
//! 6. A store serializes its own operations; concurrent processes on one file
//!    are not coordinated.

pub mod config;
pub mod document;
pub mod error;
mod fsio;
pub mod memory;
pub mod player;
pub mod random_access;
pub mod snapshot;
pub mod stream;
pub mod text;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use config::{open_store, BackendKind, StoreConfig};
pub use document::DocumentStore;
pub use error::{ConfigError, StoreError, StoreResult};
pub use memory::InMemoryPlayerStore;
pub use player::Player;
pub use random_access::RandomAccessStore;
pub use snapshot::SnapshotStore;
pub use stream::StreamStore;
pub use text::TextStore;
pub use traits::PlayerStore;
