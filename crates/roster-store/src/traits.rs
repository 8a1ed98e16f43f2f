use crate::error::StoreResult;
use crate::player::Player;

/// Durable player record store.
///
/// All implementations must satisfy these invariants:
/// - `id` is unique among live records; `add` never overwrites.
/// - Records with `id <= 0` are never returned by `get` or `list`.
/// - Not-found is `Ok(false)` / `Ok(None)` / a silent `Ok(())`, never an error.
/// - All I/O and decode errors are propagated, never silently ignored.
/// - After `close()`, every other method fails with `StoreError::Closed`.
pub trait PlayerStore: Send + Sync {
    /// Persist a new record.
    ///
    /// Returns `Ok(false)` without touching storage if a live record with the
    /// same id already exists.
    fn add(&self, player: &Player) -> StoreResult<bool>;

    /// Invalidate the live record with `id`. Returns `true` if it existed.
    fn remove(&self, id: i32) -> StoreResult<bool>;

    /// Replace the record identified by `id` with `player`.
    ///
    /// `player.id` must equal `id`. A missing `id` is a silent no-op.
    fn update(&self, id: i32, player: &Player) -> StoreResult<()>;

    /// Read the live record with `id`, if any.
    fn get(&self, id: i32) -> StoreResult<Option<Player>>;

    /// All live records in insertion (or physical slot) order.
    fn list(&self) -> StoreResult<Vec<Player>>;

    /// Release held resources. Idempotent.
    fn close(&self) -> StoreResult<()>;

    /// Check whether a live record with `id` exists.
    fn contains(&self, id: i32) -> StoreResult<bool> {
        Ok(self.get(id)?.is_some())
    }

    /// Number of live records.
    ///
    /// Default implementation decodes the full listing. Backends may override.
    fn len(&self) -> StoreResult<usize> {
        Ok(self.list()?.len())
    }

    /// Returns `true` if the store holds no live records.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}
