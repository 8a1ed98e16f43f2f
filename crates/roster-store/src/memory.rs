use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::player::Player;
use crate::traits::PlayerStore;

/// In-memory, `Vec`-based player store.
///
/// Intended for tests and embedding, and as the reference model the file
/// backends are checked against. Records are held in insertion order behind a
/// `RwLock`; nothing is persisted.
pub struct InMemoryPlayerStore {
    /// `None` once the store has been closed.
    players: RwLock<Option<Vec<Player>>>,
}

impl InMemoryPlayerStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            players: RwLock::new(Some(Vec::new())),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&[Player]) -> T) -> StoreResult<T> {
        let guard = self.players.read().map_err(|_| StoreError::Poisoned)?;
        let players = guard.as_deref().ok_or(StoreError::Closed)?;
        Ok(f(players))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Vec<Player>) -> T) -> StoreResult<T> {
        let mut guard = self.players.write().map_err(|_| StoreError::Poisoned)?;
        let players = guard.as_mut().ok_or(StoreError::Closed)?;
        Ok(f(players))
    }
}

impl Default for InMemoryPlayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerStore for InMemoryPlayerStore {
    fn add(&self, player: &Player) -> StoreResult<bool> {
        player.check_insertable()?;
        self.write(|players| {
            if players.iter().any(|p| p.id == player.id) {
                return false;
            }
            players.push(player.clone());
            true
        })
    }

    fn remove(&self, id: i32) -> StoreResult<bool> {
        self.write(|players| {
            let before = players.len();
            players.retain(|p| !(p.is_live() && p.id == id));
            players.len() != before
        })
    }

    fn update(&self, id: i32, player: &Player) -> StoreResult<()> {
        player.check_replaces(id)?;
        self.write(|players| {
            if let Some(slot) = players.iter_mut().find(|p| p.is_live() && p.id == id) {
                *slot = player.clone();
            }
        })
    }

    fn get(&self, id: i32) -> StoreResult<Option<Player>> {
        self.read(|players| players.iter().find(|p| p.is_live() && p.id == id).cloned())
    }

    fn list(&self) -> StoreResult<Vec<Player>> {
        self.read(|players| players.to_vec())
    }

    fn close(&self) -> StoreResult<()> {
        match self.players.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
        Ok(())
    }

    fn len(&self) -> StoreResult<usize> {
        self.read(<[Player]>::len)
    }
}

impl std::fmt::Debug for InMemoryPlayerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len().ok();
        f.debug_struct("InMemoryPlayerStore")
            .field("player_count", &count)
            .finish()
    }
}
