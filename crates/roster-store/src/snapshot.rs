//! Whole-collection snapshot backend.
//!
//! The live collection is one blob, rewritten on every mutation:
//!
//! ```text
//! [4 bytes: magic "RSNP"]
//! [4 bytes: format version (u32 BE)]
//! [4 bytes: CRC32 of payload (u32 BE)]
//! [N bytes: payload (bincode-serialized Vec<Player>)]
//! ```
//!
//! An empty or missing file is an empty collection. Any other decode failure
//! fails the whole read.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::fsio::BackingFile;
use crate::player::Player;
use crate::traits::PlayerStore;

/// Leading magic bytes of a snapshot file.
pub const SNAPSHOT_MAGIC: &[u8; 4] = b"RSNP";

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

const HEADER_SIZE: usize = 12;

/// Player store that keeps the whole collection in one snapshot blob.
#[derive(Debug)]
pub struct SnapshotStore {
    file: BackingFile,
}

impl SnapshotStore {
    /// Open (or create) a snapshot file at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with(path, false)
    }

    /// Open (or create) a snapshot file, optionally syncing after every write.
    pub fn open_with(path: &Path, sync_writes: bool) -> StoreResult<Self> {
        Ok(Self {
            file: BackingFile::open(path, &[], sync_writes)?,
        })
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    fn load(&self, bytes: &[u8]) -> StoreResult<Vec<Player>> {
        decode_snapshot(bytes).map_err(|reason| {
            warn!(path = %self.path().display(), %reason, "undecodable snapshot");
            StoreError::corrupt(self.path(), reason)
        })
    }
}

impl PlayerStore for SnapshotStore {
    fn add(&self, player: &Player) -> StoreResult<bool> {
        player.check_insertable()?;
        let guard = self.file.lock()?;
        let mut players = self.load(&self.file.read(&guard)?)?;
        if players.iter().any(|p| p.id == player.id) {
            return Ok(false);
        }
        players.push(player.clone());
        self.file.rewrite(&guard, &encode_snapshot(&players)?)?;
        debug!(id = player.id, count = players.len(), "snapshot written");
        Ok(true)
    }

    fn remove(&self, id: i32) -> StoreResult<bool> {
        let guard = self.file.lock()?;
        if id <= 0 {
            return Ok(false);
        }
        let mut players = self.load(&self.file.read(&guard)?)?;
        let before = players.len();
        players.retain(|p| p.id != id);
        if players.len() == before {
            return Ok(false);
        }
        self.file.rewrite(&guard, &encode_snapshot(&players)?)?;
        debug!(id, count = players.len(), "snapshot written");
        Ok(true)
    }

    fn update(&self, id: i32, player: &Player) -> StoreResult<()> {
        player.check_replaces(id)?;
        let guard = self.file.lock()?;
        let mut players = self.load(&self.file.read(&guard)?)?;
        let Some(entry) = players.iter_mut().find(|p| p.is_live() && p.id == id) else {
            return Ok(());
        };
        *entry = player.clone();
        self.file.rewrite(&guard, &encode_snapshot(&players)?)?;
        debug!(id, count = players.len(), "snapshot written");
        Ok(())
    }

    fn get(&self, id: i32) -> StoreResult<Option<Player>> {
        let guard = self.file.lock()?;
        let players = self.load(&self.file.read(&guard)?)?;
        Ok(players.into_iter().find(|p| p.is_live() && p.id == id))
    }

    fn list(&self) -> StoreResult<Vec<Player>> {
        let guard = self.file.lock()?;
        let players = self.load(&self.file.read(&guard)?)?;
        Ok(players.into_iter().filter(Player::is_live).collect())
    }

    fn close(&self) -> StoreResult<()> {
        self.file.close();
        Ok(())
    }
}

/// Encode a collection as a framed snapshot blob.
pub fn encode_snapshot(players: &[Player]) -> StoreResult<Vec<u8>> {
    let payload =
        bincode::serialize(players).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(SNAPSHOT_MAGIC);
    out.extend_from_slice(&SNAPSHOT_VERSION.to_be_bytes());
    out.extend_from_slice(&crc32fast::hash(&payload).to_be_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode a snapshot blob. Empty input is an empty collection.
pub fn decode_snapshot(data: &[u8]) -> Result<Vec<Player>, String> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data.len() < HEADER_SIZE {
        return Err(format!("snapshot too short: {} bytes", data.len()));
    }
    let (header, payload) = data.split_at(HEADER_SIZE);
    if &header[0..4] != SNAPSHOT_MAGIC {
        return Err(format!(
            "invalid magic: expected {:?}, got {:?}",
            String::from_utf8_lossy(SNAPSHOT_MAGIC),
            String::from_utf8_lossy(&header[0..4])
        ));
    }
    let version = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    if version != SNAPSHOT_VERSION {
        return Err(format!("unsupported snapshot version: {version}"));
    }
    let expected_crc = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);
    let actual_crc = crc32fast::hash(payload);
    if actual_crc != expected_crc {
        return Err(format!(
            "CRC mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"
        ));
    }
    bincode::deserialize(payload).map_err(|e| format!("payload: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, SnapshotStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(&dir.path().join("players.snap")).unwrap();
        (dir, store)
    }

    #[test]
    fn empty_input_is_empty_collection() {
        assert!(decode_snapshot(&[]).unwrap().is_empty());
    }

    #[test]
    fn empty_collection_still_has_a_header() {
        let bytes = encode_snapshot(&[]).unwrap();
        assert_eq!(&bytes[0..4], SNAPSHOT_MAGIC);
        assert!(decode_snapshot(&bytes).unwrap().is_empty());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = encode_snapshot(&[Player::new(1, "Ann", 0, 0, 0)]).unwrap();
        bytes[0..4].copy_from_slice(b"NOPE");
        assert!(decode_snapshot(&bytes).unwrap_err().contains("magic"));
    }

    #[test]
    fn bad_version_is_rejected() {
        let mut bytes = encode_snapshot(&[]).unwrap();
        bytes[4..8].copy_from_slice(&99u32.to_be_bytes());
        assert!(decode_snapshot(&bytes).unwrap_err().contains("version: 99"));
    }

    #[test]
    fn flipped_payload_byte_fails_crc() {
        let mut bytes = encode_snapshot(&[Player::new(1, "Ann", 0, 0, 0)]).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(decode_snapshot(&bytes).unwrap_err().contains("CRC"));
    }

    #[test]
    fn store_rewrites_whole_collection() {
        let (_dir, store) = open_temp();
        assert!(store.list().unwrap().is_empty());
        assert!(store.add(&Player::new(1, "Ann", 10, 1, 0)).unwrap());
        assert!(store.add(&Player::new(2, "Bob", 20, 2, 5)).unwrap());
        assert!(!store.add(&Player::new(1, "Dup", 0, 0, 0)).unwrap());

        assert!(store.remove(1).unwrap());
        store.update(2, &Player::new(2, "Bobby", 0, 0, 0)).unwrap();

        let on_disk = decode_snapshot(&std::fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk, vec![Player::new(2, "Bobby", 0, 0, 0)]);
    }

    #[test]
    fn truncated_file_fails_whole_read() {
        let (_dir, store) = open_temp();
        store.add(&Player::new(1, "Ann", 10, 1, 0)).unwrap();
        let bytes = std::fs::read(store.path()).unwrap();
        std::fs::write(store.path(), &bytes[..bytes.len() - 2]).unwrap();
        assert!(matches!(store.list(), Err(StoreError::Corrupt { .. })));
        assert!(matches!(store.get(1), Err(StoreError::Corrupt { .. })));
    }
}
