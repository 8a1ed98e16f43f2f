//! Fixed-width random-access backend.
//!
//! Every record occupies one 56-byte slot. Slots are packed with no gaps and
//! new records are always appended at end-of-file:
//!
//! ```text
//! [ 4 bytes: id          (i32, big-endian)                        ]
//! [40 bytes: nick        (20 UTF-16 code units, big-endian, NUL-filled)]
//! [ 4 bytes: experience  (i32, big-endian)                        ]
//! [ 4 bytes: life_level  (i32, big-endian)                        ]
//! [ 4 bytes: coins       (i32, big-endian)                        ]
//! ```
//!
//! Deleting a record overwrites only its id with [`TOMBSTONE`]; the slot stays
//! on disk and is never reused. The file therefore only grows: heavy
//! add/remove churn needs an external compaction, which this store does not
//! perform. Lookups are a linear scan over slot ids.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::fsio::ensure_parent;
use crate::player::Player;
use crate::traits::PlayerStore;

/// Size of one record slot in bytes.
pub const SLOT_SIZE: usize = 56;

/// Capacity of the nick field in UTF-16 code units.
pub const NICK_UNITS: usize = 20;

/// Id written over a slot to mark it deleted.
pub const TOMBSTONE: i32 = -1;

const INT_SIZE: usize = 4;
const NICK_OFFSET: usize = INT_SIZE;
const NICK_BYTES: usize = NICK_UNITS * 2;
const EXPERIENCE_OFFSET: usize = NICK_OFFSET + NICK_BYTES;
const LIFE_LEVEL_OFFSET: usize = EXPERIENCE_OFFSET + INT_SIZE;
const COINS_OFFSET: usize = LIFE_LEVEL_OFFSET + INT_SIZE;

/// Player store over a fixed-width, byte-addressable slot file.
pub struct RandomAccessStore {
    path: PathBuf,
    sync_writes: bool,
    /// `None` once the store is closed.
    file: Mutex<Option<File>>,
}

impl RandomAccessStore {
    /// Open (or create) a slot file at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with(path, false)
    }

    /// Open (or create) a slot file, optionally syncing after every write.
    pub fn open_with(path: &Path, sync_writes: bool) -> StoreResult<Self> {
        ensure_parent(path)?;
        let existed = path.exists();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        if !existed {
            info!(path = %path.display(), "created slot file");
        }
        Ok(Self {
            path: path.to_path_buf(),
            sync_writes,
            file: Mutex::new(Some(file)),
        })
    }

    /// Path of the slot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file length in bytes, tombstoned slots included.
    pub fn file_len(&self) -> StoreResult<u64> {
        let mut guard = self.lock()?;
        let file = open_file(&mut guard)?;
        Ok(file.metadata()?.len())
    }

    /// Number of physical slots, tombstoned slots included.
    pub fn slot_count(&self) -> StoreResult<u64> {
        let mut guard = self.lock()?;
        let file = open_file(&mut guard)?;
        Ok(self.checked_len(file)? / SLOT_SIZE as u64)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Option<File>>> {
        self.file.lock().map_err(|_| StoreError::Poisoned)
    }

    /// File length, rejecting a trailing partial slot.
    fn checked_len(&self, file: &File) -> StoreResult<u64> {
        let len = file.metadata()?.len();
        if len % SLOT_SIZE as u64 != 0 {
            warn!(path = %self.path.display(), len, "slot file has a partial trailing slot");
            return Err(StoreError::corrupt(
                &self.path,
                format!("length {len} is not a multiple of the {SLOT_SIZE}-byte slot size"),
            ));
        }
        Ok(len)
    }

    /// Scan slot ids from offset 0 and return the start offset of the slot
    /// holding `id`.
    ///
    /// Non-positive ids never match, so tombstoned slots stay invisible.
    fn find_slot(&self, file: &mut File, id: i32) -> StoreResult<Option<u64>> {
        if id <= 0 {
            return Ok(None);
        }
        let len = self.checked_len(file)?;
        let mut offset = 0u64;
        let mut id_buf = [0u8; INT_SIZE];
        file.seek(SeekFrom::Start(0))?;
        while offset < len {
            file.read_exact(&mut id_buf)?;
            if i32::from_be_bytes(id_buf) == id {
                return Ok(Some(offset));
            }
            file.seek(SeekFrom::Current((SLOT_SIZE - INT_SIZE) as i64))?;
            offset += SLOT_SIZE as u64;
        }
        Ok(None)
    }

    fn write_at(&self, file: &mut File, offset: u64, bytes: &[u8]) -> StoreResult<()> {
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytes)?;
        if self.sync_writes {
            file.sync_data()?;
        }
        Ok(())
    }
}

impl PlayerStore for RandomAccessStore {
    fn add(&self, player: &Player) -> StoreResult<bool> {
        player.check_insertable()?;
        let mut guard = self.lock()?;
        let file = open_file(&mut guard)?;
        if self.find_slot(file, player.id)?.is_some() {
            return Ok(false);
        }
        let offset = file.seek(SeekFrom::End(0))?;
        self.write_at(file, offset, &encode_slot(player))?;
        debug!(id = player.id, offset, "slot appended");
        Ok(true)
    }

    fn remove(&self, id: i32) -> StoreResult<bool> {
        let mut guard = self.lock()?;
        let file = open_file(&mut guard)?;
        let Some(offset) = self.find_slot(file, id)? else {
            return Ok(false);
        };
        self.write_at(file, offset, &TOMBSTONE.to_be_bytes())?;
        debug!(id, offset, "slot tombstoned");
        Ok(true)
    }

    fn update(&self, id: i32, player: &Player) -> StoreResult<()> {
        player.check_replaces(id)?;
        let mut guard = self.lock()?;
        let file = open_file(&mut guard)?;
        if let Some(offset) = self.find_slot(file, id)? {
            self.write_at(file, offset, &encode_slot(player))?;
            debug!(id, offset, "slot rewritten");
        }
        Ok(())
    }

    fn get(&self, id: i32) -> StoreResult<Option<Player>> {
        let mut guard = self.lock()?;
        let file = open_file(&mut guard)?;
        let Some(offset) = self.find_slot(file, id)? else {
            return Ok(None);
        };
        let mut slot = [0u8; SLOT_SIZE];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut slot)?;
        Ok(Some(decode_slot(&slot)))
    }

    fn list(&self) -> StoreResult<Vec<Player>> {
        let mut guard = self.lock()?;
        let file = open_file(&mut guard)?;
        let slots = self.checked_len(file)? / SLOT_SIZE as u64;
        file.seek(SeekFrom::Start(0))?;

        let mut reader = BufReader::new(&mut *file);
        let mut players = Vec::new();
        let mut slot = [0u8; SLOT_SIZE];
        for _ in 0..slots {
            reader.read_exact(&mut slot)?;
            let player = decode_slot(&slot);
            if player.is_live() {
                players.push(player);
            }
        }
        Ok(players)
    }

    fn close(&self) -> StoreResult<()> {
        let mut guard = match self.file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.take().is_some() {
            debug!(path = %self.path.display(), "slot file closed");
        }
        Ok(())
    }

    fn len(&self) -> StoreResult<usize> {
        let mut guard = self.lock()?;
        let file = open_file(&mut guard)?;
        let slots = self.checked_len(file)? / SLOT_SIZE as u64;
        file.seek(SeekFrom::Start(0))?;

        let mut reader = BufReader::new(&mut *file);
        let mut live = 0;
        let mut id_buf = [0u8; INT_SIZE];
        for _ in 0..slots {
            reader.read_exact(&mut id_buf)?;
            if i32::from_be_bytes(id_buf) > 0 {
                live += 1;
            }
            reader.seek_relative((SLOT_SIZE - INT_SIZE) as i64)?;
        }
        Ok(live)
    }
}

impl std::fmt::Debug for RandomAccessStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomAccessStore")
            .field("path", &self.path)
            .field("sync_writes", &self.sync_writes)
            .finish()
    }
}

fn open_file<'a>(guard: &'a mut MutexGuard<'_, Option<File>>) -> StoreResult<&'a mut File> {
    guard.as_mut().ok_or(StoreError::Closed)
}

/// Encode a player into one slot.
///
/// A nick longer than [`NICK_UNITS`] UTF-16 code units is truncated at the
/// last whole character that fits; unused nick bytes are zero.
pub fn encode_slot(player: &Player) -> [u8; SLOT_SIZE] {
    let mut slot = [0u8; SLOT_SIZE];
    slot[..INT_SIZE].copy_from_slice(&player.id.to_be_bytes());
    encode_nick(&player.nick, &mut slot[NICK_OFFSET..EXPERIENCE_OFFSET]);
    slot[EXPERIENCE_OFFSET..LIFE_LEVEL_OFFSET].copy_from_slice(&player.experience.to_be_bytes());
    slot[LIFE_LEVEL_OFFSET..COINS_OFFSET].copy_from_slice(&player.life_level.to_be_bytes());
    slot[COINS_OFFSET..].copy_from_slice(&player.coins.to_be_bytes());
    slot
}

/// Decode one slot. Tombstoned slots decode with `id == TOMBSTONE`.
pub fn decode_slot(slot: &[u8; SLOT_SIZE]) -> Player {
    Player {
        id: read_i32(slot, 0),
        nick: decode_nick(&slot[NICK_OFFSET..EXPERIENCE_OFFSET]),
        experience: read_i32(slot, EXPERIENCE_OFFSET),
        life_level: read_i32(slot, LIFE_LEVEL_OFFSET),
        coins: read_i32(slot, COINS_OFFSET),
    }
}

fn read_i32(slot: &[u8; SLOT_SIZE], at: usize) -> i32 {
    let mut bytes = [0u8; INT_SIZE];
    bytes.copy_from_slice(&slot[at..at + INT_SIZE]);
    i32::from_be_bytes(bytes)
}

fn encode_nick(nick: &str, out: &mut [u8]) {
    let mut units = 0;
    let mut buf = [0u16; 2];
    for ch in nick.chars() {
        let encoded = ch.encode_utf16(&mut buf);
        if units + encoded.len() > NICK_UNITS {
            break;
        }
        for unit in encoded.iter() {
            out[units * 2..units * 2 + 2].copy_from_slice(&unit.to_be_bytes());
            units += 1;
        }
    }
}

fn decode_nick(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
        .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}
