//! Variable-length binary stream backend.
//!
//! Records are written back to back with no padding:
//!
//! ```text
//! [4 bytes: id (i32 BE)]
//! [2 bytes: nick length in bytes (u16 BE)] [N bytes: nick (UTF-8)]
//! [4 bytes: experience (i32 BE)] [4 bytes: life_level (i32 BE)] [4 bytes: coins (i32 BE)]
//! ```
//!
//! `add` appends one record. Records have no fixed size, so `remove` and
//! `update` decode the whole file and rewrite it.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::fsio::BackingFile;
use crate::player::Player;
use crate::traits::PlayerStore;

/// Longest nick the stream encoding can length-prefix, in bytes.
pub const MAX_NICK_BYTES: usize = u16::MAX as usize;

/// Player store over an append/rewrite binary stream.
#[derive(Debug)]
pub struct StreamStore {
    file: BackingFile,
}

impl StreamStore {
    /// Open (or create) a stream file at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with(path, false)
    }

    /// Open (or create) a stream file, optionally syncing after every write.
    pub fn open_with(path: &Path, sync_writes: bool) -> StoreResult<Self> {
        Ok(Self {
            file: BackingFile::open(path, &[], sync_writes)?,
        })
    }

    /// Path of the stream file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    fn decode(&self, bytes: &[u8]) -> StoreResult<Vec<Player>> {
        decode_records(bytes).map_err(|(offset, reason)| {
            warn!(path = %self.path().display(), offset, %reason, "undecodable stream record");
            StoreError::corrupt(self.path(), format!("record at offset {offset}: {reason}"))
        })
    }
}

impl PlayerStore for StreamStore {
    fn add(&self, player: &Player) -> StoreResult<bool> {
        player.check_insertable()?;
        let mut encoded = Vec::new();
        encode_record(&mut encoded, player)?;

        let guard = self.file.lock()?;
        let players = self.decode(&self.file.read(&guard)?)?;
        if players.iter().any(|p| p.id == player.id) {
            return Ok(false);
        }
        self.file.append(&guard, &encoded)?;
        debug!(id = player.id, len = encoded.len(), "stream record appended");
        Ok(true)
    }

    fn remove(&self, id: i32) -> StoreResult<bool> {
        let guard = self.file.lock()?;
        if id <= 0 {
            return Ok(false);
        }
        let mut players = self.decode(&self.file.read(&guard)?)?;
        let before = players.len();
        players.retain(|p| p.id != id);
        if players.len() == before {
            return Ok(false);
        }
        self.file.rewrite(&guard, &encode_records(&players)?)?;
        debug!(id, remaining = players.len(), "stream record removed");
        Ok(true)
    }

    fn update(&self, id: i32, player: &Player) -> StoreResult<()> {
        player.check_replaces(id)?;
        let guard = self.file.lock()?;
        let mut players = self.decode(&self.file.read(&guard)?)?;
        let Some(slot) = players.iter_mut().find(|p| p.is_live() && p.id == id) else {
            return Ok(());
        };
        *slot = player.clone();
        self.file.rewrite(&guard, &encode_records(&players)?)?;
        debug!(id, "stream record updated");
        Ok(())
    }

    fn get(&self, id: i32) -> StoreResult<Option<Player>> {
        let guard = self.file.lock()?;
        let players = self.decode(&self.file.read(&guard)?)?;
        Ok(players.into_iter().find(|p| p.is_live() && p.id == id))
    }

    fn list(&self) -> StoreResult<Vec<Player>> {
        let guard = self.file.lock()?;
        let players = self.decode(&self.file.read(&guard)?)?;
        Ok(players.into_iter().filter(Player::is_live).collect())
    }

    fn close(&self) -> StoreResult<()> {
        self.file.close();
        Ok(())
    }
}

/// Append the encoding of one record to `buf`.
pub fn encode_record(buf: &mut Vec<u8>, player: &Player) -> StoreResult<()> {
    let nick = player.nick.as_bytes();
    let nick_len = u16::try_from(nick.len()).map_err(|_| {
        StoreError::InvalidRecord(format!(
            "nick is {} bytes, stream encoding allows at most {MAX_NICK_BYTES}",
            nick.len()
        ))
    })?;
    buf.extend_from_slice(&player.id.to_be_bytes());
    buf.extend_from_slice(&nick_len.to_be_bytes());
    buf.extend_from_slice(nick);
    buf.extend_from_slice(&player.experience.to_be_bytes());
    buf.extend_from_slice(&player.life_level.to_be_bytes());
    buf.extend_from_slice(&player.coins.to_be_bytes());
    Ok(())
}

fn encode_records(players: &[Player]) -> StoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    for player in players {
        encode_record(&mut buf, player)?;
    }
    Ok(buf)
}

/// Decode every record in `data`. On failure returns the offset of the
/// offending record and a reason.
pub fn decode_records(data: &[u8]) -> Result<Vec<Player>, (usize, String)> {
    let mut players = Vec::new();
    let mut cursor = Cursor { data, pos: 0 };
    while cursor.pos < data.len() {
        let start = cursor.pos;
        let player = cursor.record().map_err(|reason| (start, reason))?;
        players.push(player);
    }
    Ok(players)
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        let end = self.pos + n;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or_else(|| format!("truncated: needed {n} bytes at offset {}", self.pos))?;
        self.pos = end;
        Ok(bytes)
    }

    fn i32(&mut self) -> Result<i32, String> {
        let bytes = self.take(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn record(&mut self) -> Result<Player, String> {
        let id = self.i32()?;
        let len_bytes = self.take(2)?;
        let nick_len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        let nick = std::str::from_utf8(self.take(nick_len)?)
            .map_err(|e| format!("nick is not UTF-8: {e}"))?
            .to_string();
        Ok(Player {
            id,
            nick,
            experience: self.i32()?,
            life_level: self.i32()?,
            coins: self.i32()?,
        })
    }
}
