//! Human-readable text backend: one line per record.
//!
//! ```text
//! [id = 1, nick = Ann, experience = 10, lifeLevel = 1, coins = 0]
//! ```
//!
//! Parsing is anchored on the leading `[id = ` / `, nick = ` and on the three
//! trailing labelled integers, so a nick may itself contain `", "` or `" = "`.
//! Backslash, newline, and carriage return in a nick are backslash-escaped.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::fsio::BackingFile;
use crate::player::Player;
use crate::traits::PlayerStore;

/// Player store over a line-oriented text file.
#[derive(Debug)]
pub struct TextStore {
    file: BackingFile,
}

impl TextStore {
    /// Open (or create) a text file at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with(path, false)
    }

    /// Open (or create) a text file, optionally syncing after every write.
    pub fn open_with(path: &Path, sync_writes: bool) -> StoreResult<Self> {
        Ok(Self {
            file: BackingFile::open(path, &[], sync_writes)?,
        })
    }

    /// Path of the text file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    fn decode(&self, bytes: &[u8]) -> StoreResult<Vec<Player>> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| StoreError::corrupt(self.path(), format!("not UTF-8: {e}")))?;
        let mut players = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let player = parse_line(line).map_err(|reason| {
                warn!(
                    path = %self.path().display(),
                    line = index + 1,
                    %reason,
                    "unparsable text record"
                );
                StoreError::corrupt(self.path(), format!("line {}: {reason}", index + 1))
            })?;
            players.push(player);
        }
        Ok(players)
    }
}

impl PlayerStore for TextStore {
    fn add(&self, player: &Player) -> StoreResult<bool> {
        player.check_insertable()?;
        let guard = self.file.lock()?;
        let bytes = self.file.read(&guard)?;
        if self.decode(&bytes)?.iter().any(|p| p.id == player.id) {
            return Ok(false);
        }

        let mut line = String::new();
        if bytes.last().is_some_and(|&b| b != b'\n') {
            line.push('\n');
        }
        line.push_str(&format_line(player));
        line.push('\n');
        self.file.append(&guard, line.as_bytes())?;
        debug!(id = player.id, "text record appended");
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
        self.file.rewrite(&guard, format_lines(&players).as_bytes())?;
        debug!(id, remaining = players.len(), "text record removed");
        Ok(true)
    }

    fn update(&self, id: i32, player: &Player) -> StoreResult<()> {
        player.check_replaces(id)?;
        let guard = self.file.lock()?;
        let mut players = self.decode(&self.file.read(&guard)?)?;
        let Some(line) = players.iter_mut().find(|p| p.is_live() && p.id == id) else {
            return Ok(());
        };
        *line = player.clone();
        self.file.rewrite(&guard, format_lines(&players).as_bytes())?;
        debug!(id, "text record updated");
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

/// Render one record as a text line (without the trailing newline).
pub fn format_line(player: &Player) -> String {
    format!(
        "[id = {}, nick = {}, experience = {}, lifeLevel = {}, coins = {}]",
        player.id,
        escape_nick(&player.nick),
        player.experience,
        player.life_level,
        player.coins
    )
}

fn format_lines(players: &[Player]) -> String {
    let mut out = String::new();
    for player in players {
        out.push_str(&format_line(player));
        out.push('\n');
    }
    out
}

/// Parse one text line back into a record.
pub fn parse_line(line: &str) -> Result<Player, String> {
    let body = line
        .strip_prefix("[id = ")
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| "expected `[id = ... ]`".to_string())?;
    let (id, rest) = body.split_once(", nick = ").ok_or_else(|| missing("nick"))?;
    let (rest, coins) = rest.rsplit_once(", coins = ").ok_or_else(|| missing("coins"))?;
    let (rest, life_level) = rest
        .rsplit_once(", lifeLevel = ")
        .ok_or_else(|| missing("lifeLevel"))?;
    let (nick, experience) = rest
        .rsplit_once(", experience = ")
        .ok_or_else(|| missing("experience"))?;

    Ok(Player {
        id: parse_int("id", id)?,
        nick: unescape_nick(nick)?,
        experience: parse_int("experience", experience)?,
        life_level: parse_int("lifeLevel", life_level)?,
        coins: parse_int("coins", coins)?,
    })
}

fn missing(label: &str) -> String {
    format!("missing `{label}` field")
}

fn parse_int(label: &str, value: &str) -> Result<i32, String> {
    value
        .parse()
        .map_err(|e| format!("`{label}` value {value:?}: {e}"))
}

fn escape_nick(nick: &str) -> String {
    let mut out = String::with_capacity(nick.len());
    for ch in nick.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_nick(escaped: &str) -> Result<String, String> {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => return Err(format!("unknown escape `\\{other}` in nick")),
            None => return Err("dangling `\\` in nick".to_string()),
        }
    }
    Ok(out)
}
