use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// A player profile: the fixed-shape record every backend persists.
///
/// Records are plain values. A store owns the durable copy; callers own the
/// copies returned by `get` and `list`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Unique identity within one store. Live records have `id > 0`.
    pub id: i32,
    /// Display name. Not unique, may be empty.
    pub nick: String,
    pub experience: i32,
    pub life_level: i32,
    pub coins: i32,
}

impl Player {
    /// Create a new player record.
    pub fn new(
        id: i32,
        nick: impl Into<String>,
        experience: i32,
        life_level: i32,
        coins: i32,
    ) -> Self {
        Self {
            id,
            nick: nick.into(),
            experience,
            life_level,
            coins,
        }
    }

    /// Returns `true` if this record can be live in a store (`id > 0`).
    pub fn is_live(&self) -> bool {
        self.id > 0
    }

    /// Reject records that `add` must never persist.
    pub(crate) fn check_insertable(&self) -> StoreResult<()> {
        if !self.is_live() {
            return Err(StoreError::InvalidRecord(format!(
                "player id must be positive, got {}",
                self.id
            )));
        }
        Ok(())
    }

    /// Reject an `update` whose replacement record names another identity.
    pub(crate) fn check_replaces(&self, id: i32) -> StoreResult<()> {
        if self.id != id {
            return Err(StoreError::IdMismatch {
                expected: id,
                actual: self.id,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[id = {}, nick = {}, experience = {}, lifeLevel = {}, coins = {}]",
            self.id, self.nick, self.experience, self.life_level, self.coins
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_line_template() {
        let p = Player::new(1, "Ann", 10, 1, 0);
        assert_eq!(
            p.to_string(),
            "[id = 1, nick = Ann, experience = 10, lifeLevel = 1, coins = 0]"
        );
    }

    #[test]
    fn liveness_follows_id_sign() {
        assert!(Player::new(1, "a", 0, 0, 0).is_live());
        assert!(!Player::new(0, "a", 0, 0, 0).is_live());
        assert!(!Player::new(-1, "a", 0, 0, 0).is_live());
    }

    #[test]
    fn insertable_rejects_non_positive_ids() {
        let err = Player::new(0, "zero", 0, 0, 0).check_insertable().unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord(_)));
        assert!(Player::new(7, "ok", 0, 0, 0).check_insertable().is_ok());
    }

    #[test]
    fn replaces_requires_matching_id() {
        let p = Player::new(2, "Bob", 0, 0, 0);
        assert!(p.check_replaces(2).is_ok());
        let err = p.check_replaces(3).unwrap_err();
        assert!(matches!(
            err,
            StoreError::IdMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn json_field_names_are_camel_case() {
        let p = Player::new(5, "Eve", 1, 2, 3);
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"lifeLevel\":2"));
        let back: Player = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
