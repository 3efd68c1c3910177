//! In-memory repository used by tests and the headless runner.

use std::collections::BTreeMap;

use crate::repository::{CharacterRepository, PersistError};
use realm_common::{AccountId, Hotbar, PlayerSnapshot};

/// Repository holding snapshots in a map, with injectable save failures.
#[derive(Debug, Default)]
pub struct MemoryCharacterStore {
    characters: BTreeMap<AccountId, PlayerSnapshot>,
    abilities: BTreeMap<AccountId, Hotbar>,
    failing: BTreeMap<AccountId, u32>,
    unavailable: bool,
    character_saves: u64,
    ability_saves: u64,
}

impl MemoryCharacterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored snapshot directly.
    pub fn insert(&mut self, snapshot: PlayerSnapshot) {
        self.abilities.insert(snapshot.account_id, snapshot.hotbar);
        self.characters.insert(snapshot.account_id, snapshot);
    }

    /// Fail the next `times` save calls for `account`.
    pub fn fail_saves_for(&mut self, account: AccountId, times: u32) {
        self.failing.insert(account, times);
    }

    /// While set, every call fails with `Unavailable`.
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Stored state, combining the character and ability halves.
    pub fn stored(&self, account: AccountId) -> Option<PlayerSnapshot> {
        let mut snap = *self.characters.get(&account)?;
        snap.hotbar = self.abilities.get(&account).copied().unwrap_or_default();
        Some(snap)
    }

    pub fn character_saves(&self) -> u64 {
        self.character_saves
    }

    pub fn ability_saves(&self) -> u64 {
        self.ability_saves
    }

    fn check(&mut self, account: AccountId) -> Result<(), PersistError> {
        if self.unavailable {
            return Err(PersistError::Unavailable("store marked unavailable".into()));
        }
        if let Some(left) = self.failing.get_mut(&account) {
            if *left > 0 {
                *left -= 1;
                return Err(PersistError::Unavailable(format!(
                    "injected failure for account {}",
                    account.0
                )));
            }
        }
        Ok(())
    }
}

impl CharacterRepository for MemoryCharacterStore {
    fn load_snapshot(&mut self, account: AccountId) -> Result<Option<PlayerSnapshot>, PersistError> {
        if self.unavailable {
            return Err(PersistError::Unavailable("store marked unavailable".into()));
        }
        Ok(self.stored(account))
    }

    fn save_character(&mut self, snapshot: &PlayerSnapshot) -> Result<(), PersistError> {
        self.check(snapshot.account_id)?;
        // The hotbar in this copy is ignored; `stored` reads the ability map.
        self.characters.insert(snapshot.account_id, *snapshot);
        self.character_saves += 1;
        Ok(())
    }

    fn save_ability_state(&mut self, snapshot: &PlayerSnapshot) -> Result<(), PersistError> {
        self.check(snapshot.account_id)?;
        self.abilities.insert(snapshot.account_id, snapshot.hotbar);
        self.ability_saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realm_common::Transform;

    fn snap(account: u64) -> PlayerSnapshot {
        PlayerSnapshot::fresh(AccountId(account), Transform::default(), 100.0)
    }

    #[test]
    fn injected_failures_run_out() {
        let mut store = MemoryCharacterStore::new();
        store.fail_saves_for(AccountId(7), 1);
        assert!(store.save_character(&snap(7)).is_err());
        assert!(store.save_character(&snap(7)).is_ok());
        assert_eq!(store.character_saves(), 1);
    }

    #[test]
    fn unavailable_blocks_loads_and_saves() {
        let mut store = MemoryCharacterStore::new();
        store.insert(snap(1));
        store.set_unavailable(true);
        assert!(store.load_snapshot(AccountId(1)).is_err());
        assert!(store.save_ability_state(&snap(1)).is_err());
        store.set_unavailable(false);
        assert!(store.load_snapshot(AccountId(1)).unwrap().is_some());
    }

    #[test]
    fn halves_are_saved_independently() {
        let mut store = MemoryCharacterStore::new();
        let mut s = snap(3);
        s.hotbar.select(2);
        store.save_character(&s).unwrap();
        assert_eq!(store.stored(AccountId(3)).unwrap().hotbar, Hotbar::default());
        store.save_ability_state(&s).unwrap();
        assert_eq!(store.stored(AccountId(3)).unwrap().hotbar.selected, 2);
    }
}
