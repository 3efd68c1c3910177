//! Dirty-set bookkeeping and flushing to a [`CharacterRepository`].

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::repository::CharacterRepository;
use realm_common::{AccountId, PlayerSnapshot};

/// Outcome of one flush cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Accounts considered this cycle.
    pub attempted: usize,
    pub characters_saved: usize,
    pub abilities_saved: usize,
    /// Accounts with at least one failed save; they stay dirty.
    pub failed: Vec<AccountId>,
    /// Dirty accounts with neither a live nor a pending snapshot.
    pub orphaned: Vec<AccountId>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.orphaned.is_empty()
    }
}

/// Tracks which accounts need saving and holds snapshots of dirty accounts
/// that disconnected before their data reached the store.
#[derive(Debug, Default)]
pub struct PersistenceSyncTracker {
    character_dirty: BTreeSet<AccountId>,
    abilities_dirty: BTreeSet<AccountId>,
    pending: BTreeMap<AccountId, PlayerSnapshot>,
}

impl PersistenceSyncTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_character_dirty(&mut self, account: AccountId) {
        self.character_dirty.insert(account);
    }

    pub fn mark_abilities_dirty(&mut self, account: AccountId) {
        self.abilities_dirty.insert(account);
    }

    pub fn is_character_dirty(&self, account: AccountId) -> bool {
        self.character_dirty.contains(&account)
    }

    pub fn is_abilities_dirty(&self, account: AccountId) -> bool {
        self.abilities_dirty.contains(&account)
    }

    pub fn is_dirty(&self, account: AccountId) -> bool {
        self.is_character_dirty(account) || self.is_abilities_dirty(account)
    }

    pub fn dirty_count(&self) -> usize {
        self.character_dirty.union(&self.abilities_dirty).count()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Hold the final snapshot of a departing account if it has unsaved data.
    /// Returns whether the snapshot was queued.
    pub fn queue_disconnected(&mut self, snapshot: PlayerSnapshot) -> bool {
        if !self.is_dirty(snapshot.account_id) {
            return false;
        }
        self.pending.insert(snapshot.account_id, snapshot);
        true
    }

    /// Remove and return the queued snapshot for a reconnecting account.
    /// The dirty bits are kept; the live entity becomes the flush source.
    pub fn take_pending(&mut self, account: AccountId) -> Option<PlayerSnapshot> {
        self.pending.remove(&account)
    }

    pub fn peek_pending(&self, account: AccountId) -> Option<&PlayerSnapshot> {
        self.pending.get(&account)
    }

    /// Persist every dirty account. The live snapshot wins over a pending one.
    ///
    /// Failures are logged and leave the account's bits set for the next
    /// cycle. Nothing here panics or returns an error.
    pub fn flush<R, F>(&mut self, repo: &mut R, live: F) -> FlushReport
    where
        R: CharacterRepository + ?Sized,
        F: Fn(AccountId) -> Option<PlayerSnapshot>,
    {
        let accounts: Vec<AccountId> = self
            .character_dirty
            .union(&self.abilities_dirty)
            .copied()
            .collect();
        let mut report = FlushReport {
            attempted: accounts.len(),
            ..FlushReport::default()
        };

        for account in accounts {
            let Some(snapshot) = live(account).or_else(|| self.pending.get(&account).copied())
            else {
                tracing::warn!(account = account.0, "dirty account has no snapshot to flush; dropping");
                self.character_dirty.remove(&account);
                self.abilities_dirty.remove(&account);
                report.orphaned.push(account);
                continue;
            };

            let mut failed = false;
            if self.character_dirty.contains(&account) {
                match repo.save_character(&snapshot) {
                    Ok(()) => {
                        self.character_dirty.remove(&account);
                        report.characters_saved += 1;
                    }
                    Err(e) => {
                        tracing::warn!(account = account.0, error = %e, "character save failed; will retry");
                        failed = true;
                    }
                }
            }
            if self.abilities_dirty.contains(&account) {
                match repo.save_ability_state(&snapshot) {
                    Ok(()) => {
                        self.abilities_dirty.remove(&account);
                        report.abilities_saved += 1;
                    }
                    Err(e) => {
                        tracing::warn!(account = account.0, error = %e, "ability save failed; will retry");
                        failed = true;
                    }
                }
            }

            if failed {
                report.failed.push(account);
            } else {
                self.pending.remove(&account);
            }
        }

        if report.attempted > 0 {
            tracing::debug!(
                attempted = report.attempted,
                characters = report.characters_saved,
                abilities = report.abilities_saved,
                failed = report.failed.len(),
                "persistence flush"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCharacterStore;
    use glam::Vec3;
    use realm_common::{AbilityId, Transform};

    fn snap(account: u64, x: f32) -> PlayerSnapshot {
        PlayerSnapshot::fresh(
            AccountId(account),
            Transform::at(Vec3::new(x, 1.0, 0.0)),
            100.0,
        )
    }

    fn no_live(_: AccountId) -> Option<PlayerSnapshot> {
        None
    }

    #[test]
    fn marking_is_idempotent() {
        let mut t = PersistenceSyncTracker::new();
        t.mark_character_dirty(AccountId(1));
        t.mark_character_dirty(AccountId(1));
        t.mark_abilities_dirty(AccountId(1));
        assert_eq!(t.dirty_count(), 1);
    }

    #[test]
    fn flush_persists_only_dirty_accounts() {
        let mut t = PersistenceSyncTracker::new();
        let mut repo = MemoryCharacterStore::new();
        t.mark_character_dirty(AccountId(1));
        let report = t.flush(&mut repo, |a| Some(snap(a.0, 5.0)));
        assert_eq!(report.attempted, 1);
        assert_eq!(report.characters_saved, 1);
        assert_eq!(report.abilities_saved, 0);
        assert!(repo.stored(AccountId(2)).is_none());
        assert!(!t.is_dirty(AccountId(1)));

        let again = t.flush(&mut repo, |a| Some(snap(a.0, 5.0)));
        assert_eq!(again.attempted, 0);
        assert_eq!(repo.character_saves(), 1);
    }

    #[test]
    fn failed_flush_keeps_account_dirty_until_next_cycle() {
        let mut t = PersistenceSyncTracker::new();
        let mut repo = MemoryCharacterStore::new();
        t.mark_character_dirty(AccountId(42));
        t.mark_character_dirty(AccountId(7));
        repo.fail_saves_for(AccountId(42), 1);

        let first = t.flush(&mut repo, |a| Some(snap(a.0, 3.0)));
        assert_eq!(first.failed, vec![AccountId(42)]);
        assert!(t.is_character_dirty(AccountId(42)));
        assert!(!t.is_character_dirty(AccountId(7)));
        assert!(repo.stored(AccountId(42)).is_none());

        // No re-marking between cycles.
        let second = t.flush(&mut repo, |a| Some(snap(a.0, 3.0)));
        assert!(second.is_clean());
        assert!(!t.is_dirty(AccountId(42)));
        assert_eq!(repo.stored(AccountId(42)).unwrap().transform.position.x, 3.0);
    }

    #[test]
    fn clean_disconnect_is_not_queued() {
        let mut t = PersistenceSyncTracker::new();
        assert!(!t.queue_disconnected(snap(1, 0.0)));
        assert_eq!(t.pending_count(), 0);
    }

    #[test]
    fn fast_reconnect_reads_pending_exactly_once() {
        let mut t = PersistenceSyncTracker::new();
        t.mark_character_dirty(AccountId(9));
        assert!(t.queue_disconnected(snap(9, 12.0)));

        let first = t.take_pending(AccountId(9)).unwrap();
        assert_eq!(first.transform.position.x, 12.0);
        assert!(t.take_pending(AccountId(9)).is_none());
        assert!(t.is_character_dirty(AccountId(9)));
    }

    #[test]
    fn pending_snapshot_is_flushed_then_dropped() {
        let mut t = PersistenceSyncTracker::new();
        let mut repo = MemoryCharacterStore::new();
        let mut s = snap(5, 8.0);
        s.hotbar.assign(1, Some(AbilityId(2)));
        t.mark_character_dirty(AccountId(5));
        t.mark_abilities_dirty(AccountId(5));
        t.queue_disconnected(s);

        let report = t.flush(&mut repo, no_live);
        assert!(report.is_clean());
        assert_eq!(t.pending_count(), 0);
        assert_eq!(repo.stored(AccountId(5)), Some(s));
    }

    #[test]
    fn pending_survives_failed_flush() {
        let mut t = PersistenceSyncTracker::new();
        let mut repo = MemoryCharacterStore::new();
        t.mark_abilities_dirty(AccountId(5));
        t.queue_disconnected(snap(5, 1.0));
        repo.set_unavailable(true);
        t.flush(&mut repo, no_live);
        assert!(t.peek_pending(AccountId(5)).is_some());
        repo.set_unavailable(false);
        t.flush(&mut repo, no_live);
        assert!(t.peek_pending(AccountId(5)).is_none());
    }

    #[test]
    fn live_snapshot_wins_over_pending() {
        let mut t = PersistenceSyncTracker::new();
        let mut repo = MemoryCharacterStore::new();
        t.mark_character_dirty(AccountId(3));
        t.queue_disconnected(snap(3, 1.0));
        t.flush(&mut repo, |a| Some(snap(a.0, 99.0)));
        assert_eq!(repo.stored(AccountId(3)).unwrap().transform.position.x, 99.0);
    }

    #[test]
    fn dirty_account_without_source_is_dropped() {
        let mut t = PersistenceSyncTracker::new();
        let mut repo = MemoryCharacterStore::new();
        t.mark_character_dirty(AccountId(11));
        let report = t.flush(&mut repo, no_live);
        assert_eq!(report.orphaned, vec![AccountId(11)]);
        assert_eq!(t.dirty_count(), 0);
    }
}
