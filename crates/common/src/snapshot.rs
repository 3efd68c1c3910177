use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::types::{AbilityId, AccountId, Health, Transform};

/// Number of hotbar slots a character carries.
pub const HOTBAR_SLOTS: usize = 8;

/// Ground locomotion mode, flipped by the movement-mode toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MovementMode {
    Walk,
    #[default]
    Jog,
}

impl MovementMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Walk => Self::Jog,
            Self::Jog => Self::Walk,
        }
    }
}

/// Ability loadout. Edited by the ability-creator flow over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotbar {
    pub slots: [Option<AbilityId>; HOTBAR_SLOTS],
    pub selected: u8,
}

impl Default for Hotbar {
    fn default() -> Self {
        let mut slots = [None; HOTBAR_SLOTS];
        slots[0] = Some(AbilityId(1));
        Self { slots, selected: 0 }
    }
}

impl Hotbar {
    /// Ability in the selected slot, if any.
    pub fn active(&self) -> Option<AbilityId> {
        self.slots.get(self.selected as usize).copied().flatten()
    }

    /// Returns false when the slot is out of range.
    pub fn assign(&mut self, slot: u8, ability: Option<AbilityId>) -> bool {
        match self.slots.get_mut(slot as usize) {
            Some(s) => {
                *s = ability;
                true
            }
            None => false,
        }
    }

    pub fn select(&mut self, slot: u8) -> bool {
        if (slot as usize) < HOTBAR_SLOTS {
            self.selected = slot;
            true
        } else {
            false
        }
    }
}

/// Everything persisted for a character between sessions.
///
/// The character half (transform, velocity, health, movement mode) and the
/// ability half (hotbar) are saved through separate repository calls so that
/// each can be flushed on its own dirty bit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub account_id: AccountId,
    pub transform: Transform,
    pub velocity: Vec3,
    pub health: Health,
    pub movement_mode: MovementMode,
    pub hotbar: Hotbar,
}

impl PlayerSnapshot {
    /// Fresh character at the spawn point.
    pub fn fresh(account_id: AccountId, spawn: Transform, max_health: f32) -> Self {
        Self {
            account_id,
            transform: spawn,
            velocity: Vec3::ZERO,
            health: Health::new(max_health),
            movement_mode: MovementMode::default(),
            hotbar: Hotbar::default(),
        }
    }
}
