//! Ability definitions and casting.
//!
//! An ability spawns one projectile per cast and then cools down for a fixed
//! number of ticks.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use realm_common::{AbilityId, EntityId, Transform};
use realm_ecs::{EntityStore, ProjectileState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityDef {
    pub id: AbilityId,
    pub name: String,
    pub cooldown_ticks: u32,
    pub speed: f32,
    pub gravity: f32,
    pub drag: f32,
    pub range: f32,
    pub ttl_ticks: u32,
    pub pierce: u32,
    pub damage: f32,
    pub radius: f32,
    pub despawn_on_hit: bool,
    pub despawn_on_world: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AbilityTable {
    defs: BTreeMap<AbilityId, AbilityDef>,
}

impl AbilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock abilities every fresh hotbar can reference.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.insert(AbilityDef {
            id: AbilityId(1),
            name: "firebolt".into(),
            cooldown_ticks: 15,
            speed: 30.0,
            gravity: 0.0,
            drag: 0.0,
            range: 40.0,
            ttl_ticks: 90,
            pierce: 0,
            damage: 20.0,
            radius: 0.2,
            despawn_on_hit: true,
            despawn_on_world: true,
        });
        table.insert(AbilityDef {
            id: AbilityId(2),
            name: "arrow".into(),
            cooldown_ticks: 20,
            speed: 45.0,
            gravity: 9.8,
            drag: 0.05,
            range: 80.0,
            ttl_ticks: 120,
            pierce: 0,
            damage: 15.0,
            radius: 0.08,
            despawn_on_hit: true,
            despawn_on_world: true,
        });
        table.insert(AbilityDef {
            id: AbilityId(3),
            name: "lance".into(),
            cooldown_ticks: 45,
            speed: 25.0,
            gravity: 0.0,
            drag: 0.0,
            range: 30.0,
            ttl_ticks: 60,
            pierce: 2,
            damage: 30.0,
            radius: 0.3,
            despawn_on_hit: true,
            despawn_on_world: false,
        });
        table
    }

    pub fn insert(&mut self, def: AbilityDef) -> Option<AbilityDef> {
        self.defs.insert(def.id, def)
    }

    pub fn get(&self, id: AbilityId) -> Option<&AbilityDef> {
        self.defs.get(&id)
    }

    pub fn contains(&self, id: AbilityId) -> bool {
        self.defs.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AbilityDef> {
        self.defs.values()
    }
}

/// Why a cast did not fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastBlocked {
    NoActiveAbility,
    UnknownAbility(AbilityId),
    Cooldown { ready_at: u64 },
}

/// Height of the casting point above the body centre.
const CAST_HEIGHT: f32 = 0.6;

/// Try to cast `caster`'s active hotbar ability at `tick`.
///
/// On success the projectile is registered, the caster's last-cast tick is
/// updated and the new projectile id is returned.
pub fn try_cast(
    store: &mut EntityStore,
    table: &AbilityTable,
    caster: EntityId,
    tick: u64,
) -> Option<Result<(AbilityId, EntityId), CastBlocked>> {
    let meta = store.player(caster)?;
    let Some(ability) = meta.hotbar.active() else {
        return Some(Err(CastBlocked::NoActiveAbility));
    };
    let Some(def) = table.get(ability) else {
        return Some(Err(CastBlocked::UnknownAbility(ability)));
    };
    if let Some(last) = meta.last_cast_tick {
        let ready_at = last + def.cooldown_ticks as u64;
        if tick < ready_at {
            return Some(Err(CastBlocked::Cooldown { ready_at }));
        }
    }

    let transform = *store.transform(caster)?;
    let body = store.shape(caster)?;
    let aim = transform.aim();
    let origin =
        transform.position + Vec3::Y * CAST_HEIGHT + aim * (body.radius + def.radius + 0.05);
    let state = ProjectileState {
        owner: store.network_id(caster)?,
        ability,
        gravity: def.gravity,
        drag: def.drag,
        remaining_range: def.range,
        ttl_ticks: def.ttl_ticks,
        pierce_remaining: def.pierce,
        damage: def.damage,
        despawn_on_hit: def.despawn_on_hit,
        despawn_on_world: def.despawn_on_world,
        hits: Vec::new(),
    };
    let projectile = store.register_projectile(
        state,
        Transform {
            position: origin,
            yaw: transform.yaw,
            pitch: transform.pitch,
        },
        aim * def.speed,
        def.radius,
    );
    if let Some(meta) = store.player_mut(caster) {
        meta.last_cast_tick = Some(tick);
    }
    Some(Ok((ability, projectile)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use realm_common::{AccountId, PlayerSnapshot, UserId};
    use realm_ecs::EntityKind;

    fn caster(store: &mut EntityStore) -> EntityId {
        let snap = PlayerSnapshot::fresh(AccountId(1), Transform::at(Vec3::new(0.0, 0.9, 0.0)), 100.0);
        store.register_player(UserId(1), &snap).unwrap()
    }

    #[test]
    fn cast_spawns_projectile_along_aim() {
        let mut store = EntityStore::new();
        let table = AbilityTable::builtin();
        let id = caster(&mut store);

        let (ability, proj) = try_cast(&mut store, &table, id, 10).unwrap().unwrap();
        assert_eq!(ability, AbilityId(1));
        assert_eq!(store.kind(proj), Some(EntityKind::Projectile));
        let v = store.velocity(proj).unwrap();
        assert!(v.normalize().abs_diff_eq(store.transform(id).unwrap().aim(), 1e-5));
        assert_eq!(store.player(id).unwrap().last_cast_tick, Some(10));
        assert_eq!(Some(store.projectile(proj).unwrap().owner), store.network_id(id));
    }

    #[test]
    fn cooldown_blocks_recast() {
        let mut store = EntityStore::new();
        let table = AbilityTable::builtin();
        let id = caster(&mut store);
        try_cast(&mut store, &table, id, 10).unwrap().unwrap();
        assert_eq!(
            try_cast(&mut store, &table, id, 20).unwrap(),
            Err(CastBlocked::Cooldown { ready_at: 25 })
        );
        assert!(try_cast(&mut store, &table, id, 25).unwrap().is_ok());
    }

    #[test]
    fn empty_slot_and_unknown_ability_are_reported() {
        let mut store = EntityStore::new();
        let table = AbilityTable::builtin();
        let id = caster(&mut store);
        store.player_mut(id).unwrap().hotbar.select(3);
        assert_eq!(
            try_cast(&mut store, &table, id, 1).unwrap(),
            Err(CastBlocked::NoActiveAbility)
        );
        store.player_mut(id).unwrap().hotbar.assign(3, Some(AbilityId(99)));
        assert_eq!(
            try_cast(&mut store, &table, id, 1).unwrap(),
            Err(CastBlocked::UnknownAbility(AbilityId(99)))
        );
    }

    #[test]
    fn non_players_cannot_cast() {
        let mut store = EntityStore::new();
        assert!(try_cast(&mut store, &AbilityTable::builtin(), EntityId(4), 0).is_none());
    }
}
