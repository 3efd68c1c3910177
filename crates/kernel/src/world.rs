use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::abilities::{AbilityTable, try_cast};
use crate::movement::{MovementIntegrator, MovementTuning};
use crate::physics::CharacterPhysics;
use crate::platform::{PlatformMotion, PlatformSet};
use crate::projectile::{DespawnReason, step_projectiles};
use realm_common::{
    AbilityId, AccountId, EntityId, Health, MovementMode, PlatformId, PlayerSnapshot,
    ServerConfig, Transform, UserId,
};
use realm_ecs::{BodyShape, EcsError, EntityKind, EntityStore};
use realm_input::{BatchStats, InputCommand, InputReconciler, ReconcileBase};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KernelError {
    #[error(transparent)]
    Ecs(#[from] EcsError),
    #[error("platform {0:?} already exists")]
    DuplicatePlatform(PlatformId),
    #[error("user {0:?} has no player entity")]
    UnknownUser(UserId),
    #[error("ability {0:?} is not defined")]
    UnknownAbility(AbilityId),
    #[error("hotbar slot {0} is out of range")]
    InvalidSlot(u8),
}

/// A record of something that happened during a world operation.
///
/// Drained by the caller once per tick and used to mark persistence state
/// stale and for logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    PlayerSpawned { entity: EntityId, account: AccountId },
    PlayerDespawned { entity: EntityId, account: AccountId },
    CharacterMoved { account: AccountId },
    Jumped { account: AccountId },
    MovementModeChanged { account: AccountId, mode: MovementMode },
    LoadoutChanged { account: AccountId },
    AbilityCast {
        account: AccountId,
        ability: AbilityId,
        projectile: EntityId,
    },
    ProjectileDespawned { entity: EntityId, reason: DespawnReason },
    Damaged {
        target: EntityId,
        account: Option<AccountId>,
        amount: f32,
    },
    Killed {
        target: EntityId,
        account: Option<AccountId>,
    },
    DummyReset { entity: EntityId },
    PlayerRespawned { account: AccountId },
    Stepped { tick: u64 },
}

impl WorldEvent {
    /// Account whose character record is now stale, if any.
    pub fn dirty_character(&self) -> Option<AccountId> {
        match self {
            Self::CharacterMoved { account }
            | Self::Jumped { account }
            | Self::MovementModeChanged { account, .. }
            | Self::PlayerRespawned { account } => Some(*account),
            Self::Damaged { account, .. } | Self::Killed { account, .. } => *account,
            _ => None,
        }
    }

    /// Account whose ability loadout record is now stale, if any.
    pub fn dirty_abilities(&self) -> Option<AccountId> {
        match self {
            Self::LoadoutChanged { account } => Some(*account),
            _ => None,
        }
    }
}

/// Fixed parameters of a world, taken from the server configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldSettings {
    pub dt: f32,
    pub spawn: Transform,
    pub player_max_health: f32,
    pub dummy_reset_ticks: u64,
    pub tuning: MovementTuning,
}

impl WorldSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            dt: config.dt(),
            spawn: config.spawn_transform(),
            player_max_health: config.player_max_health,
            dummy_reset_ticks: (3.0 * config.tick_rate_hz).round() as u64,
            tuning: MovementTuning::default(),
        }
    }
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

/// The authoritative world state.
///
/// All mutations go through explicit operations. Within a step, players,
/// projectiles and dummies are processed in ascending entity id, and
/// platforms in ascending platform id, so identical inputs produce identical
/// states.
pub struct World {
    settings: WorldSettings,
    store: EntityStore,
    platforms: PlatformSet,
    physics: Box<dyn CharacterPhysics + Send>,
    abilities: AbilityTable,
    integrator: MovementIntegrator,
    tick: u64,
    event_log: Vec<WorldEvent>,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("tick", &self.tick)
            .field("entities", &self.store.len())
            .field("platforms", &self.platforms.len())
            .finish_non_exhaustive()
    }
}

impl World {
    pub fn new(settings: WorldSettings, physics: Box<dyn CharacterPhysics + Send>) -> Self {
        Self {
            integrator: MovementIntegrator::new(settings.tuning),
            settings,
            store: EntityStore::new(),
            platforms: PlatformSet::new(),
            physics,
            abilities: AbilityTable::builtin(),
            tick: 0,
            event_log: Vec::new(),
        }
    }

    pub fn with_abilities(mut self, abilities: AbilityTable) -> Self {
        self.abilities = abilities;
        self
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.tick as f64 * self.settings.dt as f64
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn platforms(&self) -> &PlatformSet {
        &self.platforms
    }

    pub fn abilities(&self) -> &AbilityTable {
        &self.abilities
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.event_log)
    }

    pub fn events(&self) -> &[WorldEvent] {
        &self.event_log
    }

    // --- Population ---

    pub fn add_platform(
        &mut self,
        id: PlatformId,
        half_extents: Vec3,
        motion: PlatformMotion,
    ) -> Result<EntityId, KernelError> {
        if !self.platforms.insert(id, half_extents, motion, self.time()) {
            return Err(KernelError::DuplicatePlatform(id));
        }
        let Some(platform) = self.platforms.get_mut(id) else {
            return Err(KernelError::DuplicatePlatform(id));
        };
        let pose = platform.current;
        let entity = self.store.register_platform(
            id,
            Transform {
                position: pose.position,
                yaw: pose.yaw,
                pitch: 0.0,
            },
        );
        platform.entity = Some(entity);
        self.physics.sync_platform(id, pose, half_extents);
        tracing::debug!(?id, ?entity, "platform added");
        Ok(entity)
    }

    pub fn spawn_dummy(&mut self, position: Vec3, max_health: f32) -> EntityId {
        let id = self.store.register_dummy(
            Transform::at(position),
            Health::new(max_health),
            BodyShape::PLAYER,
        );
        self.sync_body(id);
        id
    }

    /// Default snapshot for an account with nothing stored.
    pub fn fresh_snapshot(&self, account: AccountId) -> PlayerSnapshot {
        PlayerSnapshot::fresh(account, self.settings.spawn, self.settings.player_max_health)
    }

    pub fn spawn_player(
        &mut self,
        user: UserId,
        snapshot: &PlayerSnapshot,
    ) -> Result<EntityId, KernelError> {
        let entity = self.store.register_player(user, snapshot)?;
        self.sync_body(entity);
        self.event_log.push(WorldEvent::PlayerSpawned {
            entity,
            account: snapshot.account_id,
        });
        Ok(entity)
    }

    /// Remove a user's player and return its final snapshot.
    pub fn despawn_player(&mut self, user: UserId) -> Option<PlayerSnapshot> {
        let entity = self.store.entity_for_user(user)?;
        let snapshot = self.store.persistence_snapshot(entity)?;
        self.store.unregister(entity);
        self.physics.remove_body(entity);
        self.event_log.push(WorldEvent::PlayerDespawned {
            entity,
            account: snapshot.account_id,
        });
        Some(snapshot)
    }

    // --- Input and loadout ---

    /// Merge one batch of commands into a user's intent.
    ///
    /// Returns `None` if the user has no player.
    pub fn apply_input(&mut self, user: UserId, batch: &[InputCommand]) -> Option<BatchStats> {
        let id = self.store.entity_for_user(user)?;
        let meta = self.store.player(id)?;
        let account = meta.account_id;
        let transform = *self.store.transform(id)?;
        let out = InputReconciler::reconcile(
            ReconcileBase {
                last_sequence: meta.last_sequence,
                yaw: transform.yaw,
                pitch: transform.pitch,
            },
            batch,
        );
        if out.stats.accepted == 0 {
            return Some(out.stats);
        }

        if let Some(t) = self.store.transform_mut(id) {
            t.yaw = out.yaw;
            t.pitch = out.pitch;
        }
        if out.yaw != transform.yaw || out.pitch != transform.pitch {
            self.event_log.push(WorldEvent::CharacterMoved { account });
        }
        if let Some(intent) = self.store.intent_mut(id) {
            if let Some(axes) = out.axes {
                intent.forward = axes.forward;
                intent.strafe = axes.strafe;
                intent.sprint = axes.sprint;
            }
            intent.jump |= out.jump;
            intent.cast |= out.cast;
        }
        if let Some(meta) = self.store.player_mut(id) {
            meta.last_sequence = out.last_sequence;
            if out.toggle_movement_mode {
                meta.movement_mode = meta.movement_mode.toggled();
                let mode = meta.movement_mode;
                self.event_log
                    .push(WorldEvent::MovementModeChanged { account, mode });
            }
        }
        Some(out.stats)
    }

    pub fn assign_hotbar_slot(
        &mut self,
        user: UserId,
        slot: u8,
        ability: Option<AbilityId>,
    ) -> Result<(), KernelError> {
        if let Some(a) = ability {
            if !self.abilities.contains(a) {
                return Err(KernelError::UnknownAbility(a));
            }
        }
        let meta = self.player_meta_mut(user)?;
        if !meta.hotbar.assign(slot, ability) {
            return Err(KernelError::InvalidSlot(slot));
        }
        let account = meta.account_id;
        self.event_log.push(WorldEvent::LoadoutChanged { account });
        Ok(())
    }

    pub fn select_hotbar_slot(&mut self, user: UserId, slot: u8) -> Result<(), KernelError> {
        let meta = self.player_meta_mut(user)?;
        if !meta.hotbar.select(slot) {
            return Err(KernelError::InvalidSlot(slot));
        }
        let account = meta.account_id;
        self.event_log.push(WorldEvent::LoadoutChanged { account });
        Ok(())
    }

    fn player_meta_mut(&mut self, user: UserId) -> Result<&mut realm_ecs::PlayerMeta, KernelError> {
        let id = self
            .store
            .entity_for_user(user)
            .ok_or(KernelError::UnknownUser(user))?;
        self.store
            .player_mut(id)
            .ok_or(KernelError::Ecs(EcsError::NotLive(id)))
    }

    // --- Stepping ---

    /// Advance the simulation by one tick.
    ///
    /// Order: platforms, player movement, casts, projectiles, dummy resets,
    /// player respawns.
    pub fn step(&mut self) {
        self.tick += 1;
        let tick = self.tick;
        let dt = self.settings.dt;
        let _span = tracing::debug_span!("world_step", tick).entered();

        self.platforms.advance(self.time());
        for p in self.platforms.iter() {
            self.physics.sync_platform(p.id, p.current, p.half_extents);
            if let Some(t) = p.entity.and_then(|e| self.store.transform_mut(e)) {
                t.position = p.current.position;
                t.yaw = p.current.yaw;
            }
        }

        let players = self.store.ids_of(EntityKind::Player);
        for id in self.store.ids_of(EntityKind::TrainingDummy) {
            self.sync_body(id);
        }
        for &id in &players {
            self.sync_body(id);
        }
        for &id in &players {
            let Some(account) = self.store.player(id).map(|m| m.account_id) else {
                continue;
            };
            let Some(outcome) = self.integrator.step_player(
                &mut self.store,
                &self.platforms,
                self.physics.as_mut(),
                id,
                dt,
            ) else {
                continue;
            };
            self.sync_body(id);
            if outcome.jumped {
                if let Some(meta) = self.store.player_mut(id) {
                    meta.last_jump_tick = Some(tick);
                }
                self.event_log.push(WorldEvent::Jumped { account });
            }
            if outcome.moved {
                self.event_log.push(WorldEvent::CharacterMoved { account });
            }
        }

        for &id in &players {
            let wants_cast = self
                .store
                .intent_mut(id)
                .map(|i| std::mem::take(&mut i.cast))
                .unwrap_or(false);
            if !wants_cast {
                continue;
            }
            let Some(account) = self.store.player(id).map(|m| m.account_id) else {
                continue;
            };
            match try_cast(&mut self.store, &self.abilities, id, tick) {
                Some(Ok((ability, projectile))) => {
                    self.event_log.push(WorldEvent::AbilityCast {
                        account,
                        ability,
                        projectile,
                    });
                }
                Some(Err(blocked)) => tracing::debug!(?id, ?blocked, "cast blocked"),
                None => {}
            }
        }

        let report = step_projectiles(&mut self.store, self.physics.as_mut(), dt);
        for hit in &report.hits {
            let account = self.store.player(hit.target).map(|m| m.account_id);
            self.event_log.push(WorldEvent::Damaged {
                target: hit.target,
                account,
                amount: hit.damage,
            });
            let depleted = self
                .store
                .health(hit.target)
                .is_some_and(|h| h.is_depleted());
            if depleted && hit.damage > 0.0 {
                self.event_log.push(WorldEvent::Killed {
                    target: hit.target,
                    account,
                });
            }
        }
        for (entity, reason) in report.despawned {
            self.event_log
                .push(WorldEvent::ProjectileDespawned { entity, reason });
        }

        self.reset_dummies(tick);
        self.respawn_players();

        self.event_log.push(WorldEvent::Stepped { tick });
    }

    fn sync_body(&mut self, id: EntityId) {
        let (Some(t), Some(shape)) = (self.store.transform(id), self.store.shape(id)) else {
            return;
        };
        self.physics.sync_body(id, t.position, shape);
    }

    fn reset_dummies(&mut self, tick: u64) {
        for id in self.store.ids_of(EntityKind::TrainingDummy) {
            let depleted = self.store.health(id).is_some_and(|h| h.is_depleted());
            let reset_ticks = self.settings.dummy_reset_ticks;
            let Some(dummy) = self.store.dummy_mut(id) else {
                continue;
            };
            let reset_at = dummy.reset_at_tick;
            match reset_at {
                None if depleted => dummy.reset_at_tick = Some(tick + reset_ticks),
                Some(at) if tick >= at => {
                    dummy.reset_at_tick = None;
                    if let Some(h) = self.store.health_mut(id) {
                        h.refill();
                    }
                    self.event_log.push(WorldEvent::DummyReset { entity: id });
                }
                _ => {}
            }
        }
    }

    fn respawn_players(&mut self) {
        for id in self.store.ids_of(EntityKind::Player) {
            if !self.store.health(id).is_some_and(|h| h.is_depleted()) {
                continue;
            }
            let Some(account) = self.store.player(id).map(|m| m.account_id) else {
                continue;
            };
            if let Some(t) = self.store.transform_mut(id) {
                *t = self.settings.spawn;
            }
            self.store.set_velocity(id, Vec3::ZERO);
            self.store.set_ground_state(id, false, None);
            if let Some(h) = self.store.health_mut(id) {
                h.refill();
            }
            tracing::info!(?account, "player respawned");
            self.event_log.push(WorldEvent::PlayerRespawned { account });
        }
    }

    /// Deterministic hash of the simulation state, for comparing runs.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325; // FNV offset basis
        let mix = |h: &mut u64, bytes: &[u8]| {
            for &b in bytes {
                *h ^= b as u64;
                *h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        let mix_vec = |h: &mut u64, v: Vec3| {
            for c in v.to_array() {
                mix(h, &c.to_le_bytes());
            }
        };
        mix(&mut h, &self.tick.to_le_bytes());
        for id in self.store.live_ids() {
            mix(&mut h, &id.0.to_le_bytes());
            if let Some(net) = self.store.network_id(id) {
                mix(&mut h, &net.0.to_le_bytes());
            }
            if let Some(t) = self.store.transform(id) {
                mix_vec(&mut h, t.position);
                mix(&mut h, &t.yaw.to_le_bytes());
                mix(&mut h, &t.pitch.to_le_bytes());
            }
            if let Some(v) = self.store.velocity(id) {
                mix_vec(&mut h, v);
            }
            if let Some(hp) = self.store.health(id) {
                mix(&mut h, &hp.current().to_le_bytes());
            }
            mix(&mut h, &[self.store.grounded(id).unwrap_or(false) as u8]);
            if let Some(p) = self.store.attached_platform(id) {
                mix(&mut h, &p.0.to_le_bytes());
            }
        }
        for p in self.platforms.iter() {
            mix(&mut h, &p.id.0.to_le_bytes());
            mix_vec(&mut h, p.current.position);
            mix(&mut h, &p.current.yaw.to_le_bytes());
        }
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::FlatGround;

    fn world() -> World {
        World::new(WorldSettings::default(), Box::new(FlatGround::default()))
    }

    fn join(world: &mut World, user: u64, account: u64) -> EntityId {
        let snap = world.fresh_snapshot(AccountId(account));
        world.spawn_player(UserId(user), &snap).unwrap()
    }

    fn settle(world: &mut World) {
        for _ in 0..30 {
            world.step();
        }
        world.drain_events();
    }

    fn cmd(sequence: u16) -> InputCommand {
        InputCommand {
            sequence,
            ..Default::default()
        }
    }

    #[test]
    fn world_starts_empty() {
        let w = world();
        assert_eq!(w.tick(), 0);
        assert!(w.store().is_empty());
    }

    #[test]
    fn grounded_jump_press_takes_effect_next_tick() {
        let mut w = world();
        let id = join(&mut w, 1, 1);
        settle(&mut w);
        assert_eq!(w.store().grounded(id), Some(true));

        let jump = InputCommand {
            jump_pressed: true,
            ..cmd(1)
        };
        w.apply_input(UserId(1), &[jump]);
        w.step();

        assert_eq!(w.store().grounded(id), Some(false));
        assert_eq!(w.store().velocity(id).unwrap().y, 7.2);
        assert_eq!(w.store().attached_platform(id), None);
        assert_eq!(w.store().player(id).unwrap().last_jump_tick, Some(w.tick()));
        assert!(w.events().contains(&WorldEvent::Jumped {
            account: AccountId(1)
        }));
    }

    #[test]
    fn movement_toggle_applies_to_the_same_tick() {
        let mut w = world();
        let id = join(&mut w, 1, 1);
        settle(&mut w);
        let toggle_and_walk = InputCommand {
            forward: 1.0,
            movement_mode_toggle_pressed: true,
            ..cmd(1)
        };
        w.apply_input(UserId(1), &[toggle_and_walk]);
        w.step();
        assert_eq!(w.store().player(id).unwrap().movement_mode, MovementMode::Walk);
        let v = w.store().velocity(id).unwrap();
        assert!((v.z - w.settings().tuning.walk_speed).abs() < 1e-5);
    }

    #[test]
    fn despawn_returns_final_snapshot_and_clears_indices() {
        let mut w = world();
        let id = join(&mut w, 3, 42);
        w.apply_input(
            UserId(3),
            &[InputCommand {
                forward: 1.0,
                ..cmd(1)
            }],
        );
        for _ in 0..10 {
            w.step();
        }
        let pos = w.store().transform(id).unwrap().position;
        let snap = w.despawn_player(UserId(3)).unwrap();
        assert_eq!(snap.account_id, AccountId(42));
        assert_eq!(snap.transform.position, pos);
        assert!(w.store().entity_for_account(AccountId(42)).is_none());
        assert!(w.despawn_player(UserId(3)).is_none());
    }

    #[test]
    fn input_for_unknown_user_is_none() {
        let mut w = world();
        assert!(w.apply_input(UserId(9), &[cmd(1)]).is_none());
    }

    #[test]
    fn loadout_edits_emit_events_and_validate() {
        let mut w = world();
        join(&mut w, 1, 7);
        w.drain_events();
        w.assign_hotbar_slot(UserId(1), 2, Some(AbilityId(3))).unwrap();
        w.select_hotbar_slot(UserId(1), 2).unwrap();
        assert_eq!(
            w.assign_hotbar_slot(UserId(1), 2, Some(AbilityId(77))),
            Err(KernelError::UnknownAbility(AbilityId(77)))
        );
        assert_eq!(
            w.select_hotbar_slot(UserId(1), 200),
            Err(KernelError::InvalidSlot(200))
        );
        assert_eq!(
            w.select_hotbar_slot(UserId(5), 0),
            Err(KernelError::UnknownUser(UserId(5)))
        );
        let events = w.drain_events();
        let dirty: Vec<_> = events.iter().filter_map(WorldEvent::dirty_abilities).collect();
        assert_eq!(dirty, vec![AccountId(7), AccountId(7)]);
    }

    #[test]
    fn cast_damages_dummy_which_later_resets() {
        let mut w = world();
        let id = join(&mut w, 1, 1);
        settle(&mut w);
        let pos = w.store().transform(id).unwrap().position;
        let dummy = w.spawn_dummy(pos + Vec3::new(0.0, 0.0, 4.0), 20.0);

        w.apply_input(
            UserId(1),
            &[InputCommand {
                ability_cast_pressed: true,
                ..cmd(1)
            }],
        );
        for _ in 0..10 {
            w.step();
        }
        let events = w.drain_events();
        assert!(events.iter().any(|e| matches!(e, WorldEvent::AbilityCast { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, WorldEvent::Killed { target, .. } if *target == dummy)));
        assert!(w.store().health(dummy).unwrap().is_depleted());

        for _ in 0..w.settings().dummy_reset_ticks {
            w.step();
        }
        assert_eq!(w.store().health(dummy).unwrap().current(), 20.0);
        assert!(w
            .drain_events()
            .iter()
            .any(|e| matches!(e, WorldEvent::DummyReset { entity } if *entity == dummy)));
    }

    #[test]
    fn killed_player_respawns_at_spawn_point() {
        let mut w = world();
        let shooter = join(&mut w, 1, 1);
        let victim = join(&mut w, 2, 2);
        settle(&mut w);
        // Put the victim in front of the shooter.
        let pos = w.store().transform(shooter).unwrap().position;
        w.despawn_player(UserId(2));
        let mut snap = w.fresh_snapshot(AccountId(2));
        snap.transform.position = pos + Vec3::new(0.0, 0.0, 3.0);
        snap.health.set(5.0);
        let victim2 = w.spawn_player(UserId(2), &snap).unwrap();
        assert_eq!(victim2, victim, "slot recycled");
        w.drain_events();

        w.apply_input(
            UserId(1),
            &[InputCommand {
                ability_cast_pressed: true,
                ..cmd(1)
            }],
        );
        for _ in 0..10 {
            w.step();
        }
        let events = w.drain_events();
        assert!(events.contains(&WorldEvent::PlayerRespawned {
            account: AccountId(2)
        }));
        assert_eq!(
            w.store().health(victim2).unwrap().current(),
            w.settings().player_max_health
        );
        let dirty: Vec<_> = events.iter().filter_map(WorldEvent::dirty_character).collect();
        assert!(dirty.contains(&AccountId(2)));
    }

    #[test]
    fn duplicate_platform_is_rejected() {
        let mut w = world();
        let motion = PlatformMotion::fixed(Vec3::ZERO);
        w.add_platform(PlatformId(1), Vec3::ONE, motion).unwrap();
        assert_eq!(
            w.add_platform(PlatformId(1), Vec3::ONE, motion),
            Err(KernelError::DuplicatePlatform(PlatformId(1)))
        );
    }

    #[test]
    fn platform_entity_tracks_pose() {
        let mut w = world();
        let e = w
            .add_platform(
                PlatformId(1),
                Vec3::new(2.0, 0.25, 2.0),
                PlatformMotion::linear(Vec3::ZERO, Vec3::new(6.0, 0.0, 0.0), 2.0),
            )
            .unwrap();
        for _ in 0..15 {
            w.step();
        }
        let p = w.platforms().get(PlatformId(1)).unwrap().current.position;
        assert_eq!(w.store().transform(e).unwrap().position, p);
        assert!(p.x > 0.0);
    }

    #[test]
    fn attachment_implies_grounded_every_tick() {
        let mut w = World::new(WorldSettings::default(), Box::new(FlatGround::new(-50.0)));
        w.add_platform(
            PlatformId(1),
            Vec3::new(4.0, 0.25, 4.0),
            PlatformMotion::circular(Vec3::new(0.0, 0.0, 0.0), 2.0, 6.0).with_spin(0.5),
        )
        .unwrap();
        let mut snap = w.fresh_snapshot(AccountId(1));
        snap.transform.position = Vec3::new(2.0, 1.3, 0.0);
        let id = w.spawn_player(UserId(1), &snap).unwrap();
        let mut seq = 0u16;
        for tick in 0..300u32 {
            seq += 1;
            let c = InputCommand {
                forward: if tick % 40 < 20 { 0.3 } else { -0.3 },
                yaw_delta: Some(0.05),
                jump_pressed: tick % 70 == 0,
                ..cmd(seq)
            };
            w.apply_input(UserId(1), &[c]);
            w.step();
            let s = w.store();
            if s.attached_platform(id).is_some() {
                assert_eq!(s.grounded(id), Some(true), "tick {tick}");
            }
        }
    }

    #[test]
    fn identical_inputs_give_identical_hashes() {
        let run = || {
            let mut w = world();
            w.add_platform(
                PlatformId(1),
                Vec3::new(2.0, 0.25, 2.0),
                PlatformMotion::linear(Vec3::new(5.0, 0.0, 0.0), Vec3::new(5.0, 3.0, 0.0), 4.0),
            )
            .unwrap();
            join(&mut w, 1, 1);
            join(&mut w, 2, 2);
            w.spawn_dummy(Vec3::new(0.0, 0.9, 6.0), 50.0);
            for i in 1..=120u16 {
                w.apply_input(
                    UserId(1),
                    &[InputCommand {
                        forward: 1.0,
                        yaw_delta: Some(0.01),
                        ability_cast_pressed: i % 20 == 0,
                        ..cmd(i)
                    }],
                );
                w.apply_input(
                    UserId(2),
                    &[InputCommand {
                        strafe: -1.0,
                        jump_pressed: i % 25 == 0,
                        ..cmd(i)
                    }],
                );
                w.step();
            }
            w.state_hash()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn hash_changes_when_state_changes() {
        let mut w = world();
        join(&mut w, 1, 1);
        let before = w.state_hash();
        w.step();
        assert_ne!(before, w.state_hash());
    }
}
