use glam::Vec3;
use std::collections::BTreeMap;

use crate::components::{
    BodyShape, DummyState, EntityKind, MoveIntent, PlayerMeta, ProjectileState,
};
use realm_common::{
    AccountId, EntityId, Health, ModelId, NetworkId, PlatformId, PlayerSnapshot, Transform,
    UserId, sanitize_velocity,
};

/// Errors from entity store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    #[error("entity {0:?} is not live")]
    NotLive(EntityId),
    #[error("entity {id:?} is not a {expected:?}")]
    WrongKind { id: EntityId, expected: EntityKind },
    #[error("user {0:?} already owns an entity")]
    DuplicateUser(UserId),
    #[error("account {0:?} already owns an entity")]
    DuplicateAccount(AccountId),
}

/// Columnar entity storage.
///
/// Every column is a `Vec` indexed by [`EntityId::index`]. A slot is live when
/// its `kind` entry is `Some`. Freed slots go on a free list and are handed
/// out again only after every index and column entry has been purged.
///
/// Secondary indices use `BTreeMap` so iteration is deterministic.
#[derive(Debug, Default)]
pub struct EntityStore {
    kind: Vec<Option<EntityKind>>,
    network_id: Vec<NetworkId>,
    model: Vec<ModelId>,
    transform: Vec<Transform>,
    velocity: Vec<Vec3>,
    shape: Vec<BodyShape>,
    health: Vec<Option<Health>>,
    grounded: Vec<bool>,
    attached: Vec<Option<PlatformId>>,
    intent: Vec<MoveIntent>,
    player: Vec<Option<PlayerMeta>>,
    projectile: Vec<Option<ProjectileState>>,
    dummy: Vec<Option<DummyState>>,
    platform: Vec<Option<PlatformId>>,

    free: Vec<u32>,
    next_network_id: u32,
    live: usize,

    by_user: BTreeMap<UserId, EntityId>,
    by_network: BTreeMap<NetworkId, EntityId>,
    by_account: BTreeMap<AccountId, EntityId>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            next_network_id: 1,
            ..Self::default()
        }
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Allocated slots, live or free.
    pub fn capacity(&self) -> usize {
        self.kind.len()
    }

    // --- Registration ---

    /// Register a player built from a persisted (or fresh) snapshot.
    pub fn register_player(
        &mut self,
        user_id: UserId,
        snapshot: &PlayerSnapshot,
    ) -> Result<EntityId, EcsError> {
        if self.by_user.contains_key(&user_id) {
            return Err(EcsError::DuplicateUser(user_id));
        }
        if self.by_account.contains_key(&snapshot.account_id) {
            return Err(EcsError::DuplicateAccount(snapshot.account_id));
        }
        let mut health = snapshot.health;
        health.clamp();
        let id = self.alloc(
            EntityKind::Player,
            ModelId::PLAYER,
            snapshot.transform,
            snapshot.velocity,
            BodyShape::PLAYER,
            Some(health),
        );
        let mut meta = PlayerMeta::new(user_id, snapshot.account_id);
        meta.hotbar = snapshot.hotbar;
        meta.movement_mode = snapshot.movement_mode;
        self.player[id.index()] = Some(meta);
        self.by_user.insert(user_id, id);
        self.by_account.insert(snapshot.account_id, id);
        tracing::debug!(?id, ?user_id, account = ?snapshot.account_id, "player registered");
        Ok(id)
    }

    pub fn register_platform(&mut self, platform: PlatformId, transform: Transform) -> EntityId {
        let id = self.alloc(
            EntityKind::Platform,
            ModelId::PLATFORM,
            transform,
            Vec3::ZERO,
            BodyShape::sphere(0.0),
            None,
        );
        self.platform[id.index()] = Some(platform);
        id
    }

    pub fn register_projectile(
        &mut self,
        state: ProjectileState,
        transform: Transform,
        velocity: Vec3,
        radius: f32,
    ) -> EntityId {
        let model = ModelId::projectile(state.ability);
        let id = self.alloc(
            EntityKind::Projectile,
            model,
            transform,
            velocity,
            BodyShape::sphere(radius),
            None,
        );
        self.projectile[id.index()] = Some(state);
        id
    }

    pub fn register_dummy(&mut self, transform: Transform, health: Health, shape: BodyShape) -> EntityId {
        let id = self.alloc(
            EntityKind::TrainingDummy,
            ModelId::TRAINING_DUMMY,
            transform,
            Vec3::ZERO,
            shape,
            Some(health),
        );
        self.dummy[id.index()] = Some(DummyState::default());
        // Dummies stand on the floor; they never fall.
        self.grounded[id.index()] = true;
        id
    }

    fn alloc(
        &mut self,
        kind: EntityKind,
        model: ModelId,
        transform: Transform,
        velocity: Vec3,
        shape: BodyShape,
        health: Option<Health>,
    ) -> EntityId {
        let network_id = NetworkId(self.next_network_id);
        self.next_network_id = self.next_network_id.wrapping_add(1).max(1);

        let id = match self.free.pop() {
            Some(raw) => EntityId(raw),
            None => {
                let raw = self.kind.len() as u32;
                self.kind.push(None);
                self.network_id.push(NetworkId(0));
                self.model.push(ModelId(0));
                self.transform.push(Transform::default());
                self.velocity.push(Vec3::ZERO);
                self.shape.push(BodyShape::sphere(0.0));
                self.health.push(None);
                self.grounded.push(false);
                self.attached.push(None);
                self.intent.push(MoveIntent::default());
                self.player.push(None);
                self.projectile.push(None);
                self.dummy.push(None);
                self.platform.push(None);
                EntityId(raw)
            }
        };
        let i = id.index();
        self.kind[i] = Some(kind);
        self.network_id[i] = network_id;
        self.model[i] = model;
        self.transform[i] = transform;
        self.velocity[i] = sanitize_velocity(velocity);
        self.shape[i] = shape;
        self.health[i] = health;
        self.by_network.insert(network_id, id);
        self.live += 1;
        id
    }

    /// Remove an entity, purging every index and column entry.
    ///
    /// Returns the kind it had, or `None` if the id was not live.
    pub fn unregister(&mut self, id: EntityId) -> Option<EntityKind> {
        let i = id.index();
        let kind = self.kind.get(i).copied().flatten()?;

        self.by_network.remove(&self.network_id[i]);
        if let Some(meta) = self.player[i].take() {
            self.by_user.remove(&meta.user_id);
            self.by_account.remove(&meta.account_id);
        }
        self.kind[i] = None;
        self.network_id[i] = NetworkId(0);
        self.model[i] = ModelId(0);
        self.transform[i] = Transform::default();
        self.velocity[i] = Vec3::ZERO;
        self.shape[i] = BodyShape::sphere(0.0);
        self.health[i] = None;
        self.grounded[i] = false;
        self.attached[i] = None;
        self.intent[i] = MoveIntent::default();
        self.projectile[i] = None;
        self.dummy[i] = None;
        self.platform[i] = None;

        self.free.push(id.0);
        self.live -= 1;
        tracing::trace!(?id, ?kind, "entity unregistered");
        Some(kind)
    }

    // --- Liveness and indices ---

    pub fn is_live(&self, id: EntityId) -> bool {
        self.kind(id).is_some()
    }

    pub fn kind(&self, id: EntityId) -> Option<EntityKind> {
        self.kind.get(id.index()).copied().flatten()
    }

    pub fn entity_for_user(&self, user: UserId) -> Option<EntityId> {
        self.by_user.get(&user).copied()
    }

    pub fn entity_for_network(&self, net: NetworkId) -> Option<EntityId> {
        self.by_network.get(&net).copied()
    }

    pub fn entity_for_account(&self, account: AccountId) -> Option<EntityId> {
        self.by_account.get(&account).copied()
    }

    /// Connected users in id order.
    pub fn users(&self) -> impl Iterator<Item = (UserId, EntityId)> + '_ {
        self.by_user.iter().map(|(u, e)| (*u, *e))
    }

    /// Live ids of one kind, ascending.
    pub fn ids_of(&self, kind: EntityKind) -> Vec<EntityId> {
        self.kind
            .iter()
            .enumerate()
            .filter(|(_, k)| **k == Some(kind))
            .map(|(i, _)| EntityId(i as u32))
            .collect()
    }

    /// All live ids, ascending.
    pub fn live_ids(&self) -> Vec<EntityId> {
        self.kind
            .iter()
            .enumerate()
            .filter(|(_, k)| k.is_some())
            .map(|(i, _)| EntityId(i as u32))
            .collect()
    }

    /// Player meta for a caller that already knows the entity is a live player.
    pub fn require_player(&self, id: EntityId) -> Result<&PlayerMeta, EcsError> {
        match self.kind(id) {
            None => Err(EcsError::NotLive(id)),
            Some(EntityKind::Player) => self.player[id.index()]
                .as_ref()
                .ok_or(EcsError::NotLive(id)),
            Some(_) => Err(EcsError::WrongKind {
                id,
                expected: EntityKind::Player,
            }),
        }
    }

    // --- Column accessors ---
    //
    // All return `None` for dead or out-of-range ids so hot paths can skip
    // stale handles without branching on liveness separately.

    fn live_index(&self, id: EntityId) -> Option<usize> {
        self.is_live(id).then_some(id.index())
    }

    pub fn network_id(&self, id: EntityId) -> Option<NetworkId> {
        self.live_index(id).map(|i| self.network_id[i])
    }

    pub fn model(&self, id: EntityId) -> Option<ModelId> {
        self.live_index(id).map(|i| self.model[i])
    }

    pub fn shape(&self, id: EntityId) -> Option<BodyShape> {
        self.live_index(id).map(|i| self.shape[i])
    }

    pub fn transform(&self, id: EntityId) -> Option<&Transform> {
        self.live_index(id).map(|i| &self.transform[i])
    }

    pub fn transform_mut(&mut self, id: EntityId) -> Option<&mut Transform> {
        self.live_index(id).map(move |i| &mut self.transform[i])
    }

    pub fn velocity(&self, id: EntityId) -> Option<Vec3> {
        self.live_index(id).map(|i| self.velocity[i])
    }

    /// Write a velocity. Non-finite components are zeroed.
    pub fn set_velocity(&mut self, id: EntityId, v: Vec3) -> bool {
        match self.live_index(id) {
            Some(i) => {
                self.velocity[i] = sanitize_velocity(v);
                true
            }
            None => false,
        }
    }

    pub fn health(&self, id: EntityId) -> Option<&Health> {
        self.live_index(id).and_then(|i| self.health[i].as_ref())
    }

    pub fn health_mut(&mut self, id: EntityId) -> Option<&mut Health> {
        self.live_index(id)
            .and_then(move |i| self.health[i].as_mut())
    }

    pub fn grounded(&self, id: EntityId) -> Option<bool> {
        self.live_index(id).map(|i| self.grounded[i])
    }

    pub fn attached_platform(&self, id: EntityId) -> Option<PlatformId> {
        self.live_index(id).and_then(|i| self.attached[i])
    }

    /// Write grounded state and platform attachment together.
    ///
    /// Attachment is only kept while grounded; passing `grounded = false`
    /// always clears it.
    pub fn set_ground_state(
        &mut self,
        id: EntityId,
        grounded: bool,
        attached: Option<PlatformId>,
    ) -> bool {
        match self.live_index(id) {
            Some(i) => {
                self.grounded[i] = grounded;
                self.attached[i] = if grounded { attached } else { None };
                true
            }
            None => false,
        }
    }

    pub fn intent(&self, id: EntityId) -> Option<&MoveIntent> {
        self.live_index(id).map(|i| &self.intent[i])
    }

    pub fn intent_mut(&mut self, id: EntityId) -> Option<&mut MoveIntent> {
        self.live_index(id).map(move |i| &mut self.intent[i])
    }

    pub fn player(&self, id: EntityId) -> Option<&PlayerMeta> {
        self.live_index(id).and_then(|i| self.player[i].as_ref())
    }

    pub fn player_mut(&mut self, id: EntityId) -> Option<&mut PlayerMeta> {
        self.live_index(id)
            .and_then(move |i| self.player[i].as_mut())
    }

    pub fn projectile(&self, id: EntityId) -> Option<&ProjectileState> {
        self.live_index(id).and_then(|i| self.projectile[i].as_ref())
    }

    pub fn projectile_mut(&mut self, id: EntityId) -> Option<&mut ProjectileState> {
        self.live_index(id)
            .and_then(move |i| self.projectile[i].as_mut())
    }

    pub fn dummy(&self, id: EntityId) -> Option<&DummyState> {
        self.live_index(id).and_then(|i| self.dummy[i].as_ref())
    }

    pub fn dummy_mut(&mut self, id: EntityId) -> Option<&mut DummyState> {
        self.live_index(id).and_then(move |i| self.dummy[i].as_mut())
    }

    pub fn platform_link(&self, id: EntityId) -> Option<PlatformId> {
        self.live_index(id).and_then(|i| self.platform[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(account: u64) -> PlayerSnapshot {
        PlayerSnapshot::fresh(
            AccountId(account),
            Transform::at(Vec3::new(account as f32, 1.0, 0.0)),
            100.0,
        )
    }

    #[test]
    fn store_starts_empty() {
        let store = EntityStore::new();
        assert!(store.is_empty());
        assert_eq!(store.capacity(), 0);
    }

    #[test]
    fn register_player_populates_every_index() {
        let mut store = EntityStore::new();
        let id = store.register_player(UserId(7), &snapshot(42)).unwrap();
        let net = store.network_id(id).unwrap();

        assert_eq!(store.entity_for_user(UserId(7)), Some(id));
        assert_eq!(store.entity_for_account(AccountId(42)), Some(id));
        assert_eq!(store.entity_for_network(net), Some(id));
        assert_eq!(store.kind(id), Some(EntityKind::Player));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn duplicate_user_or_account_is_rejected() {
        let mut store = EntityStore::new();
        store.register_player(UserId(1), &snapshot(10)).unwrap();
        assert_eq!(
            store.register_player(UserId(1), &snapshot(11)),
            Err(EcsError::DuplicateUser(UserId(1)))
        );
        assert_eq!(
            store.register_player(UserId(2), &snapshot(10)),
            Err(EcsError::DuplicateAccount(AccountId(10)))
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_one_keeps_the_other_intact() {
        let mut store = EntityStore::new();
        let a = store.register_player(UserId(1), &snapshot(100)).unwrap();
        let b = store.register_player(UserId(2), &snapshot(200)).unwrap();
        let net_a = store.network_id(a).unwrap();
        let net_b = store.network_id(b).unwrap();
        let b_transform = *store.transform(b).unwrap();

        assert_eq!(store.unregister(a), Some(EntityKind::Player));

        assert!(!store.is_live(a));
        assert_eq!(store.entity_for_user(UserId(1)), None);
        assert_eq!(store.entity_for_account(AccountId(100)), None);
        assert_eq!(store.entity_for_network(net_a), None);
        assert!(store.transform(a).is_none());
        assert!(store.player(a).is_none());

        assert_eq!(store.entity_for_user(UserId(2)), Some(b));
        assert_eq!(store.entity_for_account(AccountId(200)), Some(b));
        assert_eq!(store.entity_for_network(net_b), Some(b));
        assert_eq!(store.transform(b), Some(&b_transform));
        assert_eq!(store.player(b).unwrap().account_id, AccountId(200));
    }

    #[test]
    fn freed_ids_are_recycled_with_fresh_network_ids() {
        let mut store = EntityStore::new();
        let a = store.register_player(UserId(1), &snapshot(1)).unwrap();
        let old_net = store.network_id(a).unwrap();
        store.unregister(a);

        let c = store.register_dummy(Transform::default(), Health::new(50.0), BodyShape::sphere(0.5));
        assert_eq!(c, a, "slot is reused");
        assert_ne!(store.network_id(c), Some(old_net), "network ids are never reused");
        assert_eq!(store.capacity(), 1);
        assert!(store.player(c).is_none(), "player column purged before reuse");
    }

    #[test]
    fn unregister_unknown_is_none() {
        let mut store = EntityStore::new();
        assert_eq!(store.unregister(EntityId(3)), None);
        let a = store.register_dummy(Transform::default(), Health::new(1.0), BodyShape::sphere(0.5));
        store.unregister(a);
        assert_eq!(store.unregister(a), None);
    }

    #[test]
    fn ground_state_never_keeps_attachment_while_airborne() {
        let mut store = EntityStore::new();
        let id = store.register_player(UserId(1), &snapshot(1)).unwrap();
        store.set_ground_state(id, true, Some(PlatformId(3)));
        assert_eq!(store.attached_platform(id), Some(PlatformId(3)));
        store.set_ground_state(id, false, Some(PlatformId(3)));
        assert_eq!(store.grounded(id), Some(false));
        assert_eq!(store.attached_platform(id), None);
    }

    #[test]
    fn velocity_writes_are_sanitized() {
        let mut store = EntityStore::new();
        let id = store.register_player(UserId(1), &snapshot(1)).unwrap();
        store.set_velocity(id, Vec3::new(f32::NAN, 3.0, f32::INFINITY));
        assert_eq!(store.velocity(id), Some(Vec3::new(0.0, 3.0, 0.0)));
    }

    #[test]
    fn require_player_distinguishes_dead_and_wrong_kind() {
        let mut store = EntityStore::new();
        let d = store.register_dummy(Transform::default(), Health::new(1.0), BodyShape::sphere(0.5));
        assert_eq!(
            store.require_player(d),
            Err(EcsError::WrongKind {
                id: d,
                expected: EntityKind::Player
            })
        );
        assert_eq!(store.require_player(EntityId(9)), Err(EcsError::NotLive(EntityId(9))));
    }

    #[test]
    fn ids_of_is_sorted_and_filtered() {
        let mut store = EntityStore::new();
        let d1 = store.register_dummy(Transform::default(), Health::new(1.0), BodyShape::sphere(0.5));
        let p = store.register_player(UserId(1), &snapshot(1)).unwrap();
        let d2 = store.register_dummy(Transform::default(), Health::new(1.0), BodyShape::sphere(0.5));
        assert_eq!(store.ids_of(EntityKind::TrainingDummy), vec![d1, d2]);
        assert_eq!(store.ids_of(EntityKind::Player), vec![p]);
        assert_eq!(store.live_ids(), vec![d1, p, d2]);
    }
}
